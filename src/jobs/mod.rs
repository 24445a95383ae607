pub mod paa_vent;
