pub mod avkorting;
pub mod oppgave;
pub mod vedtak;
