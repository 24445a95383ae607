pub mod avkorting;
pub mod connection;
pub mod endringer;
pub mod hendelser;
pub mod oppgaver;
pub mod saker;
pub mod saksbehandlere;
pub mod vedtak;

pub use connection::{init_db, Database};
