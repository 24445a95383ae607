// config.rs
use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use crate::errors::ServerError;

/// Runtime settings, read once at startup from `OPPGAVE_*` variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: String,
    pub schema_path: String,
    pub bind_addr: SocketAddr,
    pub max_workers: usize,
    pub paa_vent_intervall: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ServerError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ServerError> {
        let verdi = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let bind_addr = verdi("OPPGAVE_BIND_ADDR", "127.0.0.1:3000");
        let bind_addr: SocketAddr = bind_addr
            .parse()
            .map_err(|e| ServerError::internal(format!("invalid OPPGAVE_BIND_ADDR {bind_addr}: {e}")))?;

        let max_workers = verdi("OPPGAVE_MAX_WORKERS", "8");
        let max_workers = max_workers
            .parse::<usize>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| ServerError::internal(format!("invalid OPPGAVE_MAX_WORKERS {max_workers}")))?;

        let intervall = verdi("OPPGAVE_PAA_VENT_INTERVAL_SECS", "300");
        let intervall = intervall.parse::<u64>().ok().filter(|n| *n > 0).ok_or_else(|| {
            ServerError::internal(format!("invalid OPPGAVE_PAA_VENT_INTERVAL_SECS {intervall}"))
        })?;

        Ok(Self {
            db_path: verdi("OPPGAVE_DB_PATH", "oppgave.sqlite3"),
            schema_path: verdi("OPPGAVE_SCHEMA_PATH", "sql/schema.sql"),
            bind_addr,
            max_workers,
            paa_vent_intervall: Duration::from_secs(intervall),
        })
    }
}
