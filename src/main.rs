use crate::auth::tokens::{utsted_token, TokenKind};
use crate::config::Config;
use crate::db::connection::{init_db, Database};
use crate::responses::error_response;
use crate::router::handle;
use astra::Server;
use chrono::Utc;
use tracing_subscriber::EnvFilter;

mod auth;
mod config;
mod db;
mod domain;
mod errors;
mod jobs;
mod responses;
mod router;
mod routes;
mod service;

#[cfg(test)]
mod tests;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            std::process::exit(1);
        }
    };

    let db = Database::new(config.db_path.clone());
    if let Err(e) = init_db(&db, &config.schema_path) {
        tracing::error!(error = %e, "database initialization failed");
        std::process::exit(1);
    }

    // `token <ident> <KIND>` issues a bearer token and exits. Used to
    // bootstrap the first system or admin caller.
    let args: Vec<String> = std::env::args().skip(1).collect();
    if let [kommando, ident, kind] = args.as_slice() {
        if kommando == "token" {
            std::process::exit(match utsted(&db, ident, kind) {
                Ok(token) => {
                    println!("{token}");
                    0
                }
                Err(e) => {
                    tracing::error!(error = %e, "could not issue token");
                    1
                }
            });
        }
    }

    if let Err(e) = jobs::paa_vent::start(db.clone(), config.paa_vent_intervall) {
        tracing::error!(error = %e, "could not start på vent job");
        std::process::exit(1);
    }

    tracing::info!(addr = %config.bind_addr, workers = config.max_workers, "starting server");
    let server = Server::bind(&config.bind_addr).max_workers(config.max_workers);

    let result = server.serve(move |req, _info| match handle(req, &db) {
        Ok(resp) => resp,
        Err(err) => error_response(&err),
    });

    if let Err(e) = result {
        tracing::error!(error = %e, "server ended with error");
    }

    tracing::info!("server shut down");
}

fn utsted(db: &Database, ident: &str, kind: &str) -> Result<String, errors::ServerError> {
    let kind: TokenKind = kind.parse().map_err(errors::ServerError::BadRequest)?;
    db.with_tx(|tx| utsted_token(tx, ident, kind, Utc::now()))
}
