// routes/mod.rs
use std::collections::HashMap;

use astra::Request;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::errors::ServerError;

pub mod admin;
pub mod avkorting;
pub mod oppgaver;
pub mod vedtak;

pub(crate) fn parse_query(req: &Request) -> HashMap<String, String> {
    let mut map = HashMap::new();

    if let Some(q) = req.uri().query() {
        for pair in q.split('&') {
            let mut parts = pair.splitn(2, '=');
            if let (Some(k), Some(v)) = (parts.next(), parts.next()) {
                map.insert(k.to_string(), v.to_string());
            }
        }
    }

    map
}

pub(crate) fn parse_id(segment: &str) -> Result<Uuid, ServerError> {
    Uuid::parse_str(segment).map_err(|_| ServerError::BadRequest(format!("ugyldig id: {segment}")))
}

/// Reads the whole request body as JSON.
pub(crate) fn les_json<T: DeserializeOwned>(req: &mut Request) -> Result<T, ServerError> {
    let reader = req.body_mut().reader();
    serde_json::from_reader(reader).map_err(ServerError::from)
}

/// Like `les_json`, but an empty body gives `T::default()`.
pub(crate) fn les_valgfri_json<T: DeserializeOwned + Default>(
    req: &mut Request,
) -> Result<T, ServerError> {
    let mut raw = Vec::new();
    std::io::Read::read_to_end(&mut req.body_mut().reader(), &mut raw)
        .map_err(|e| ServerError::BadRequest(format!("could not read body: {e}")))?;
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(&raw).map_err(ServerError::from)
}
