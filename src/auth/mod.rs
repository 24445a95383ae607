pub mod token;
pub mod tokens;

use astra::Request;
use rusqlite::Connection;

use crate::domain::bruker::Bruker;
use crate::errors::ServerError;

/// The raw value of `Authorization: Bearer <token>`.
pub fn bearer_token(req: &Request) -> Result<&str, ServerError> {
    req.headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(ServerError::Unauthorized)
}

/// Resolves the caller from the bearer token.
pub fn bruker_fra_request(req: &Request, conn: &Connection) -> Result<Bruker, ServerError> {
    let token = bearer_token(req)?;
    tokens::bruker_fra_token(conn, token)?.ok_or(ServerError::Unauthorized)
}
