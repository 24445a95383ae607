// src/auth/tokens.rs
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::auth::token::{generate_token_default, hash_token};
use crate::db::saksbehandlere::hent_saksbehandler;
use crate::domain::bruker::Bruker;
use crate::domain::text_enum;
use crate::errors::ServerError;

text_enum! {
    pub enum TokenKind {
        Saksbehandler => "SAKSBEHANDLER",
        System => "SYSTEM",
        Borger => "BORGER",
        Ekstern => "EKSTERN",
    }
}

/// Issues a bearer token for `ident` and returns the raw value.
/// Only the SHA-256 hash is persisted.
pub fn utsted_token(
    conn: &Connection,
    ident: &str,
    kind: TokenKind,
    now: DateTime<Utc>,
) -> Result<String, ServerError> {
    let raw_token = generate_token_default();
    let hash = hash_token(&raw_token);

    conn.execute(
        r#"
        insert into api_tokens (token_hash, ident, kind, created_at)
        values (?, ?, ?, ?)
        "#,
        params![hash.as_slice(), ident, kind, now],
    )
    .map_err(|e| ServerError::DbError(format!("create token failed: {e}")))?;

    Ok(raw_token)
}

pub fn trekk_tilbake(conn: &Connection, raw_token: &str, now: DateTime<Utc>) -> Result<(), ServerError> {
    let hash = hash_token(raw_token);
    conn.execute(
        "update api_tokens set revoked_at = ? where token_hash = ? and revoked_at is null",
        params![now, hash.as_slice()],
    )
    .map_err(|e| ServerError::DbError(format!("revoke token failed: {e}")))?;
    Ok(())
}

/// Resolves a raw bearer token into the caller. `Ok(None)` for unknown or
/// revoked tokens.
pub fn bruker_fra_token(conn: &Connection, raw_token: &str) -> Result<Option<Bruker>, ServerError> {
    let hash = hash_token(raw_token);

    let row: Option<(String, TokenKind)> = conn
        .query_row(
            r#"
            select ident, kind
            from api_tokens
            where token_hash = ?
              and revoked_at is null
            "#,
            params![hash.as_slice()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()
        .map_err(|e| ServerError::DbError(format!("token lookup failed: {e}")))?;

    let Some((ident, kind)) = row else {
        return Ok(None);
    };

    let bruker = match kind {
        TokenKind::Saksbehandler => {
            // A token for a saksbehandler without a profile is unusable.
            let Some(info) = hent_saksbehandler(conn, &ident)? else {
                return Ok(None);
            };
            Bruker::Saksbehandler {
                ident: info.ident,
                roller: info.roller,
                enheter: info.enheter,
            }
        }
        TokenKind::System => Bruker::System { navn: ident },
        TokenKind::Borger => Bruker::Borger { ident },
        TokenKind::Ekstern => Bruker::Ekstern { navn: ident },
    };
    Ok(Some(bruker))
}
