// src/db/saksbehandlere.rs
use rusqlite::{params, Connection, OptionalExtension};

use crate::domain::bruker::Rolle;
use crate::errors::ServerError;

#[derive(Debug, Clone, PartialEq)]
pub struct SaksbehandlerInfo {
    pub ident: String,
    pub navn: String,
    pub roller: Vec<Rolle>,
    pub enheter: Vec<String>,
}

fn join<T: ToString>(items: &[T]) -> String {
    items
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

fn split(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}

pub fn lagre_saksbehandler(conn: &Connection, info: &SaksbehandlerInfo) -> Result<(), ServerError> {
    conn.execute(
        r#"
        insert into saksbehandlere (ident, navn, roller, enheter) values (?, ?, ?, ?)
        on conflict(ident) do update set
            navn = excluded.navn,
            roller = excluded.roller,
            enheter = excluded.enheter
        "#,
        params![info.ident, info.navn, join(&info.roller), info.enheter.join(",")],
    )
    .map_err(|e| ServerError::DbError(format!("upsert saksbehandler failed: {e}")))?;
    Ok(())
}

pub fn hent_saksbehandler(
    conn: &Connection,
    ident: &str,
) -> Result<Option<SaksbehandlerInfo>, ServerError> {
    let row: Option<(String, String, String, String)> = conn
        .query_row(
            "select ident, navn, roller, enheter from saksbehandlere where ident = ?",
            params![ident],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
        )
        .optional()
        .map_err(|e| ServerError::DbError(format!("select saksbehandler failed: {e}")))?;

    let Some((ident, navn, roller, enheter)) = row else {
        return Ok(None);
    };

    let roller = split(&roller)
        .map(|r| r.parse::<Rolle>().map_err(ServerError::internal))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Some(SaksbehandlerInfo {
        ident,
        navn,
        roller,
        enheter: split(&enheter).map(str::to_string).collect(),
    }))
}
