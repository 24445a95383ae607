// src/db/saker.rs
use rusqlite::{params, Connection, OptionalExtension};

use crate::domain::oppgave::{Adressebeskyttelse, Sak};
use crate::errors::ServerError;

pub fn opprett_sak(conn: &Connection, sak: &Sak) -> Result<(), ServerError> {
    conn.execute(
        "insert into sak (id, ident, sak_type, enhet, adressebeskyttelse) values (?, ?, ?, ?, ?)",
        params![
            sak.id,
            sak.ident,
            sak.sak_type,
            sak.enhet,
            sak.adressebeskyttelse
        ],
    )
    .map_err(|e| ServerError::DbError(format!("insert sak failed: {e}")))?;
    Ok(())
}

pub fn hent_sak(conn: &Connection, id: i64) -> Result<Option<Sak>, ServerError> {
    conn.query_row(
        "select id, ident, sak_type, enhet, adressebeskyttelse from sak where id = ?",
        params![id],
        |r| {
            Ok(Sak {
                id: r.get(0)?,
                ident: r.get(1)?,
                sak_type: r.get(2)?,
                enhet: r.get(3)?,
                adressebeskyttelse: r.get(4)?,
            })
        },
    )
    .optional()
    .map_err(|e| ServerError::DbError(format!("select sak failed: {e}")))
}

pub fn oppdater_adressebeskyttelse(
    conn: &Connection,
    id: i64,
    gradering: Adressebeskyttelse,
) -> Result<(), ServerError> {
    conn.execute(
        "update sak set adressebeskyttelse = ? where id = ?",
        params![gradering, id],
    )
    .map_err(|e| ServerError::DbError(format!("update adressebeskyttelse failed: {e}")))?;
    Ok(())
}
