// src/db/hendelser.rs
use rusqlite::{params, Connection};

use crate::domain::hendelse::OppgaveHendelse;
use crate::errors::ServerError;

/// Queues an event in `hendelse_outbox`. A separate relay ships unsent rows.
pub fn legg_i_outbox(conn: &Connection, hendelse: &OppgaveHendelse) -> Result<(), ServerError> {
    let payload = serde_json::to_string(hendelse)
        .map_err(|e| ServerError::internal(format!("serialize hendelse failed: {e}")))?;

    conn.execute(
        r#"
        insert into hendelse_outbox (oppgave_id, sak_id, hendelse, status, tidspunkt, payload)
        values (?, ?, ?, ?, ?, ?)
        "#,
        params![
            hendelse.oppgave_id,
            hendelse.sak_id,
            hendelse.hendelse,
            hendelse.status,
            hendelse.tidspunkt,
            payload
        ],
    )
    .map_err(|e| ServerError::DbError(format!("insert outbox failed: {e}")))?;

    tracing::debug!(
        oppgave_id = %hendelse.oppgave_id,
        hendelse = %hendelse.hendelse,
        "hendelse lagt i outbox"
    );
    Ok(())
}

/// Unsent events, oldest first.
#[cfg(test)]
pub fn hent_usendte(conn: &Connection, limit: i64) -> Result<Vec<(i64, OppgaveHendelse)>, ServerError> {
    let mut stmt = conn.prepare(
        "select id, payload from hendelse_outbox where sendt_at is null order by id limit ?",
    )?;
    let rows = stmt.query_map(params![limit], |r| {
        Ok((r.get::<_, i64>(0)?, r.get::<_, String>(1)?))
    })?;

    let mut hendelser = Vec::new();
    for row in rows {
        let (id, payload) = row?;
        let hendelse = serde_json::from_str(&payload)
            .map_err(|e| ServerError::internal(format!("corrupt outbox row {id}: {e}")))?;
        hendelser.push((id, hendelse));
    }
    Ok(hendelser)
}
