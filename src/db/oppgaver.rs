// src/db/oppgaver.rs
use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, types::Value, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::domain::oppgave::{
    Adressebeskyttelse, Oppgave, OppgaveKilde, OppgaveType, PaaVentAarsak, Status,
};
use crate::errors::ServerError;

const OPPGAVE_KOLONNER: &str = "o.id, o.status, o.enhet, o.sak_id, o.referanse, o.type, \
     o.saksbehandler, o.forrige_saksbehandler, o.kilde, o.opprinnelse, o.merknad, \
     o.paa_vent_aarsak, o.opprettet, o.frist";

fn placeholders(n: usize) -> String {
    std::iter::repeat("?")
        .take(n)
        .collect::<Vec<_>>()
        .join(", ")
}

fn oppgave_fra_rad(row: &Row<'_>) -> rusqlite::Result<Oppgave> {
    Ok(Oppgave {
        id: row.get(0)?,
        status: row.get(1)?,
        enhet: row.get(2)?,
        sak_id: row.get(3)?,
        referanse: row.get(4)?,
        oppgave_type: row.get(5)?,
        saksbehandler: row.get(6)?,
        forrige_saksbehandler: row.get(7)?,
        kilde: row.get(8)?,
        opprinnelse: row.get(9)?,
        merknad: row.get(10)?,
        paa_vent_aarsak: row.get(11)?,
        opprettet: row.get(12)?,
        frist: row.get(13)?,
    })
}

/// Filter for the caller's list view. Empty vectors mean "no restriction".
#[derive(Debug, Clone, Default)]
pub struct OppgaveFilter {
    pub enheter: Vec<String>,
    pub statuser: Vec<Status>,
    pub typer: Vec<OppgaveType>,
    pub saksbehandler: Option<String>,
    pub inkluder_strengt_fortrolig: bool,
}

/// Durable CRUD over `oppgave`. All mutations touch exactly one row.
///
/// Absence on read is `Ok(None)`; a mutation that matches no row is `NotFound`.
pub trait OppgaveStore {
    fn opprett(&self, oppgave: &Oppgave) -> Result<(), ServerError>;
    fn hent(&self, id: Uuid) -> Result<Option<Oppgave>, ServerError>;
    fn hent_for_referanse(&self, referanse: &str) -> Result<Vec<Oppgave>, ServerError>;
    fn hent_for_sak(&self, sak_id: i64) -> Result<Vec<Oppgave>, ServerError>;
    fn hent_for_typer(
        &self,
        typer: &[OppgaveType],
        inkluder_strengt_fortrolig: bool,
    ) -> Result<Vec<Oppgave>, ServerError>;
    fn hent_med_filter(&self, filter: &OppgaveFilter) -> Result<Vec<Oppgave>, ServerError>;
    fn hent_utloept_paa_vent(&self, now: DateTime<Utc>) -> Result<Vec<Uuid>, ServerError>;

    fn oppdater_saksbehandler(&self, id: Uuid, saksbehandler: &str) -> Result<(), ServerError>;
    fn fjern_saksbehandler(&self, id: Uuid) -> Result<(), ServerError>;
    fn oppdater_forrige_saksbehandler(
        &self,
        id: Uuid,
        saksbehandler: Option<&str>,
    ) -> Result<(), ServerError>;
    fn oppdater_status(&self, id: Uuid, status: Status) -> Result<(), ServerError>;
    fn oppdater_status_og_merknad(
        &self,
        id: Uuid,
        status: Status,
        merknad: Option<&str>,
        paa_vent_aarsak: Option<PaaVentAarsak>,
    ) -> Result<(), ServerError>;
    fn oppdater_enhet(&self, id: Uuid, enhet: &str) -> Result<(), ServerError>;
    fn oppdater_frist(&self, id: Uuid, frist: DateTime<Utc>) -> Result<(), ServerError>;
    fn oppdater_kilde(&self, id: Uuid, kilde: OppgaveKilde) -> Result<(), ServerError>;
}

/// `OppgaveStore` over a borrowed SQLite connection or transaction.
pub struct SqlOppgaveStore<'c> {
    conn: &'c Connection,
}

impl<'c> SqlOppgaveStore<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    fn query(&self, sql: &str, values: Vec<Value>) -> Result<Vec<Oppgave>, ServerError> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params_from_iter(values), oppgave_fra_rad)?;

        let mut oppgaver = Vec::new();
        for row in rows {
            oppgaver.push(row?);
        }
        Ok(oppgaver)
    }

    fn en_rad(&self, updated: usize, id: Uuid) -> Result<(), ServerError> {
        if updated == 1 {
            Ok(())
        } else {
            Err(ServerError::NotFound(format!("Oppgave {id}")))
        }
    }
}

impl OppgaveStore for SqlOppgaveStore<'_> {
    fn opprett(&self, o: &Oppgave) -> Result<(), ServerError> {
        self.conn.execute(
            r#"
            INSERT INTO oppgave (
                id, status, enhet, sak_id, referanse, type, saksbehandler,
                forrige_saksbehandler, kilde, opprinnelse, merknad, paa_vent_aarsak,
                opprettet, frist
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
            params![
                o.id,
                o.status,
                o.enhet,
                o.sak_id,
                o.referanse,
                o.oppgave_type,
                o.saksbehandler,
                o.forrige_saksbehandler,
                o.kilde,
                o.opprinnelse,
                o.merknad,
                o.paa_vent_aarsak,
                o.opprettet,
                o.frist,
            ],
        )?;
        Ok(())
    }

    fn hent(&self, id: Uuid) -> Result<Option<Oppgave>, ServerError> {
        let sql = format!("SELECT {OPPGAVE_KOLONNER} FROM oppgave o WHERE o.id = ?1");
        Ok(self
            .conn
            .query_row(&sql, params![id], oppgave_fra_rad)
            .optional()?)
    }

    fn hent_for_referanse(&self, referanse: &str) -> Result<Vec<Oppgave>, ServerError> {
        let sql = format!(
            "SELECT {OPPGAVE_KOLONNER} FROM oppgave o WHERE o.referanse = ? ORDER BY o.opprettet"
        );
        self.query(&sql, vec![Value::Text(referanse.to_string())])
    }

    fn hent_for_sak(&self, sak_id: i64) -> Result<Vec<Oppgave>, ServerError> {
        let sql = format!(
            "SELECT {OPPGAVE_KOLONNER} FROM oppgave o WHERE o.sak_id = ? ORDER BY o.opprettet"
        );
        self.query(&sql, vec![Value::Integer(sak_id)])
    }

    fn hent_for_typer(
        &self,
        typer: &[OppgaveType],
        inkluder_strengt_fortrolig: bool,
    ) -> Result<Vec<Oppgave>, ServerError> {
        if typer.is_empty() {
            return Ok(Vec::new());
        }
        self.hent_med_filter(&OppgaveFilter {
            typer: typer.to_vec(),
            inkluder_strengt_fortrolig,
            ..OppgaveFilter::default()
        })
    }

    fn hent_med_filter(&self, filter: &OppgaveFilter) -> Result<Vec<Oppgave>, ServerError> {
        // Build optional clauses + bind vector in the exact same order.
        let mut clauses: Vec<String> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if !filter.enheter.is_empty() {
            clauses.push(format!("o.enhet IN ({})", placeholders(filter.enheter.len())));
            values.extend(filter.enheter.iter().cloned().map(Value::Text));
        }
        if !filter.statuser.is_empty() {
            clauses.push(format!("o.status IN ({})", placeholders(filter.statuser.len())));
            values.extend(
                filter
                    .statuser
                    .iter()
                    .map(|s| Value::Text(s.as_str().to_string())),
            );
        }
        if !filter.typer.is_empty() {
            clauses.push(format!("o.type IN ({})", placeholders(filter.typer.len())));
            values.extend(
                filter
                    .typer
                    .iter()
                    .map(|t| Value::Text(t.as_str().to_string())),
            );
        }
        if let Some(sb) = &filter.saksbehandler {
            clauses.push("o.saksbehandler = ?".to_string());
            values.push(Value::Text(sb.clone()));
        }
        if !filter.inkluder_strengt_fortrolig {
            clauses.push("s.adressebeskyttelse NOT IN (?, ?)".to_string());
            values.push(Value::Text(
                Adressebeskyttelse::StrengtFortrolig.as_str().to_string(),
            ));
            values.push(Value::Text(
                Adressebeskyttelse::StrengtFortroligUtland
                    .as_str()
                    .to_string(),
            ));
        }

        let where_clause = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };

        let sql = format!(
            "SELECT {OPPGAVE_KOLONNER} FROM oppgave o JOIN sak s ON s.id = o.sak_id \
             {where_clause} ORDER BY o.frist IS NULL, o.frist, o.opprettet"
        );
        self.query(&sql, values)
    }

    fn hent_utloept_paa_vent(&self, now: DateTime<Utc>) -> Result<Vec<Uuid>, ServerError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id FROM oppgave
            WHERE status = ?1 AND frist IS NOT NULL AND frist <= ?2
            ORDER BY frist
            "#,
        )?;
        let rows = stmt.query_map(params![Status::PaaVent, now], |r| r.get(0))?;

        let mut ids = Vec::new();
        for row in rows {
            ids.push(row?);
        }
        Ok(ids)
    }

    fn oppdater_saksbehandler(&self, id: Uuid, saksbehandler: &str) -> Result<(), ServerError> {
        let updated = self.conn.execute(
            "UPDATE oppgave SET saksbehandler = ?1 WHERE id = ?2",
            params![saksbehandler, id],
        )?;
        self.en_rad(updated, id)
    }

    fn fjern_saksbehandler(&self, id: Uuid) -> Result<(), ServerError> {
        let updated = self.conn.execute(
            "UPDATE oppgave SET saksbehandler = NULL WHERE id = ?1",
            params![id],
        )?;
        self.en_rad(updated, id)
    }

    fn oppdater_forrige_saksbehandler(
        &self,
        id: Uuid,
        saksbehandler: Option<&str>,
    ) -> Result<(), ServerError> {
        let updated = self.conn.execute(
            "UPDATE oppgave SET forrige_saksbehandler = ?1 WHERE id = ?2",
            params![saksbehandler, id],
        )?;
        self.en_rad(updated, id)
    }

    fn oppdater_status(&self, id: Uuid, status: Status) -> Result<(), ServerError> {
        let updated = self.conn.execute(
            "UPDATE oppgave SET status = ?1 WHERE id = ?2",
            params![status, id],
        )?;
        self.en_rad(updated, id)
    }

    fn oppdater_status_og_merknad(
        &self,
        id: Uuid,
        status: Status,
        merknad: Option<&str>,
        paa_vent_aarsak: Option<PaaVentAarsak>,
    ) -> Result<(), ServerError> {
        let updated = self.conn.execute(
            "UPDATE oppgave SET status = ?1, merknad = ?2, paa_vent_aarsak = ?3 WHERE id = ?4",
            params![status, merknad, paa_vent_aarsak, id],
        )?;
        self.en_rad(updated, id)
    }

    fn oppdater_enhet(&self, id: Uuid, enhet: &str) -> Result<(), ServerError> {
        let updated = self.conn.execute(
            "UPDATE oppgave SET enhet = ?1 WHERE id = ?2",
            params![enhet, id],
        )?;
        self.en_rad(updated, id)
    }

    fn oppdater_frist(&self, id: Uuid, frist: DateTime<Utc>) -> Result<(), ServerError> {
        let updated = self.conn.execute(
            "UPDATE oppgave SET frist = ?1 WHERE id = ?2",
            params![frist, id],
        )?;
        self.en_rad(updated, id)
    }

    fn oppdater_kilde(&self, id: Uuid, kilde: OppgaveKilde) -> Result<(), ServerError> {
        let updated = self.conn.execute(
            "UPDATE oppgave SET kilde = ?1 WHERE id = ?2",
            params![kilde, id],
        )?;
        self.en_rad(updated, id)
    }
}
