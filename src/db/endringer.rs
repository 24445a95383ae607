// src/db/endringer.rs
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::oppgaver::{OppgaveFilter, OppgaveStore};
use crate::domain::oppgave::{
    Endringstype, Oppgave, OppgaveEndring, OppgaveKilde, OppgaveType, PaaVentAarsak, Status,
};
use crate::errors::ServerError;

/// Appends one snapshot of `oppgave` to `oppgaveendringer`.
pub fn legg_til_endring(
    conn: &Connection,
    oppgave: &Oppgave,
    endringstype: Endringstype,
    tidspunkt: DateTime<Utc>,
) -> Result<(), ServerError> {
    conn.execute(
        r#"
        INSERT INTO oppgaveendringer (
            oppgave_id, tidspunkt, saksbehandler, status, merknad, enhet, kilde, endringstype
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
        params![
            oppgave.id,
            tidspunkt,
            oppgave.saksbehandler,
            oppgave.status,
            oppgave.merknad,
            oppgave.enhet,
            oppgave.kilde,
            endringstype,
        ],
    )
    .map_err(|e| ServerError::DbError(format!("insert oppgaveendring failed: {e}")))?;
    Ok(())
}

/// Full change log for one oppgave, oldest first.
pub fn hent_endringer(
    conn: &Connection,
    oppgave_id: Uuid,
) -> Result<Vec<OppgaveEndring>, ServerError> {
    let mut stmt = conn.prepare(
        r#"
        SELECT id, oppgave_id, tidspunkt, saksbehandler, status, merknad, enhet, kilde, endringstype
        FROM oppgaveendringer
        WHERE oppgave_id = ?1
        ORDER BY tidspunkt, id
        "#,
    )?;
    let rows = stmt.query_map(params![oppgave_id], |r| {
        Ok(OppgaveEndring {
            id: r.get(0)?,
            oppgave_id: r.get(1)?,
            tidspunkt: r.get(2)?,
            saksbehandler: r.get(3)?,
            status: r.get(4)?,
            merknad: r.get(5)?,
            enhet: r.get(6)?,
            kilde: r.get(7)?,
            endringstype: r.get(8)?,
        })
    })?;

    let mut endringer = Vec::new();
    for row in rows {
        endringer.push(row?);
    }
    Ok(endringer)
}

/// Wraps an `OppgaveStore` so every mutation leaves an audit record.
///
/// After the wrapped write it re-reads the oppgave and appends a snapshot
/// tagged with the operation's `Endringstype`. Callers hand it the same
/// transaction as the inner store, so write and record commit together.
pub struct EndringTrackingStore<'c, S> {
    inner: S,
    conn: &'c Connection,
    tidspunkt: DateTime<Utc>,
}

impl<'c, S: OppgaveStore> EndringTrackingStore<'c, S> {
    pub fn new(inner: S, conn: &'c Connection, tidspunkt: DateTime<Utc>) -> Self {
        Self {
            inner,
            conn,
            tidspunkt,
        }
    }

    fn spor(&self, id: Uuid, endringstype: Endringstype) -> Result<(), ServerError> {
        let oppgave = self
            .inner
            .hent(id)?
            .ok_or_else(|| ServerError::internal(format!("oppgave {id} forsvant etter skriving")))?;
        legg_til_endring(self.conn, &oppgave, endringstype, self.tidspunkt)
    }
}

impl<S: OppgaveStore> OppgaveStore for EndringTrackingStore<'_, S> {
    fn opprett(&self, oppgave: &Oppgave) -> Result<(), ServerError> {
        self.inner.opprett(oppgave)?;
        self.spor(oppgave.id, Endringstype::Opprettet)
    }

    fn hent(&self, id: Uuid) -> Result<Option<Oppgave>, ServerError> {
        self.inner.hent(id)
    }

    fn hent_for_referanse(&self, referanse: &str) -> Result<Vec<Oppgave>, ServerError> {
        self.inner.hent_for_referanse(referanse)
    }

    fn hent_for_sak(&self, sak_id: i64) -> Result<Vec<Oppgave>, ServerError> {
        self.inner.hent_for_sak(sak_id)
    }

    fn hent_for_typer(
        &self,
        typer: &[OppgaveType],
        inkluder_strengt_fortrolig: bool,
    ) -> Result<Vec<Oppgave>, ServerError> {
        self.inner.hent_for_typer(typer, inkluder_strengt_fortrolig)
    }

    fn hent_med_filter(&self, filter: &OppgaveFilter) -> Result<Vec<Oppgave>, ServerError> {
        self.inner.hent_med_filter(filter)
    }

    fn hent_utloept_paa_vent(&self, now: DateTime<Utc>) -> Result<Vec<Uuid>, ServerError> {
        self.inner.hent_utloept_paa_vent(now)
    }

    fn oppdater_saksbehandler(&self, id: Uuid, saksbehandler: &str) -> Result<(), ServerError> {
        self.inner.oppdater_saksbehandler(id, saksbehandler)?;
        self.spor(id, Endringstype::Saksbehandler)
    }

    fn fjern_saksbehandler(&self, id: Uuid) -> Result<(), ServerError> {
        self.inner.fjern_saksbehandler(id)?;
        self.spor(id, Endringstype::Saksbehandler)
    }

    // Bookkeeping column, not part of the snapshot.
    fn oppdater_forrige_saksbehandler(
        &self,
        id: Uuid,
        saksbehandler: Option<&str>,
    ) -> Result<(), ServerError> {
        self.inner.oppdater_forrige_saksbehandler(id, saksbehandler)
    }

    fn oppdater_status(&self, id: Uuid, status: Status) -> Result<(), ServerError> {
        self.inner.oppdater_status(id, status)?;
        self.spor(id, Endringstype::Status)
    }

    fn oppdater_status_og_merknad(
        &self,
        id: Uuid,
        status: Status,
        merknad: Option<&str>,
        paa_vent_aarsak: Option<PaaVentAarsak>,
    ) -> Result<(), ServerError> {
        self.inner
            .oppdater_status_og_merknad(id, status, merknad, paa_vent_aarsak)?;
        self.spor(id, Endringstype::StatusOgMerknad)
    }

    fn oppdater_enhet(&self, id: Uuid, enhet: &str) -> Result<(), ServerError> {
        self.inner.oppdater_enhet(id, enhet)?;
        self.spor(id, Endringstype::Enhet)
    }

    fn oppdater_frist(&self, id: Uuid, frist: DateTime<Utc>) -> Result<(), ServerError> {
        self.inner.oppdater_frist(id, frist)?;
        self.spor(id, Endringstype::Frist)
    }

    fn oppdater_kilde(&self, id: Uuid, kilde: OppgaveKilde) -> Result<(), ServerError> {
        self.inner.oppdater_kilde(id, kilde)?;
        self.spor(id, Endringstype::Kilde)
    }
}
