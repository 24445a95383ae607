// src/service/vedtak.rs

//! Vedtak lifecycle: draft, fatte, attestere or underkjenne.
//!
//! Each step moves the behandling's oppgave in the same transaction, so a
//! vedtak and its oppgave never disagree about who holds the case.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use uuid::Uuid;

use crate::db::avkorting::hent_avkorting;
use crate::db::oppgaver::{OppgaveStore, SqlOppgaveStore};
use crate::db::saker::hent_sak;
use crate::db::vedtak::{hent_vedtak, lagre_vedtak};
use crate::domain::bruker::Bruker;
use crate::domain::oppgave::OppgaveType;
use crate::domain::vedtak::{
    Attestasjon, NyttVedtak, UnderkjennVedtak, Vedtak, VedtakFattet, VedtakStatus,
};
use crate::errors::ServerError;
use crate::service::oppgave;

fn hent_paakrevd(conn: &Connection, behandling_id: Uuid) -> Result<Vedtak, ServerError> {
    hent_vedtak(conn, behandling_id)?
        .ok_or_else(|| ServerError::NotFound(format!("Vedtak for behandling {behandling_id}")))
}

fn krev_status(vedtak: &Vedtak, status: VedtakStatus) -> Result<(), ServerError> {
    if vedtak.status == status {
        Ok(())
    } else {
        Err(ServerError::conflict(
            "UGYLDIG_VEDTAKSSTATUS",
            format!(
                "Vedtak {} har status {}, forventet {status}",
                vedtak.id, vedtak.status
            ),
        ))
    }
}

fn krev_endringsbar(vedtak: &Vedtak) -> Result<(), ServerError> {
    if vedtak.status.kan_endres() {
        Ok(())
    } else {
        Err(ServerError::conflict(
            "VEDTAK_KAN_IKKE_ENDRES",
            format!("Vedtak {} har status {}", vedtak.id, vedtak.status),
        ))
    }
}

fn krev_attestant(bruker: &Bruker) -> Result<(), ServerError> {
    if bruker.er_attestant() {
        Ok(())
    } else {
        Err(ServerError::Forbidden(format!(
            "{} har ikke attestantrolle",
            bruker.ident()
        )))
    }
}

/// Type of the attestable oppgave still open for the behandling.
fn behandlingsoppgave(conn: &Connection, behandling_id: Uuid) -> Result<OppgaveType, ServerError> {
    SqlOppgaveStore::new(conn)
        .hent_for_referanse(&behandling_id.to_string())?
        .into_iter()
        .find(|o| o.status.er_under_arbeid() && o.oppgave_type.er_attesterbar())
        .map(|o| o.oppgave_type)
        .ok_or_else(|| {
            ServerError::conflict(
                "INGEN_OPPGAVE_UNDER_BEHANDLING",
                format!("Fant ingen oppgave under behandling for {behandling_id}"),
            )
        })
}

/// Reads a vedtak. A strictly confidential sak looks absent to callers
/// without clearance.
pub fn hent(conn: &Connection, bruker: &Bruker, behandling_id: Uuid) -> Result<Vedtak, ServerError> {
    if !bruker.can_assign() {
        return Err(ServerError::Forbidden(format!(
            "{} kan ikke lese vedtak",
            bruker.ident()
        )));
    }
    let vedtak = hent_paakrevd(conn, behandling_id)?;
    if oppgave::kan_se_sak(conn, bruker, vedtak.sak_id)? {
        Ok(vedtak)
    } else {
        Err(ServerError::NotFound(format!("Vedtak for behandling {behandling_id}")))
    }
}

/// Creates the draft, or updates it while it is still editable.
pub fn opprett_eller_oppdater(
    conn: &Connection,
    bruker: &Bruker,
    behandling_id: Uuid,
    nytt: NyttVedtak,
    now: DateTime<Utc>,
) -> Result<Vedtak, ServerError> {
    if !bruker.can_assign() {
        return Err(ServerError::Forbidden(format!(
            "{} kan ikke opprette vedtak",
            bruker.ident()
        )));
    }

    let vedtak = match hent_vedtak(conn, behandling_id)? {
        Some(mut vedtak) => {
            krev_endringsbar(&vedtak)?;
            vedtak.vedtak_type = nytt.vedtak_type;
            vedtak.virkningstidspunkt = nytt.virkningstidspunkt;
            vedtak
        }
        None => {
            if hent_sak(conn, nytt.sak_id)?.is_none() {
                return Err(ServerError::NotFound(format!("Sak {}", nytt.sak_id)));
            }
            Vedtak {
                id: Uuid::new_v4(),
                behandling_id,
                sak_id: nytt.sak_id,
                vedtak_type: nytt.vedtak_type,
                status: VedtakStatus::Opprettet,
                virkningstidspunkt: nytt.virkningstidspunkt,
                fattet: None,
                attestasjon: None,
                avkorting: None,
                opprettet: now,
            }
        }
    };

    lagre_vedtak(conn, &vedtak)?;
    Ok(vedtak)
}

/// Freezes the avkorting and sends the oppgave to attestation. Only the
/// saksbehandler holding the oppgave may fatte.
pub fn fatt(
    conn: &Connection,
    bruker: &Bruker,
    behandling_id: Uuid,
    now: DateTime<Utc>,
) -> Result<Vedtak, ServerError> {
    let mut vedtak = hent_paakrevd(conn, behandling_id)?;
    krev_endringsbar(&vedtak)?;

    let oppgave_type = behandlingsoppgave(conn, behandling_id)?;
    let oppgave = oppgave::send_til_attestering(
        conn,
        bruker,
        &behandling_id.to_string(),
        oppgave_type,
        Some("Vedtak fattet"),
        now,
    )?;

    let avkorting = hent_avkorting(conn, behandling_id)?;
    vedtak.avkorting = (!avkorting.er_tom()).then_some(avkorting);
    vedtak.status = VedtakStatus::FattetVedtak;
    vedtak.fattet = Some(VedtakFattet {
        ansvarlig_saksbehandler: bruker.ident().to_string(),
        ansvarlig_enhet: oppgave.enhet,
        tidspunkt: now,
    });
    vedtak.attestasjon = None;
    lagre_vedtak(conn, &vedtak)?;

    tracing::info!(
        vedtak_id = %vedtak.id,
        %behandling_id,
        saksbehandler = bruker.ident(),
        "vedtak fattet"
    );
    Ok(vedtak)
}

pub fn attester(
    conn: &Connection,
    bruker: &Bruker,
    behandling_id: Uuid,
    kommentar: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Vedtak, ServerError> {
    let mut vedtak = hent_paakrevd(conn, behandling_id)?;
    krev_status(&vedtak, VedtakStatus::FattetVedtak)?;
    krev_attestant(bruker)?;
    if vedtak
        .fattet
        .as_ref()
        .is_some_and(|f| f.ansvarlig_saksbehandler == bruker.ident())
    {
        return Err(ServerError::Forbidden(format!(
            "{} fattet vedtaket og kan ikke attestere det",
            bruker.ident()
        )));
    }

    let oppgave_type = behandlingsoppgave(conn, behandling_id)?;
    let oppgave = oppgave::ferdigstill_for_referanse(
        conn,
        bruker,
        &behandling_id.to_string(),
        oppgave_type,
        kommentar,
        now,
    )?;

    vedtak.status = VedtakStatus::Attestert;
    vedtak.attestasjon = Some(Attestasjon {
        attestant: bruker.ident().to_string(),
        attesterende_enhet: oppgave.enhet,
        tidspunkt: now,
    });
    lagre_vedtak(conn, &vedtak)?;

    tracing::info!(vedtak_id = %vedtak.id, %behandling_id, attestant = bruker.ident(), "vedtak attestert");
    Ok(vedtak)
}

pub fn underkjenn(
    conn: &Connection,
    bruker: &Bruker,
    behandling_id: Uuid,
    request: &UnderkjennVedtak,
    now: DateTime<Utc>,
) -> Result<Vedtak, ServerError> {
    let mut vedtak = hent_paakrevd(conn, behandling_id)?;
    krev_status(&vedtak, VedtakStatus::FattetVedtak)?;
    krev_attestant(bruker)?;

    let begrunnelse = request.begrunnelse.trim();
    if begrunnelse.is_empty() {
        return Err(ServerError::validation(
            "MANGLER_BEGRUNNELSE",
            "Begrunnelse må oppgis ved underkjenning",
        ));
    }
    let merknad = match request.kommentar.as_deref().map(str::trim) {
        Some(kommentar) if !kommentar.is_empty() => format!("{begrunnelse}: {kommentar}"),
        _ => begrunnelse.to_string(),
    };

    let oppgave_type = behandlingsoppgave(conn, behandling_id)?;
    oppgave::underkjenn(
        conn,
        bruker,
        &behandling_id.to_string(),
        oppgave_type,
        Some(&merknad),
        now,
    )?;

    vedtak.status = VedtakStatus::Returnert;
    vedtak.fattet = None;
    lagre_vedtak(conn, &vedtak)?;

    tracing::info!(vedtak_id = %vedtak.id, %behandling_id, "vedtak underkjent");
    Ok(vedtak)
}
