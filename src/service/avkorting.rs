// src/service/avkorting.rs

//! Stores and recomputes avkorting per behandling.
//!
//! The behandling's oppgaver decide whether it is a first-time grant, and an
//! existing vedtak locks the avkorting once it has been fattet.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Deserialize;
use uuid::Uuid;

use crate::db::avkorting as avkorting_db;
use crate::db::oppgaver::{OppgaveStore, SqlOppgaveStore};
use crate::db::vedtak::{hent_attesterte_avkortinger, hent_vedtak};
use crate::domain::avkorting::{Avkorting, Kilde, NyttInntektsgrunnlag, YtelseFoerAvkorting};
use crate::domain::bruker::Bruker;
use crate::domain::etteroppgjoer::{beregn_etteroppgjoer, EtteroppgjoerResultat, FaktiskInntekt};
use crate::domain::oppgave::OppgaveType;
use crate::domain::periode::Maaned;
use crate::errors::ServerError;
use crate::service::oppgave::kan_se_sak;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LagreAvkorting {
    pub inntektsgrunnlag: NyttInntektsgrunnlag,
    pub virkningstidspunkt: Maaned,
    pub beregnet_ytelse: Vec<YtelseFoerAvkorting>,
    /// Behandling to copy earlier years from when nothing is stored yet.
    #[serde(default)]
    pub forrige_behandling: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AarligInntektsjustering {
    pub forrige_behandling: Uuid,
    pub inntektsgrunnlag: NyttInntektsgrunnlag,
    pub beregnet_ytelse: Vec<YtelseFoerAvkorting>,
}

fn krev_saksbehandling(bruker: &Bruker) -> Result<(), ServerError> {
    if bruker.can_assign() {
        Ok(())
    } else {
        Err(ServerError::Forbidden(format!(
            "{} kan ikke endre avkorting",
            bruker.ident()
        )))
    }
}

/// Rejects changes once a vedtak for the behandling has been fattet.
fn krev_redigerbar(conn: &Connection, bruker: &Bruker, behandling_id: Uuid) -> Result<(), ServerError> {
    krev_saksbehandling(bruker)?;
    krev_lesetilgang(conn, bruker, behandling_id)?;
    match hent_vedtak(conn, behandling_id)? {
        Some(vedtak) if !vedtak.status.kan_endres() => Err(ServerError::conflict(
            "BEHANDLING_ER_LAAST",
            format!(
                "Vedtak for behandling {behandling_id} har status {} og avkorting kan ikke endres",
                vedtak.status
            ),
        )),
        _ => Ok(()),
    }
}

fn er_foerstegangsbehandling(conn: &Connection, behandling_id: Uuid) -> Result<bool, ServerError> {
    Ok(SqlOppgaveStore::new(conn)
        .hent_for_referanse(&behandling_id.to_string())?
        .iter()
        .any(|o| o.oppgave_type == OppgaveType::Foerstegangsbehandling))
}

/// The sak a behandling belongs to, through its vedtak or its oppgaver.
fn finn_sak_for_behandling(conn: &Connection, behandling_id: Uuid) -> Result<Option<i64>, ServerError> {
    if let Some(vedtak) = hent_vedtak(conn, behandling_id)? {
        return Ok(Some(vedtak.sak_id));
    }
    Ok(SqlOppgaveStore::new(conn)
        .hent_for_referanse(&behandling_id.to_string())?
        .first()
        .map(|o| o.sak_id))
}

fn sak_for_behandling(conn: &Connection, behandling_id: Uuid) -> Result<i64, ServerError> {
    finn_sak_for_behandling(conn, behandling_id)?
        .ok_or_else(|| ServerError::NotFound(format!("Sak for behandling {behandling_id}")))
}

/// Caseworkers and systems only. A strictly confidential sak looks absent
/// to callers without clearance.
fn krev_lesetilgang(conn: &Connection, bruker: &Bruker, behandling_id: Uuid) -> Result<(), ServerError> {
    if !bruker.can_assign() {
        return Err(ServerError::Forbidden(format!(
            "{} kan ikke lese avkorting",
            bruker.ident()
        )));
    }
    match finn_sak_for_behandling(conn, behandling_id)? {
        Some(sak_id) if !kan_se_sak(conn, bruker, sak_id)? => Err(ServerError::NotFound(format!(
            "Avkorting for behandling {behandling_id}"
        ))),
        _ => Ok(()),
    }
}

pub fn hent_avkorting(
    conn: &Connection,
    bruker: &Bruker,
    behandling_id: Uuid,
) -> Result<Avkorting, ServerError> {
    krev_lesetilgang(conn, bruker, behandling_id)?;
    let avkorting = avkorting_db::hent_avkorting(conn, behandling_id)?;
    if avkorting.er_tom() {
        return Err(ServerError::NotFound(format!(
            "Avkorting for behandling {behandling_id}"
        )));
    }
    Ok(avkorting)
}

/// Adds an income declaration and recomputes from the virkningstidspunkt.
pub fn lagre_avkorting(
    conn: &Connection,
    bruker: &Bruker,
    behandling_id: Uuid,
    request: LagreAvkorting,
    now: DateTime<Utc>,
) -> Result<Avkorting, ServerError> {
    krev_redigerbar(conn, bruker, behandling_id)?;

    let mut avkorting = avkorting_db::hent_avkorting(conn, behandling_id)?;
    if avkorting.er_tom() {
        if let Some(forrige) = request.forrige_behandling {
            avkorting = avkorting_db::hent_avkorting(conn, forrige)?;
        }
    }

    let foerstegangsbehandling = er_foerstegangsbehandling(conn, behandling_id)?;
    avkorting.legg_til_grunnlag(
        request.inntektsgrunnlag,
        foerstegangsbehandling,
        Kilde::new(bruker.ident(), now),
    )?;
    avkorting.beregn(&request.beregnet_ytelse, request.virkningstidspunkt, now)?;
    avkorting_db::lagre_avkorting(conn, behandling_id, &avkorting)?;

    tracing::info!(
        %behandling_id,
        virkningstidspunkt = %request.virkningstidspunkt,
        saksbehandler = bruker.ident(),
        "avkorting beregnet"
    );
    Ok(avkorting)
}

pub fn slett_avkorting(
    conn: &Connection,
    bruker: &Bruker,
    behandling_id: Uuid,
) -> Result<(), ServerError> {
    krev_redigerbar(conn, bruker, behandling_id)?;
    avkorting_db::slett_avkorting(conn, behandling_id)?;
    tracing::info!(%behandling_id, "avkorting slettet");
    Ok(())
}

/// Starts a new year from the previous behandling's avkorting with a
/// January declaration.
pub fn aarlig_inntektsjustering(
    conn: &Connection,
    bruker: &Bruker,
    behandling_id: Uuid,
    request: AarligInntektsjustering,
    now: DateTime<Utc>,
) -> Result<Avkorting, ServerError> {
    krev_redigerbar(conn, bruker, behandling_id)?;

    let fom = request.inntektsgrunnlag.fom;
    if fom.maaned() != 1 {
        return Err(ServerError::validation(
            "NYTT_AAR_MAA_STARTE_I_JANUAR",
            format!("Årlig inntektsjustering må gjelde fra januar, var {fom}"),
        ));
    }

    let mut avkorting = avkorting_db::hent_avkorting(conn, request.forrige_behandling)?;
    if avkorting.er_tom() {
        return Err(ServerError::NotFound(format!(
            "Avkorting for behandling {}",
            request.forrige_behandling
        )));
    }
    if avkorting.aarsoppgjoer(fom.aar()).is_some() {
        return Err(ServerError::conflict(
            "AARSOPPGJOER_FINNES",
            format!("Det finnes allerede et årsoppgjør for {}", fom.aar()),
        ));
    }

    avkorting.legg_til_grunnlag(request.inntektsgrunnlag, false, Kilde::new(bruker.ident(), now))?;
    avkorting.beregn(&request.beregnet_ytelse, fom, now)?;
    avkorting_db::lagre_avkorting(conn, behandling_id, &avkorting)?;

    tracing::info!(%behandling_id, aar = fom.aar(), "årlig inntektsjustering beregnet");
    Ok(avkorting)
}

pub fn beregn_etteroppgjoer_for_aar(
    conn: &Connection,
    bruker: &Bruker,
    behandling_id: Uuid,
    aar: i32,
    faktisk: &FaktiskInntekt,
    now: DateTime<Utc>,
) -> Result<EtteroppgjoerResultat, ServerError> {
    krev_saksbehandling(bruker)?;
    let avkorting = hent_avkorting(conn, bruker, behandling_id)?;
    let oppgjoer = avkorting
        .aarsoppgjoer(aar)
        .ok_or_else(|| ServerError::NotFound(format!("Årsoppgjør {aar} for {behandling_id}")))?;

    let resultat = beregn_etteroppgjoer(
        behandling_id,
        oppgjoer,
        faktisk,
        Kilde::new(bruker.ident(), now),
        now,
    )?;
    avkorting_db::lagre_etteroppgjoer_resultat(conn, &resultat)?;

    tracing::info!(
        %behandling_id,
        aar,
        differanse = resultat.differanse,
        resultat = %resultat.resultat_type,
        "etteroppgjør beregnet"
    );
    Ok(resultat)
}

pub fn hent_etteroppgjoer(
    conn: &Connection,
    bruker: &Bruker,
    behandling_id: Uuid,
) -> Result<Vec<EtteroppgjoerResultat>, ServerError> {
    krev_lesetilgang(conn, bruker, behandling_id)?;
    avkorting_db::hent_etteroppgjoer_resultater(conn, behandling_id)
}

/// Data repair: puts back years that attested vedtak in the same sak had,
/// but that are missing from this behandling's avkorting.
pub fn gjenopprett_manglende_aarsoppgjoer(
    conn: &Connection,
    bruker: &Bruker,
    behandling_id: Uuid,
) -> Result<Vec<i32>, ServerError> {
    if !bruker.can_act_as_system() {
        return Err(ServerError::Forbidden(format!(
            "{} kan ikke reparere avkorting",
            bruker.ident()
        )));
    }

    let sak_id = sak_for_behandling(conn, behandling_id)?;
    let historiske = hent_attesterte_avkortinger(conn, sak_id)?;
    let mut avkorting = avkorting_db::hent_avkorting(conn, behandling_id)?;

    let gjenopprettet = avkorting.gjenopprett_manglende_aarsoppgjoer(&historiske);
    if gjenopprettet.is_empty() {
        tracing::info!(%behandling_id, "ingen årsoppgjør manglet");
    } else {
        avkorting_db::lagre_avkorting(conn, behandling_id, &avkorting)?;
        tracing::warn!(%behandling_id, aar = ?gjenopprettet, "gjenopprettet manglende årsoppgjør");
    }
    Ok(gjenopprettet)
}
