// src/service/oppgave.rs

//! Business rules for oppgaver.
//!
//! Every function takes the connection of an open transaction; callers run
//! them through `Database::with_tx` so the store write, its audit record and
//! the outbox event commit or roll back together.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Deserialize;
use uuid::Uuid;

use crate::db::endringer::{hent_endringer, EndringTrackingStore};
use crate::db::hendelser::legg_i_outbox;
use crate::db::oppgaver::{OppgaveFilter, OppgaveStore, SqlOppgaveStore};
use crate::db::saker::hent_sak;
use crate::db::saksbehandlere::hent_saksbehandler;
use crate::domain::bruker::{er_systemident, Bruker, Rolle};
use crate::domain::hendelse::{OppgaveHendelse, OppgaveHendelseType};
use crate::domain::historikk::{forrige_status, siste_sender_til_attestering};
use crate::domain::oppgave::{
    NyOppgave, Oppgave, OppgaveEndring, OppgaveKilde, OppgaveType, PaaVentAarsak, Status,
};
use crate::errors::ServerError;

type Store<'c> = EndringTrackingStore<'c, SqlOppgaveStore<'c>>;

fn store(conn: &Connection, now: DateTime<Utc>) -> Store<'_> {
    EndringTrackingStore::new(SqlOppgaveStore::new(conn), conn, now)
}

fn hent_paakrevd(store: &Store<'_>, id: Uuid) -> Result<Oppgave, ServerError> {
    store
        .hent(id)?
        .ok_or_else(|| ServerError::NotFound(format!("Oppgave {id}")))
}

/// Fetches an oppgave that may still be worked on.
fn hent_aapen(store: &Store<'_>, id: Uuid) -> Result<Oppgave, ServerError> {
    let oppgave = hent_paakrevd(store, id)?;
    if oppgave.er_avsluttet() {
        return Err(ServerError::conflict(
            "OPPGAVE_AVSLUTTET",
            format!("Oppgave {id} har status {} og kan ikke endres", oppgave.status),
        ));
    }
    Ok(oppgave)
}

fn krev_tildelingsrett(bruker: &Bruker) -> Result<(), ServerError> {
    if bruker.can_assign() {
        Ok(())
    } else {
        Err(ServerError::Forbidden(format!(
            "{} kan ikke endre oppgaver",
            bruker.ident()
        )))
    }
}

fn krev_eierskap(bruker: &Bruker, oppgave: &Oppgave) -> Result<(), ServerError> {
    if oppgave.er_tildelt(bruker.ident()) || bruker.can_act_as_system() {
        Ok(())
    } else {
        Err(ServerError::Forbidden(format!(
            "Oppgave {} er ikke tildelt {}",
            oppgave.id,
            bruker.ident()
        )))
    }
}

fn publiser(
    conn: &Connection,
    store: &Store<'_>,
    id: Uuid,
    hendelse: OppgaveHendelseType,
    now: DateTime<Utc>,
) -> Result<Oppgave, ServerError> {
    let oppgave = hent_paakrevd(store, id)?;
    legg_i_outbox(conn, &OppgaveHendelse::fra(hendelse, &oppgave, now))?;
    tracing::info!(
        oppgave_id = %oppgave.id,
        sak_id = oppgave.sak_id,
        status = %oppgave.status,
        hendelse = %hendelse,
        "oppgave endret"
    );
    Ok(oppgave)
}

/// Whoever sent an oppgave to attestation: the audit trail first, then the
/// `forrige_saksbehandler` column.
fn sender_til_attestering(
    conn: &Connection,
    oppgave: &Oppgave,
) -> Result<Option<String>, ServerError> {
    let endringer = hent_endringer(conn, oppgave.id)?;
    Ok(siste_sender_til_attestering(&endringer)?.or_else(|| oppgave.forrige_saksbehandler.clone()))
}

/// The single oppgave of `oppgave_type` still under work for `referanse`.
fn finn_eneste_under_arbeid(
    store: &Store<'_>,
    referanse: &str,
    oppgave_type: OppgaveType,
) -> Result<Oppgave, ServerError> {
    let mut aapne: Vec<Oppgave> = store
        .hent_for_referanse(referanse)?
        .into_iter()
        .filter(|o| o.oppgave_type == oppgave_type && o.status.er_under_arbeid())
        .collect();

    match aapne.len() {
        0 => Err(ServerError::conflict(
            "INGEN_OPPGAVE_UNDER_BEHANDLING",
            format!("Fant ingen oppgave av type {oppgave_type} under behandling for {referanse}"),
        )),
        1 => Ok(aapne.remove(0)),
        n => Err(ServerError::conflict(
            "FOR_MANGE_OPPGAVER_UNDER_BEHANDLING",
            format!("Fant {n} oppgaver av type {oppgave_type} under behandling for {referanse}"),
        )),
    }
}

pub fn opprett_oppgave(
    conn: &Connection,
    bruker: &Bruker,
    ny: NyOppgave,
    now: DateTime<Utc>,
) -> Result<Oppgave, ServerError> {
    krev_tildelingsrett(bruker)?;
    let sak = hent_sak(conn, ny.sak_id)?
        .ok_or_else(|| ServerError::NotFound(format!("Sak {}", ny.sak_id)))?;

    if ny.referanse.trim().is_empty() {
        return Err(ServerError::validation(
            "MANGLER_REFERANSE",
            "Oppgave må ha en referanse",
        ));
    }
    if let Some(frist) = ny.frist {
        if frist < now {
            return Err(ServerError::validation(
                "FRIST_TILBAKE_I_TID",
                "Frist kan ikke være tilbake i tid",
            ));
        }
    }

    let oppgave = Oppgave {
        id: Uuid::new_v4(),
        status: Status::Ny,
        enhet: ny.enhet.unwrap_or(sak.enhet),
        sak_id: sak.id,
        referanse: ny.referanse,
        oppgave_type: ny.oppgave_type,
        saksbehandler: None,
        forrige_saksbehandler: None,
        kilde: ny.kilde,
        opprinnelse: ny.opprinnelse,
        merknad: ny.merknad,
        paa_vent_aarsak: None,
        opprettet: now,
        frist: ny.frist,
    };

    let store = store(conn, now);
    store.opprett(&oppgave)?;
    let opprettet = publiser(conn, &store, oppgave.id, OppgaveHendelseType::Opprettet, now)?;

    match ny.saksbehandler {
        Some(saksbehandler) => tildel_saksbehandler(conn, bruker, opprettet.id, &saksbehandler, now),
        None => Ok(opprettet),
    }
}

/// Rejects handing an oppgave in attestation back to the person who sent
/// it, unless that person also holds the attestant role.
fn sjekk_tildeling_under_attestering(
    conn: &Connection,
    oppgave: &Oppgave,
    saksbehandler: &str,
) -> Result<(), ServerError> {
    if oppgave.status != Status::Attestering || !oppgave.oppgave_type.er_attesterbar() {
        return Ok(());
    }
    if sender_til_attestering(conn, oppgave)?.as_deref() != Some(saksbehandler) {
        return Ok(());
    }
    let er_attestant = hent_saksbehandler(conn, saksbehandler)?
        .map(|info| info.roller.contains(&Rolle::Attestant))
        .unwrap_or(false);
    if er_attestant {
        Ok(())
    } else {
        Err(ServerError::conflict(
            "KAN_IKKE_ATTESTERE_EGEN_OPPGAVE",
            format!("{saksbehandler} behandlet oppgaven og kan ikke tildeles den til attestering"),
        ))
    }
}

fn tildel(
    conn: &Connection,
    bruker: &Bruker,
    id: Uuid,
    saksbehandler: &str,
    overstyr: bool,
    now: DateTime<Utc>,
) -> Result<Oppgave, ServerError> {
    krev_tildelingsrett(bruker)?;
    if saksbehandler.trim().is_empty() {
        return Err(ServerError::validation(
            "MANGLER_SAKSBEHANDLER",
            "Saksbehandler må oppgis",
        ));
    }

    let store = store(conn, now);
    let oppgave = hent_aapen(&store, id)?;

    if oppgave.er_tildelt(saksbehandler) {
        return Ok(oppgave);
    }
    if let Some(eksisterende) = &oppgave.saksbehandler {
        if !overstyr {
            return Err(ServerError::conflict(
                "OPPGAVE_ALLEREDE_TILDELT",
                format!("Oppgave {id} er allerede tildelt {eksisterende}"),
            ));
        }
    }
    sjekk_tildeling_under_attestering(conn, &oppgave, saksbehandler)?;

    store.oppdater_saksbehandler(id, saksbehandler)?;
    if oppgave.status == Status::Ny {
        store.oppdater_status(id, Status::UnderBehandling)?;
    }
    publiser(conn, &store, id, OppgaveHendelseType::Tildelt, now)
}

/// Assigns an unowned oppgave. `NY` becomes `UNDER_BEHANDLING`; any other
/// status is kept.
pub fn tildel_saksbehandler(
    conn: &Connection,
    bruker: &Bruker,
    id: Uuid,
    saksbehandler: &str,
    now: DateTime<Utc>,
) -> Result<Oppgave, ServerError> {
    tildel(conn, bruker, id, saksbehandler, false, now)
}

/// Like `tildel_saksbehandler`, but replaces an existing owner.
pub fn bytt_saksbehandler(
    conn: &Connection,
    bruker: &Bruker,
    id: Uuid,
    saksbehandler: &str,
    now: DateTime<Utc>,
) -> Result<Oppgave, ServerError> {
    tildel(conn, bruker, id, saksbehandler, true, now)
}

pub fn fjern_saksbehandler(
    conn: &Connection,
    bruker: &Bruker,
    id: Uuid,
    now: DateTime<Utc>,
) -> Result<Oppgave, ServerError> {
    krev_tildelingsrett(bruker)?;
    let store = store(conn, now);
    let oppgave = hent_aapen(&store, id)?;
    if oppgave.saksbehandler.is_none() {
        return Ok(oppgave);
    }

    store.fjern_saksbehandler(id)?;
    if oppgave.status == Status::UnderBehandling {
        store.oppdater_status(id, Status::Ny)?;
    }
    publiser(conn, &store, id, OppgaveHendelseType::Endret, now)
}

pub fn endre_frist(
    conn: &Connection,
    bruker: &Bruker,
    id: Uuid,
    frist: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<Oppgave, ServerError> {
    krev_tildelingsrett(bruker)?;
    let store = store(conn, now);
    hent_aapen(&store, id)?;
    if frist < now {
        return Err(ServerError::validation(
            "FRIST_TILBAKE_I_TID",
            "Frist kan ikke være tilbake i tid",
        ));
    }

    store.oppdater_frist(id, frist)?;
    publiser(conn, &store, id, OppgaveHendelseType::Endret, now)
}

/// Moves an oppgave to another unit and releases its owner.
///
/// Allowed on closed oppgaver for system callers, which is how protected
/// saker are moved in bulk.
pub fn endre_enhet(
    conn: &Connection,
    bruker: &Bruker,
    id: Uuid,
    enhet: &str,
    now: DateTime<Utc>,
) -> Result<Oppgave, ServerError> {
    krev_tildelingsrett(bruker)?;
    if enhet.len() != 4 || !enhet.chars().all(|c| c.is_ascii_digit()) {
        return Err(ServerError::validation(
            "UGYLDIG_ENHET",
            format!("Ugyldig enhetsnummer: {enhet}"),
        ));
    }

    let store = store(conn, now);
    let oppgave = hent_paakrevd(&store, id)?;
    if oppgave.er_avsluttet() {
        if !bruker.can_act_as_system() {
            return Err(ServerError::conflict(
                "OPPGAVE_AVSLUTTET",
                format!("Oppgave {id} har status {} og kan ikke endres", oppgave.status),
            ));
        }
        store.oppdater_enhet(id, enhet)?;
        return publiser(conn, &store, id, OppgaveHendelseType::Endret, now);
    }

    store.oppdater_enhet(id, enhet)?;
    if oppgave.saksbehandler.is_some() {
        store.fjern_saksbehandler(id)?;
    }
    if oppgave.status == Status::UnderBehandling {
        store.oppdater_status(id, Status::Ny)?;
    }
    publiser(conn, &store, id, OppgaveHendelseType::Endret, now)
}

pub fn endre_kilde(
    conn: &Connection,
    bruker: &Bruker,
    id: Uuid,
    kilde: OppgaveKilde,
    now: DateTime<Utc>,
) -> Result<Oppgave, ServerError> {
    if !bruker.can_act_as_system() {
        return Err(ServerError::Forbidden("Kun systemet kan endre kilde".into()));
    }
    let store = store(conn, now);
    hent_aapen(&store, id)?;
    store.oppdater_kilde(id, kilde)?;
    publiser(conn, &store, id, OppgaveHendelseType::Endret, now)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaaVentRequest {
    pub paa_vent: bool,
    pub aarsak: Option<PaaVentAarsak>,
    pub merknad: Option<String>,
    pub frist: Option<DateTime<Utc>>,
}

/// Puts an oppgave on hold or releases it. Asking for the state it is
/// already in changes nothing.
pub fn oppdater_paa_vent(
    conn: &Connection,
    bruker: &Bruker,
    id: Uuid,
    request: &PaaVentRequest,
    now: DateTime<Utc>,
) -> Result<Oppgave, ServerError> {
    let store = store(conn, now);
    let oppgave = hent_aapen(&store, id)?;
    krev_eierskap(bruker, &oppgave)?;

    let er_paa_vent = oppgave.status == Status::PaaVent;
    if request.paa_vent == er_paa_vent {
        return Ok(oppgave);
    }

    if request.paa_vent {
        let aarsak = request.aarsak.ok_or_else(|| {
            ServerError::validation("MANGLER_AARSAK", "Årsak må oppgis ved sett på vent")
        })?;
        if let Some(frist) = request.frist {
            if frist < now {
                return Err(ServerError::validation(
                    "FRIST_TILBAKE_I_TID",
                    "Frist kan ikke være tilbake i tid",
                ));
            }
        }
        store.oppdater_status_og_merknad(
            id,
            Status::PaaVent,
            request.merknad.as_deref(),
            Some(aarsak),
        )?;
        if let Some(frist) = request.frist {
            store.oppdater_frist(id, frist)?;
        }
        publiser(conn, &store, id, OppgaveHendelseType::PaaVent, now)
    } else {
        ta_av_vent(conn, &store, &oppgave, request.merknad.as_deref(), now)
    }
}

fn ta_av_vent(
    conn: &Connection,
    store: &Store<'_>,
    oppgave: &Oppgave,
    merknad: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Oppgave, ServerError> {
    let endringer = hent_endringer(conn, oppgave.id)?;
    let forrige = forrige_status(&endringer, Status::PaaVent)?.ok_or_else(|| {
        ServerError::internal(format!(
            "Fant ingen status før på vent for oppgave {}",
            oppgave.id
        ))
    })?;

    store.oppdater_status_og_merknad(oppgave.id, forrige, merknad, None)?;
    publiser(conn, store, oppgave.id, OppgaveHendelseType::AvVent, now)
}

/// Ids of held oppgaver whose frist has passed.
pub fn hent_utloept_paa_vent(
    conn: &Connection,
    now: DateTime<Utc>,
) -> Result<Vec<Uuid>, ServerError> {
    SqlOppgaveStore::new(conn).hent_utloept_paa_vent(now)
}

/// Releases one expired hold on behalf of the system.
pub fn ta_av_vent_utloept_frist(
    conn: &Connection,
    id: Uuid,
    now: DateTime<Utc>,
) -> Result<Oppgave, ServerError> {
    let store = store(conn, now);
    let oppgave = hent_aapen(&store, id)?;
    if oppgave.status != Status::PaaVent {
        return Ok(oppgave);
    }
    ta_av_vent(conn, &store, &oppgave, Some("Frist for på vent er utløpt"), now)
}

/// Closes an oppgave. An unowned oppgave is first assigned to the caller.
/// Attestable types closed from `ATTESTERING` go back to whoever sent them.
pub fn ferdigstill(
    conn: &Connection,
    bruker: &Bruker,
    id: Uuid,
    merknad: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Oppgave, ServerError> {
    krev_tildelingsrett(bruker)?;
    let store = store(conn, now);
    let oppgave = hent_aapen(&store, id)?;

    match &oppgave.saksbehandler {
        None => {
            store.oppdater_saksbehandler(id, bruker.ident())?;
            if oppgave.status == Status::Ny {
                store.oppdater_status(id, Status::UnderBehandling)?;
            }
        }
        Some(_) => krev_eierskap(bruker, &oppgave)?,
    }

    if oppgave.oppgave_type.er_attesterbar() && oppgave.status == Status::Attestering {
        if let Some(sender) = sender_til_attestering(conn, &oppgave)? {
            store.oppdater_saksbehandler(id, &sender)?;
        }
    }

    store.oppdater_status_og_merknad(id, Status::Ferdigstilt, merknad, None)?;
    publiser(conn, &store, id, OppgaveHendelseType::Ferdigstilt, now)
}

pub fn ferdigstill_for_referanse(
    conn: &Connection,
    bruker: &Bruker,
    referanse: &str,
    oppgave_type: OppgaveType,
    merknad: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Oppgave, ServerError> {
    let oppgave = finn_eneste_under_arbeid(&store(conn, now), referanse, oppgave_type)?;
    ferdigstill(conn, bruker, oppgave.id, merknad, now)
}

/// Hands the single open oppgave of `oppgave_type` for `referanse` over to
/// attestation, remembering who sent it.
pub fn send_til_attestering(
    conn: &Connection,
    bruker: &Bruker,
    referanse: &str,
    oppgave_type: OppgaveType,
    merknad: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Oppgave, ServerError> {
    let store = store(conn, now);
    let oppgave = finn_eneste_under_arbeid(&store, referanse, oppgave_type)?;

    if matches!(oppgave.status, Status::Attestering | Status::PaaVent) {
        return Err(ServerError::conflict(
            "UGYLDIG_STATUS_FOR_ATTESTERING",
            format!(
                "Oppgave {} har status {} og kan ikke sendes til attestering",
                oppgave.id, oppgave.status
            ),
        ));
    }
    let saksbehandler = oppgave.saksbehandler.clone().ok_or_else(|| {
        ServerError::internal(format!(
            "Oppgave {} mangler saksbehandler ved sending til attestering",
            oppgave.id
        ))
    })?;
    krev_eierskap(bruker, &oppgave)?;

    store.oppdater_status_og_merknad(oppgave.id, Status::Attestering, merknad, None)?;
    store.oppdater_forrige_saksbehandler(oppgave.id, Some(&saksbehandler))?;
    store.fjern_saksbehandler(oppgave.id)?;
    publiser(conn, &store, oppgave.id, OppgaveHendelseType::Attestering, now)
}

/// Rejects an attestation. The sender gets the oppgave back unless it was a
/// system account, in which case nobody owns it.
pub fn underkjenn(
    conn: &Connection,
    bruker: &Bruker,
    referanse: &str,
    oppgave_type: OppgaveType,
    merknad: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Oppgave, ServerError> {
    if !(bruker.er_attestant() || bruker.can_act_as_system()) {
        return Err(ServerError::Forbidden(format!(
            "{} har ikke attestantrolle",
            bruker.ident()
        )));
    }
    let store = store(conn, now);
    let oppgave = finn_eneste_under_arbeid(&store, referanse, oppgave_type)?;
    if oppgave.status != Status::Attestering {
        return Err(ServerError::conflict(
            "OPPGAVE_IKKE_TIL_ATTESTERING",
            format!("Oppgave {} har status {}", oppgave.id, oppgave.status),
        ));
    }

    let sender = sender_til_attestering(conn, &oppgave)?;
    store.oppdater_status_og_merknad(oppgave.id, Status::Underkjent, merknad, None)?;
    match sender.filter(|ident| !er_systemident(ident)) {
        Some(ident) => store.oppdater_saksbehandler(oppgave.id, &ident)?,
        None => {
            if oppgave.saksbehandler.is_some() {
                store.fjern_saksbehandler(oppgave.id)?;
            }
        }
    }
    publiser(conn, &store, oppgave.id, OppgaveHendelseType::Underkjent, now)
}

pub fn avbryt(
    conn: &Connection,
    bruker: &Bruker,
    id: Uuid,
    merknad: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Oppgave, ServerError> {
    krev_tildelingsrett(bruker)?;
    let store = store(conn, now);
    hent_aapen(&store, id)?;
    store.oppdater_status_og_merknad(id, Status::Avbrutt, merknad, None)?;
    publiser(conn, &store, id, OppgaveHendelseType::Avbrutt, now)
}

/// Cancels every open oppgave for `referanse`.
pub fn avbryt_for_referanse(
    conn: &Connection,
    bruker: &Bruker,
    referanse: &str,
    merknad: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Vec<Oppgave>, ServerError> {
    let aapne: Vec<Uuid> = store(conn, now)
        .hent_for_referanse(referanse)?
        .into_iter()
        .filter(|o| o.status.er_under_arbeid())
        .map(|o| o.id)
        .collect();

    aapne
        .into_iter()
        .map(|id| avbryt(conn, bruker, id, merknad, now))
        .collect()
}

/// Whether the caller may see data belonging to `sak_id`.
pub(crate) fn kan_se_sak(conn: &Connection, bruker: &Bruker, sak_id: i64) -> Result<bool, ServerError> {
    if bruker.kan_se_strengt_fortrolig() {
        return Ok(true);
    }
    Ok(hent_sak(conn, sak_id)?
        .map(|sak| !sak.adressebeskyttelse.er_strengt_fortrolig())
        .unwrap_or(true))
}

fn kan_se(conn: &Connection, bruker: &Bruker, oppgave: &Oppgave) -> Result<bool, ServerError> {
    kan_se_sak(conn, bruker, oppgave.sak_id)
}

/// Reads one oppgave. Strictly confidential saker look absent to callers
/// without clearance.
pub fn hent_oppgave(conn: &Connection, bruker: &Bruker, id: Uuid) -> Result<Oppgave, ServerError> {
    let oppgave = SqlOppgaveStore::new(conn)
        .hent(id)?
        .ok_or_else(|| ServerError::NotFound(format!("Oppgave {id}")))?;
    if kan_se(conn, bruker, &oppgave)? {
        Ok(oppgave)
    } else {
        Err(ServerError::NotFound(format!("Oppgave {id}")))
    }
}

pub fn hent_historikk(
    conn: &Connection,
    bruker: &Bruker,
    id: Uuid,
) -> Result<Vec<OppgaveEndring>, ServerError> {
    hent_oppgave(conn, bruker, id)?;
    hent_endringer(conn, id)
}

/// The caller's list view: their units, optionally narrowed by status and type.
pub fn hent_oppgaver(
    conn: &Connection,
    bruker: &Bruker,
    statuser: Vec<Status>,
    typer: Vec<OppgaveType>,
    kun_mine: bool,
) -> Result<Vec<Oppgave>, ServerError> {
    if !bruker.can_assign() {
        return Err(ServerError::Forbidden(format!(
            "{} kan ikke liste oppgaver",
            bruker.ident()
        )));
    }
    let filter = OppgaveFilter {
        enheter: bruker.enheter().to_vec(),
        statuser,
        typer,
        saksbehandler: kun_mine.then(|| bruker.ident().to_string()),
        inkluder_strengt_fortrolig: bruker.kan_se_strengt_fortrolig(),
    };
    SqlOppgaveStore::new(conn).hent_med_filter(&filter)
}
