// routes/avkorting.rs
use astra::Request;
use chrono::Utc;
use serde_json::json;

use crate::db::Database;
use crate::domain::bruker::Bruker;
use crate::domain::etteroppgjoer::FaktiskInntekt;
use crate::errors::ServerError;
use crate::responses::{no_content, ok_json, ResultResp};
use crate::routes::{les_json, parse_id};
use crate::service::avkorting::{self as service, AarligInntektsjustering, LagreAvkorting};

pub fn hent(db: &Database, bruker: &Bruker, behandling_id: &str) -> ResultResp {
    let behandling_id = parse_id(behandling_id)?;
    let avkorting = db.with_conn(|conn| service::hent_avkorting(conn, bruker, behandling_id))?;
    ok_json(&avkorting)
}

pub fn lagre(req: &mut Request, db: &Database, bruker: &Bruker, behandling_id: &str) -> ResultResp {
    let behandling_id = parse_id(behandling_id)?;
    let body: LagreAvkorting = les_json(req)?;
    let avkorting =
        db.with_tx(|tx| service::lagre_avkorting(tx, bruker, behandling_id, body, Utc::now()))?;
    ok_json(&avkorting)
}

pub fn slett(db: &Database, bruker: &Bruker, behandling_id: &str) -> ResultResp {
    let behandling_id = parse_id(behandling_id)?;
    db.with_tx(|tx| service::slett_avkorting(tx, bruker, behandling_id))?;
    no_content()
}

pub fn aarlig_inntektsjustering(
    req: &mut Request,
    db: &Database,
    bruker: &Bruker,
    behandling_id: &str,
) -> ResultResp {
    let behandling_id = parse_id(behandling_id)?;
    let body: AarligInntektsjustering = les_json(req)?;
    let avkorting = db.with_tx(|tx| {
        service::aarlig_inntektsjustering(tx, bruker, behandling_id, body, Utc::now())
    })?;
    ok_json(&avkorting)
}

pub fn hent_etteroppgjoer(db: &Database, bruker: &Bruker, behandling_id: &str) -> ResultResp {
    let behandling_id = parse_id(behandling_id)?;
    let resultater =
        db.with_conn(|conn| service::hent_etteroppgjoer(conn, bruker, behandling_id))?;
    ok_json(&resultater)
}

pub fn beregn_etteroppgjoer(
    req: &mut Request,
    db: &Database,
    bruker: &Bruker,
    behandling_id: &str,
    aar: &str,
) -> ResultResp {
    let behandling_id = parse_id(behandling_id)?;
    let aar: i32 = aar
        .parse()
        .map_err(|_| ServerError::BadRequest(format!("ugyldig år: {aar}")))?;
    let faktisk: FaktiskInntekt = les_json(req)?;
    let resultat = db.with_tx(|tx| {
        service::beregn_etteroppgjoer_for_aar(tx, bruker, behandling_id, aar, &faktisk, Utc::now())
    })?;
    ok_json(&resultat)
}

pub fn gjenopprett(db: &Database, bruker: &Bruker, behandling_id: &str) -> ResultResp {
    let behandling_id = parse_id(behandling_id)?;
    let aar =
        db.with_tx(|tx| service::gjenopprett_manglende_aarsoppgjoer(tx, bruker, behandling_id))?;
    ok_json(&json!({ "gjenopprettedeAar": aar }))
}
