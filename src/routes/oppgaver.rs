// routes/oppgaver.rs
use astra::Request;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::db::Database;
use crate::domain::bruker::Bruker;
use crate::domain::oppgave::{NyOppgave, OppgaveKilde, OppgaveType, Status};
use crate::errors::ServerError;
use crate::responses::{ok_json, ResultResp};
use crate::routes::{les_json, les_valgfri_json, parse_id, parse_query};
use crate::service::oppgave::{self as service, PaaVentRequest};

#[derive(Deserialize)]
struct SaksbehandlerBody {
    saksbehandler: String,
}

#[derive(Deserialize)]
struct FristBody {
    frist: DateTime<Utc>,
}

#[derive(Deserialize)]
struct EnhetBody {
    enhet: String,
}

#[derive(Deserialize)]
struct KildeBody {
    kilde: OppgaveKilde,
}

#[derive(Deserialize, Default)]
struct MerknadBody {
    #[serde(default)]
    merknad: Option<String>,
}

/// Parses a comma separated query value into a list of enum values.
fn liste<T: std::str::FromStr<Err = String>>(raw: Option<&String>) -> Result<Vec<T>, ServerError> {
    raw.map(|v| {
        v.split(',')
            .filter(|s| !s.is_empty())
            .map(|s| s.parse().map_err(ServerError::BadRequest))
            .collect()
    })
    .unwrap_or_else(|| Ok(Vec::new()))
}

pub fn hent_oppgaver(req: &Request, db: &Database, bruker: &Bruker) -> ResultResp {
    let query = parse_query(req);
    let statuser: Vec<Status> = liste(query.get("status"))?;
    let typer: Vec<OppgaveType> = liste(query.get("type"))?;
    let kun_mine = query.get("kunMine").is_some_and(|v| v == "true");

    let oppgaver =
        db.with_conn(|conn| service::hent_oppgaver(conn, bruker, statuser, typer, kun_mine))?;
    ok_json(&oppgaver)
}

pub fn opprett(req: &mut Request, db: &Database, bruker: &Bruker) -> ResultResp {
    let ny: NyOppgave = les_json(req)?;
    let oppgave = db.with_tx(|tx| service::opprett_oppgave(tx, bruker, ny, Utc::now()))?;
    ok_json(&oppgave)
}

pub fn hent(db: &Database, bruker: &Bruker, id: &str) -> ResultResp {
    let id = parse_id(id)?;
    let oppgave = db.with_conn(|conn| service::hent_oppgave(conn, bruker, id))?;
    ok_json(&oppgave)
}

pub fn historikk(db: &Database, bruker: &Bruker, id: &str) -> ResultResp {
    let id = parse_id(id)?;
    let endringer = db.with_conn(|conn| service::hent_historikk(conn, bruker, id))?;
    ok_json(&endringer)
}

pub fn tildel(req: &mut Request, db: &Database, bruker: &Bruker, id: &str) -> ResultResp {
    let id = parse_id(id)?;
    let body: SaksbehandlerBody = les_json(req)?;
    let oppgave = db.with_tx(|tx| {
        service::tildel_saksbehandler(tx, bruker, id, &body.saksbehandler, Utc::now())
    })?;
    ok_json(&oppgave)
}

pub fn bytt(req: &mut Request, db: &Database, bruker: &Bruker, id: &str) -> ResultResp {
    let id = parse_id(id)?;
    let body: SaksbehandlerBody = les_json(req)?;
    let oppgave = db.with_tx(|tx| {
        service::bytt_saksbehandler(tx, bruker, id, &body.saksbehandler, Utc::now())
    })?;
    ok_json(&oppgave)
}

pub fn fjern_saksbehandler(db: &Database, bruker: &Bruker, id: &str) -> ResultResp {
    let id = parse_id(id)?;
    let oppgave = db.with_tx(|tx| service::fjern_saksbehandler(tx, bruker, id, Utc::now()))?;
    ok_json(&oppgave)
}

pub fn frist(req: &mut Request, db: &Database, bruker: &Bruker, id: &str) -> ResultResp {
    let id = parse_id(id)?;
    let body: FristBody = les_json(req)?;
    let oppgave = db.with_tx(|tx| service::endre_frist(tx, bruker, id, body.frist, Utc::now()))?;
    ok_json(&oppgave)
}

pub fn enhet(req: &mut Request, db: &Database, bruker: &Bruker, id: &str) -> ResultResp {
    let id = parse_id(id)?;
    let body: EnhetBody = les_json(req)?;
    let oppgave = db.with_tx(|tx| service::endre_enhet(tx, bruker, id, &body.enhet, Utc::now()))?;
    ok_json(&oppgave)
}

pub fn kilde(req: &mut Request, db: &Database, bruker: &Bruker, id: &str) -> ResultResp {
    let id = parse_id(id)?;
    let body: KildeBody = les_json(req)?;
    let oppgave = db.with_tx(|tx| service::endre_kilde(tx, bruker, id, body.kilde, Utc::now()))?;
    ok_json(&oppgave)
}

pub fn paa_vent(req: &mut Request, db: &Database, bruker: &Bruker, id: &str) -> ResultResp {
    let id = parse_id(id)?;
    let body: PaaVentRequest = les_json(req)?;
    let oppgave = db.with_tx(|tx| service::oppdater_paa_vent(tx, bruker, id, &body, Utc::now()))?;
    ok_json(&oppgave)
}

pub fn ferdigstill(req: &mut Request, db: &Database, bruker: &Bruker, id: &str) -> ResultResp {
    let id = parse_id(id)?;
    let body: MerknadBody = les_valgfri_json(req)?;
    let oppgave = db.with_tx(|tx| {
        service::ferdigstill(tx, bruker, id, body.merknad.as_deref(), Utc::now())
    })?;
    ok_json(&oppgave)
}

pub fn avbryt(req: &mut Request, db: &Database, bruker: &Bruker, id: &str) -> ResultResp {
    let id = parse_id(id)?;
    let body: MerknadBody = les_valgfri_json(req)?;
    let oppgave =
        db.with_tx(|tx| service::avbryt(tx, bruker, id, body.merknad.as_deref(), Utc::now()))?;
    ok_json(&oppgave)
}

pub fn avbryt_for_referanse(
    req: &mut Request,
    db: &Database,
    bruker: &Bruker,
    referanse: &str,
) -> ResultResp {
    let body: MerknadBody = les_valgfri_json(req)?;
    let oppgaver = db.with_tx(|tx| {
        service::avbryt_for_referanse(tx, bruker, referanse, body.merknad.as_deref(), Utc::now())
    })?;
    ok_json(&oppgaver)
}
