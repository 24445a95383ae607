// routes/vedtak.rs
use astra::Request;
use chrono::Utc;
use serde::Deserialize;

use crate::db::Database;
use crate::domain::bruker::Bruker;
use crate::domain::vedtak::{NyttVedtak, UnderkjennVedtak};
use crate::responses::{ok_json, ResultResp};
use crate::routes::{les_json, les_valgfri_json, parse_id};
use crate::service::vedtak as service;

#[derive(Deserialize, Default)]
struct AttesterBody {
    #[serde(default)]
    kommentar: Option<String>,
}

pub fn hent(db: &Database, bruker: &Bruker, behandling_id: &str) -> ResultResp {
    let behandling_id = parse_id(behandling_id)?;
    let vedtak = db.with_conn(|conn| service::hent(conn, bruker, behandling_id))?;
    ok_json(&vedtak)
}

pub fn lagre(req: &mut Request, db: &Database, bruker: &Bruker, behandling_id: &str) -> ResultResp {
    let behandling_id = parse_id(behandling_id)?;
    let body: NyttVedtak = les_json(req)?;
    let vedtak = db.with_tx(|tx| {
        service::opprett_eller_oppdater(tx, bruker, behandling_id, body, Utc::now())
    })?;
    ok_json(&vedtak)
}

pub fn fatt(db: &Database, bruker: &Bruker, behandling_id: &str) -> ResultResp {
    let behandling_id = parse_id(behandling_id)?;
    let vedtak = db.with_tx(|tx| service::fatt(tx, bruker, behandling_id, Utc::now()))?;
    ok_json(&vedtak)
}

pub fn attester(req: &mut Request, db: &Database, bruker: &Bruker, behandling_id: &str) -> ResultResp {
    let behandling_id = parse_id(behandling_id)?;
    let body: AttesterBody = les_valgfri_json(req)?;
    let vedtak = db.with_tx(|tx| {
        service::attester(tx, bruker, behandling_id, body.kommentar.as_deref(), Utc::now())
    })?;
    ok_json(&vedtak)
}

pub fn underkjenn(req: &mut Request, db: &Database, bruker: &Bruker, behandling_id: &str) -> ResultResp {
    let behandling_id = parse_id(behandling_id)?;
    let body: UnderkjennVedtak = les_json(req)?;
    let vedtak =
        db.with_tx(|tx| service::underkjenn(tx, bruker, behandling_id, &body, Utc::now()))?;
    ok_json(&vedtak)
}
