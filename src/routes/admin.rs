// routes/admin.rs
//! Provisioning endpoints used by upstream systems and administrators.
use astra::Request;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::auth::bearer_token;
use crate::auth::tokens::{trekk_tilbake, utsted_token, TokenKind};
use crate::db::saker::{hent_sak, oppdater_adressebeskyttelse, opprett_sak};
use crate::db::saksbehandlere::{lagre_saksbehandler, SaksbehandlerInfo};
use crate::db::Database;
use crate::domain::bruker::{Bruker, Rolle};
use crate::domain::oppgave::{Adressebeskyttelse, Sak};
use crate::errors::ServerError;
use crate::responses::{no_content, ok_json, ResultResp};
use crate::routes::les_json;

#[derive(Deserialize)]
struct AdressebeskyttelseBody {
    adressebeskyttelse: Adressebeskyttelse,
}

#[derive(Deserialize)]
struct SaksbehandlerBody {
    navn: String,
    #[serde(default)]
    roller: Vec<Rolle>,
    #[serde(default)]
    enheter: Vec<String>,
}

#[derive(Deserialize)]
struct TokenBody {
    ident: String,
    kind: TokenKind,
}

#[derive(Serialize)]
struct UtstedtToken {
    token: String,
}

fn krev_system(bruker: &Bruker) -> Result<(), ServerError> {
    if bruker.can_act_as_system() {
        Ok(())
    } else {
        Err(ServerError::Forbidden(format!(
            "{} kan ikke utføre administrative operasjoner",
            bruker.ident()
        )))
    }
}

fn parse_sak_id(segment: &str) -> Result<i64, ServerError> {
    segment
        .parse()
        .map_err(|_| ServerError::BadRequest(format!("ugyldig sak-id: {segment}")))
}

pub fn registrer_sak(req: &mut Request, db: &Database, bruker: &Bruker) -> ResultResp {
    krev_system(bruker)?;
    let sak: Sak = les_json(req)?;
    db.with_tx(|tx| {
        if hent_sak(tx, sak.id)?.is_some() {
            return Err(ServerError::conflict(
                "SAK_FINNES",
                format!("sak {} finnes allerede", sak.id),
            ));
        }
        opprett_sak(tx, &sak)
    })?;
    tracing::info!(sak_id = sak.id, enhet = %sak.enhet, "sak registrert");
    ok_json(&sak)
}

pub fn endre_adressebeskyttelse(
    req: &mut Request,
    db: &Database,
    bruker: &Bruker,
    sak_id: &str,
) -> ResultResp {
    krev_system(bruker)?;
    let sak_id = parse_sak_id(sak_id)?;
    let body: AdressebeskyttelseBody = les_json(req)?;
    let sak = db.with_tx(|tx| {
        hent_sak(tx, sak_id)?
            .ok_or_else(|| ServerError::NotFound(format!("sak {sak_id}")))?;
        oppdater_adressebeskyttelse(tx, sak_id, body.adressebeskyttelse)?;
        hent_sak(tx, sak_id)?.ok_or_else(|| ServerError::NotFound(format!("sak {sak_id}")))
    })?;
    tracing::info!(sak_id, gradering = %sak.adressebeskyttelse, "adressebeskyttelse endret");
    ok_json(&sak)
}

pub fn lagre_profil(
    req: &mut Request,
    db: &Database,
    bruker: &Bruker,
    ident: &str,
) -> ResultResp {
    krev_system(bruker)?;
    let body: SaksbehandlerBody = les_json(req)?;
    let info = SaksbehandlerInfo {
        ident: ident.to_string(),
        navn: body.navn,
        roller: body.roller,
        enheter: body.enheter,
    };
    db.with_tx(|tx| lagre_saksbehandler(tx, &info))?;
    no_content()
}

pub fn utsted(req: &mut Request, db: &Database, bruker: &Bruker) -> ResultResp {
    krev_system(bruker)?;
    let body: TokenBody = les_json(req)?;
    let token = db.with_tx(|tx| utsted_token(tx, &body.ident, body.kind, Utc::now()))?;
    tracing::info!(ident = %body.ident, kind = %body.kind, utstedt_av = bruker.ident(), "token utstedt");
    ok_json(&UtstedtToken { token })
}

/// Revokes the token the request was made with.
pub fn logg_ut(req: &Request, db: &Database) -> ResultResp {
    let token = bearer_token(req)?;
    db.with_tx(|tx| trekk_tilbake(tx, token, Utc::now()))?;
    no_content()
}
