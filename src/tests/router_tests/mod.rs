mod admin_tests;
mod avkorting_tests;
mod oppgave_tests;
mod vedtak_tests;

use crate::auth::tokens::{utsted_token, TokenKind};
use crate::db::saker::opprett_sak;
use crate::db::saksbehandlere::{lagre_saksbehandler, SaksbehandlerInfo};
use crate::db::Database;
use crate::domain::bruker::Rolle;
use crate::domain::oppgave::{Adressebeskyttelse, Sak};
use crate::errors::ServerError;
use crate::router::handle;
use crate::responses::error_response;
use astra::{Body, Request, Response};
use chrono::Utc;
use http::Method;
use std::io::Read;

/// Registers a saksbehandler profile and returns a bearer token for it.
pub(crate) fn token_for(db: &Database, ident: &str, roller: &[Rolle]) -> String {
    db.with_tx(|tx| {
        lagre_saksbehandler(
            tx,
            &SaksbehandlerInfo {
                ident: ident.into(),
                navn: format!("Saksbehandler {ident}"),
                roller: roller.to_vec(),
                enheter: vec!["4808".into()],
            },
        )?;
        utsted_token(tx, ident, TokenKind::Saksbehandler, Utc::now())
    })
    .unwrap()
}

pub(crate) fn system_token(db: &Database) -> String {
    db.with_tx(|tx| utsted_token(tx, "etterlatte-behandling", TokenKind::System, Utc::now()))
        .unwrap()
}

pub(crate) fn borger_token(db: &Database, ident: &str) -> String {
    db.with_tx(|tx| utsted_token(tx, ident, TokenKind::Borger, Utc::now()))
        .unwrap()
}

pub(crate) fn opprett_test_sak(db: &Database, id: i64) {
    opprett_gradert_sak(db, id, Adressebeskyttelse::Ugradert);
}

pub(crate) fn opprett_gradert_sak(db: &Database, id: i64, adressebeskyttelse: Adressebeskyttelse) {
    db.with_tx(|tx| {
        opprett_sak(
            tx,
            &Sak {
                id,
                ident: "01010012345".into(),
                sak_type: "OMSTILLINGSSTOENAD".into(),
                enhet: "4808".into(),
                adressebeskyttelse,
            },
        )
    })
    .unwrap();
}

pub(crate) fn request(method: Method, uri: &str, token: Option<&str>, body: Option<serde_json::Value>) -> Request {
    let mut req = Request::new(match body {
        Some(json) => Body::from(json.to_string()),
        None => Body::empty(),
    });
    *req.method_mut() = method;
    *req.uri_mut() = uri.parse().unwrap();
    if let Some(token) = token {
        req.headers_mut()
            .insert("Authorization", format!("Bearer {token}").parse().unwrap());
    }
    req
}

/// Runs the request the way the server does, errors included.
pub(crate) fn send(db: &Database, req: Request) -> Response {
    match handle(req, db) {
        Ok(resp) => resp,
        Err(err) => error_response(&err),
    }
}

pub(crate) fn json_body(resp: Response) -> serde_json::Value {
    let mut body = String::new();
    resp.into_body().reader().read_to_string(&mut body).unwrap();
    if body.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_str(&body).unwrap()
    }
}

#[test]
fn missing_or_unknown_token_is_unauthorized() {
    let (_dir, db) = crate::tests::utils::init_test_db();

    let resp = send(&db, request(Method::GET, "/api/nyeoppgaver", None, None));
    assert_eq!(resp.status(), 401);
    assert_eq!(json_body(resp)["code"], "UNAUTHORIZED");

    let resp = send(&db, request(Method::GET, "/api/nyeoppgaver", Some("tull"), None));
    assert_eq!(resp.status(), 401);
}

#[test]
fn liveness_needs_no_token() {
    let (_dir, db) = crate::tests::utils::init_test_db();
    let resp = send(&db, request(Method::GET, "/internal/isalive", None, None));
    assert_eq!(resp.status(), 200);
}

#[test]
fn unknown_route_is_not_found() -> Result<(), ServerError> {
    let (_dir, db) = crate::tests::utils::init_test_db();
    let token = token_for(&db, "Z111111", &[Rolle::Saksbehandler]);
    let resp = send(&db, request(Method::GET, "/api/finnes-ikke", Some(&token), None));
    assert_eq!(resp.status(), 404);
    Ok(())
}
