use super::*;
use crate::tests::utils::init_test_db;
use serde_json::json;

fn ny_oppgave(token: &str, referanse: &str) -> Request {
    request(
        Method::POST,
        "/api/nyeoppgaver",
        Some(token),
        Some(json!({
            "sakId": 1,
            "referanse": referanse,
            "type": "FOERSTEGANGSBEHANDLING",
            "kilde": "BEHANDLING",
            "opprinnelse": "BEHANDLING"
        })),
    )
}

#[test]
fn create_assign_and_read_history() {
    let (_dir, db) = init_test_db();
    opprett_test_sak(&db, 1);
    let system = system_token(&db);
    let sb = token_for(&db, "Z111111", &[Rolle::Saksbehandler]);

    let resp = send(&db, ny_oppgave(&system, "behandling-1"));
    assert_eq!(resp.status(), 200);
    let oppgave = json_body(resp);
    assert_eq!(oppgave["status"], "NY");
    assert_eq!(oppgave["enhet"], "4808");
    let id = oppgave["id"].as_str().unwrap().to_string();

    let resp = send(
        &db,
        request(
            Method::POST,
            &format!("/api/nyeoppgaver/{id}/tildel-saksbehandler"),
            Some(&sb),
            Some(json!({ "saksbehandler": "Z111111" })),
        ),
    );
    assert_eq!(resp.status(), 200);
    let tildelt = json_body(resp);
    assert_eq!(tildelt["status"], "UNDER_BEHANDLING");
    assert_eq!(tildelt["saksbehandler"], "Z111111");

    let resp = send(
        &db,
        request(Method::GET, &format!("/api/nyeoppgaver/{id}/historikk"), Some(&sb), None),
    );
    assert_eq!(resp.status(), 200);
    let historikk = json_body(resp);
    let endringer = historikk.as_array().unwrap();
    assert!(endringer.len() >= 2);
    assert_eq!(endringer[0]["endringstype"], "OPPRETTET");
    assert!(endringer.iter().any(|e| e["saksbehandler"] == "Z111111"));
}

#[test]
fn list_filters_on_status() {
    let (_dir, db) = init_test_db();
    opprett_test_sak(&db, 1);
    let system = system_token(&db);
    let sb = token_for(&db, "Z111111", &[Rolle::Saksbehandler]);

    assert_eq!(send(&db, ny_oppgave(&system, "a")).status(), 200);
    assert_eq!(send(&db, ny_oppgave(&system, "b")).status(), 200);

    let resp = send(&db, request(Method::GET, "/api/nyeoppgaver?status=NY", Some(&sb), None));
    assert_eq!(resp.status(), 200);
    assert_eq!(json_body(resp).as_array().unwrap().len(), 2);

    let resp = send(
        &db,
        request(Method::GET, "/api/nyeoppgaver?status=FERDIGSTILT", Some(&sb), None),
    );
    assert_eq!(json_body(resp).as_array().unwrap().len(), 0);

    let resp = send(&db, request(Method::GET, "/api/nyeoppgaver?status=TULL", Some(&sb), None));
    assert_eq!(resp.status(), 400);
}

#[test]
fn double_assignment_is_a_conflict() {
    let (_dir, db) = init_test_db();
    opprett_test_sak(&db, 1);
    let system = system_token(&db);
    let sb = token_for(&db, "Z111111", &[Rolle::Saksbehandler]);
    let annen = token_for(&db, "Z222222", &[Rolle::Saksbehandler]);

    let id = json_body(send(&db, ny_oppgave(&system, "c")))["id"]
        .as_str()
        .unwrap()
        .to_string();
    let tildel = |token: &str, ident: &str| {
        request(
            Method::POST,
            &format!("/api/nyeoppgaver/{id}/tildel-saksbehandler"),
            Some(token),
            Some(json!({ "saksbehandler": ident })),
        )
    };

    assert_eq!(send(&db, tildel(&sb, "Z111111")).status(), 200);
    let resp = send(&db, tildel(&annen, "Z222222"));
    assert_eq!(resp.status(), 409);
    assert_eq!(json_body(resp)["code"], "OPPGAVE_ALLEREDE_TILDELT");
}

#[test]
fn malformed_body_and_id_are_bad_requests() {
    let (_dir, db) = init_test_db();
    let sb = token_for(&db, "Z111111", &[Rolle::Saksbehandler]);

    let resp = send(&db, request(Method::GET, "/api/nyeoppgaver/ikke-en-uuid", Some(&sb), None));
    assert_eq!(resp.status(), 400);

    let resp = send(
        &db,
        request(Method::POST, "/api/nyeoppgaver", Some(&sb), Some(json!({ "sakId": "x" }))),
    );
    assert_eq!(resp.status(), 400);
}
