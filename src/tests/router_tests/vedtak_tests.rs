use super::*;
use crate::tests::utils::init_test_db;
use serde_json::json;

#[test]
fn fatt_attester_flow_over_http() {
    let (_dir, db) = init_test_db();
    opprett_test_sak(&db, 1);
    let system = system_token(&db);
    let sb = token_for(&db, "Z111111", &[Rolle::Saksbehandler]);
    let attestant = token_for(&db, "Z222222", &[Rolle::Attestant]);
    let behandling_id = uuid::Uuid::new_v4().to_string();

    let oppgave = json_body(send(
        &db,
        request(
            Method::POST,
            "/api/nyeoppgaver",
            Some(&system),
            Some(json!({
                "sakId": 1,
                "referanse": behandling_id,
                "type": "FOERSTEGANGSBEHANDLING",
                "kilde": "BEHANDLING",
                "saksbehandler": "Z111111"
            })),
        ),
    ));
    assert_eq!(oppgave["saksbehandler"], "Z111111");
    let oppgave_id = oppgave["id"].as_str().unwrap().to_string();

    let uri = format!("/api/vedtak/{behandling_id}");
    let resp = send(
        &db,
        request(
            Method::POST,
            &uri,
            Some(&sb),
            Some(json!({ "sakId": 1, "vedtakType": "INNVILGELSE", "virkningstidspunkt": "2024-06" })),
        ),
    );
    assert_eq!(resp.status(), 200);
    assert_eq!(json_body(resp)["status"], "OPPRETTET");

    let resp = send(&db, request(Method::POST, &format!("{uri}/fatt"), Some(&sb), None));
    assert_eq!(resp.status(), 200);
    assert_eq!(json_body(resp)["status"], "FATTET_VEDTAK");

    // The one who fattet may not attest.
    let resp = send(&db, request(Method::POST, &format!("{uri}/attester"), Some(&sb), None));
    assert_eq!(resp.status(), 403);

    let resp = send(
        &db,
        request(
            Method::POST,
            &format!("{uri}/attester"),
            Some(&attestant),
            Some(json!({ "kommentar": "ok" })),
        ),
    );
    assert_eq!(resp.status(), 200);
    let vedtak = json_body(resp);
    assert_eq!(vedtak["status"], "ATTESTERT");
    assert_eq!(vedtak["attestasjon"]["attestant"], "Z222222");

    let resp = send(
        &db,
        request(Method::GET, &format!("/api/nyeoppgaver/{oppgave_id}"), Some(&sb), None),
    );
    assert_eq!(json_body(resp)["status"], "FERDIGSTILT");
}

#[test]
fn missing_vedtak_is_not_found() {
    let (_dir, db) = init_test_db();
    let sb = token_for(&db, "Z111111", &[Rolle::Saksbehandler]);
    let uri = format!("/api/vedtak/{}", uuid::Uuid::new_v4());
    let resp = send(&db, request(Method::GET, &uri, Some(&sb), None));
    assert_eq!(resp.status(), 404);
    assert_eq!(json_body(resp)["code"], "NOT_FOUND");
}

#[test]
fn strictly_confidential_vedtak_is_hidden_without_clearance() {
    let (_dir, db) = init_test_db();
    opprett_gradert_sak(&db, 3, Adressebeskyttelse::StrengtFortroligUtland);
    let system = system_token(&db);
    let sb = token_for(&db, "Z111111", &[Rolle::Saksbehandler]);
    let uri = format!("/api/vedtak/{}", uuid::Uuid::new_v4());

    let resp = send(
        &db,
        request(
            Method::POST,
            &uri,
            Some(&system),
            Some(json!({ "sakId": 3, "vedtakType": "AVSLAG", "virkningstidspunkt": "2024-06" })),
        ),
    );
    assert_eq!(resp.status(), 200);

    assert_eq!(send(&db, request(Method::GET, &uri, Some(&sb), None)).status(), 404);
    assert_eq!(send(&db, request(Method::GET, &uri, Some(&system), None)).status(), 200);
}
