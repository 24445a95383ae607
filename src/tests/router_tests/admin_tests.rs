use super::*;
use crate::tests::utils::init_test_db;
use serde_json::json;

#[test]
fn system_registers_sak_and_provisions_saksbehandler() {
    let (_dir, db) = init_test_db();
    let system = system_token(&db);

    let sak = json!({
        "id": 7,
        "ident": "01010012345",
        "sakType": "OMSTILLINGSSTOENAD",
        "enhet": "4808",
        "adressebeskyttelse": "UGRADERT"
    });
    let resp = send(&db, request(Method::POST, "/api/saker", Some(&system), Some(sak.clone())));
    assert_eq!(resp.status(), 200);
    let resp = send(&db, request(Method::POST, "/api/saker", Some(&system), Some(sak)));
    assert_eq!(resp.status(), 409);

    let resp = send(
        &db,
        request(
            Method::PUT,
            "/api/saker/7/adressebeskyttelse",
            Some(&system),
            Some(json!({ "adressebeskyttelse": "FORTROLIG" })),
        ),
    );
    assert_eq!(json_body(resp)["adressebeskyttelse"], "FORTROLIG");

    let resp = send(
        &db,
        request(
            Method::PUT,
            "/api/saksbehandlere/Z123456",
            Some(&system),
            Some(json!({ "navn": "Ola", "roller": ["SAKSBEHANDLER"], "enheter": ["4808"] })),
        ),
    );
    assert_eq!(resp.status(), 204);

    let resp = send(
        &db,
        request(
            Method::POST,
            "/api/tokens",
            Some(&system),
            Some(json!({ "ident": "Z123456", "kind": "SAKSBEHANDLER" })),
        ),
    );
    let token = json_body(resp)["token"].as_str().unwrap().to_string();
    let resp = send(&db, request(Method::GET, "/api/nyeoppgaver", Some(&token), None));
    assert_eq!(resp.status(), 200);
}

#[test]
fn saksbehandler_cannot_provision() {
    let (_dir, db) = init_test_db();
    let sb = token_for(&db, "Z111111", &[Rolle::Saksbehandler]);
    let resp = send(
        &db,
        request(
            Method::POST,
            "/api/tokens",
            Some(&sb),
            Some(json!({ "ident": "Z111111", "kind": "SYSTEM" })),
        ),
    );
    assert_eq!(resp.status(), 403);
}

#[test]
fn logout_revokes_the_token() {
    let (_dir, db) = init_test_db();
    let sb = token_for(&db, "Z111111", &[Rolle::Saksbehandler]);

    let resp = send(&db, request(Method::DELETE, "/api/tokens", Some(&sb), None));
    assert_eq!(resp.status(), 204);
    let resp = send(&db, request(Method::GET, "/api/nyeoppgaver", Some(&sb), None));
    assert_eq!(resp.status(), 401);
}
