use super::*;
use crate::tests::utils::init_test_db;
use serde_json::json;

/// Registers a first-time grant behandling and returns its id.
fn foerstegangsbehandling(db: &Database) -> String {
    opprett_test_sak(db, 1);
    behandling_i_sak(db, 1)
}

fn behandling_i_sak(db: &Database, sak_id: i64) -> String {
    let system = system_token(db);
    let behandling_id = uuid::Uuid::new_v4().to_string();
    let resp = send(
        db,
        request(
            Method::POST,
            "/api/nyeoppgaver",
            Some(&system),
            Some(json!({
                "sakId": sak_id,
                "referanse": behandling_id,
                "type": "FOERSTEGANGSBEHANDLING",
                "kilde": "BEHANDLING"
            })),
        ),
    );
    assert_eq!(resp.status(), 200);
    behandling_id
}

fn grunnlag(fom: &str, aarsinntekt: i64) -> serde_json::Value {
    json!({
        "inntektsgrunnlag": { "fom": fom, "aarsinntekt": aarsinntekt },
        "virkningstidspunkt": fom,
        "beregnetYtelse": [{ "periode": { "fom": fom, "tom": null }, "beloep": 20000 }]
    })
}

#[test]
fn save_then_fetch_avkorting() {
    let (_dir, db) = init_test_db();
    let behandling_id = foerstegangsbehandling(&db);
    let sb = token_for(&db, "Z111111", &[Rolle::Saksbehandler]);
    let uri = format!("/api/beregning/avkorting/{behandling_id}");

    let resp = send(&db, request(Method::GET, &uri, Some(&sb), None));
    assert_eq!(resp.status(), 404);

    let resp = send(&db, request(Method::POST, &uri, Some(&sb), Some(grunnlag("2024-06", 300_000))));
    assert_eq!(resp.status(), 200);
    let lagret = json_body(resp);
    let oppgjoer = &lagret["aarsoppgjoer"][0];
    assert_eq!(oppgjoer["aar"], 2024);
    assert_eq!(oppgjoer["inntektsgrunnlag"].as_array().unwrap().len(), 1);
    for ytelse in oppgjoer["avkortetYtelse"].as_array().unwrap() {
        let netto = ytelse["ytelseEtterAvkorting"].as_i64().unwrap();
        assert!((0..=20_000).contains(&netto));
    }

    let resp = send(&db, request(Method::GET, &uri, Some(&sb), None));
    assert_eq!(resp.status(), 200);
    assert_eq!(json_body(resp), lagret);

    let resp = send(&db, request(Method::DELETE, &uri, Some(&sb), None));
    assert_eq!(resp.status(), 204);
    let resp = send(&db, request(Method::GET, &uri, Some(&sb), None));
    assert_eq!(resp.status(), 404);
}

#[test]
fn earlier_fom_than_latest_grunnlag_is_rejected() {
    let (_dir, db) = init_test_db();
    let behandling_id = foerstegangsbehandling(&db);
    let sb = token_for(&db, "Z111111", &[Rolle::Saksbehandler]);
    let uri = format!("/api/beregning/avkorting/{behandling_id}");

    assert_eq!(
        send(&db, request(Method::POST, &uri, Some(&sb), Some(grunnlag("2024-06", 300_000)))).status(),
        200
    );
    let resp = send(&db, request(Method::POST, &uri, Some(&sb), Some(grunnlag("2024-03", 200_000))));
    assert_eq!(resp.status(), 400);
    assert_eq!(json_body(resp)["code"], "FOM_FOER_SISTE_GRUNNLAG");
}

#[test]
fn etteroppgjoer_with_much_higher_income_is_tilbakekreving() {
    let (_dir, db) = init_test_db();
    let behandling_id = foerstegangsbehandling(&db);
    let sb = token_for(&db, "Z111111", &[Rolle::Saksbehandler]);
    let uri = format!("/api/beregning/avkorting/{behandling_id}");
    send(&db, request(Method::POST, &uri, Some(&sb), Some(grunnlag("2024-06", 300_000))));

    let resp = send(
        &db,
        request(
            Method::POST,
            &format!("{uri}/etteroppgjoer/2024"),
            Some(&sb),
            Some(json!({ "loennsinntekt": 600000 })),
        ),
    );
    assert_eq!(resp.status(), 200);
    let resultat = json_body(resp);
    assert_eq!(resultat["resultatType"], "TILBAKEKREVING");
    assert!(resultat["differanse"].as_i64().unwrap() > 0);

    let resp = send(&db, request(Method::GET, &format!("{uri}/etteroppgjoer"), Some(&sb), None));
    assert_eq!(json_body(resp).as_array().unwrap().len(), 1);

    let resp = send(
        &db,
        request(Method::POST, &format!("{uri}/etteroppgjoer/2019"), Some(&sb), Some(json!({}))),
    );
    assert_eq!(resp.status(), 404);
}

#[test]
fn borger_cannot_read_avkorting_or_vedtak() {
    let (_dir, db) = init_test_db();
    let behandling_id = foerstegangsbehandling(&db);
    let sb = token_for(&db, "Z111111", &[Rolle::Saksbehandler]);
    let borger = borger_token(&db, "01010012345");
    let uri = format!("/api/beregning/avkorting/{behandling_id}");
    send(&db, request(Method::POST, &uri, Some(&sb), Some(grunnlag("2024-06", 300_000))));

    for uri in [
        uri.clone(),
        format!("{uri}/etteroppgjoer"),
        format!("/api/vedtak/{behandling_id}"),
    ] {
        let resp = send(&db, request(Method::GET, &uri, Some(&borger), None));
        assert_eq!(resp.status(), 403, "{uri}");
    }
}

#[test]
fn strictly_confidential_avkorting_is_hidden_without_clearance() {
    let (_dir, db) = init_test_db();
    opprett_gradert_sak(&db, 2, Adressebeskyttelse::StrengtFortrolig);
    let behandling_id = behandling_i_sak(&db, 2);
    let system = system_token(&db);
    let sb = token_for(&db, "Z111111", &[Rolle::Saksbehandler]);
    let klarert = token_for(&db, "Z333333", &[Rolle::Saksbehandler, Rolle::StrengtFortrolig]);
    let uri = format!("/api/beregning/avkorting/{behandling_id}");

    let resp = send(&db, request(Method::POST, &uri, Some(&system), Some(grunnlag("2024-06", 300_000))));
    assert_eq!(resp.status(), 200);

    let resp = send(&db, request(Method::GET, &uri, Some(&sb), None));
    assert_eq!(resp.status(), 404);
    let resp = send(&db, request(Method::GET, &format!("{uri}/etteroppgjoer"), Some(&sb), None));
    assert_eq!(resp.status(), 404);
    let resp = send(&db, request(Method::POST, &uri, Some(&sb), Some(grunnlag("2024-07", 300_000))));
    assert_eq!(resp.status(), 404);

    let resp = send(&db, request(Method::GET, &uri, Some(&klarert), None));
    assert_eq!(resp.status(), 200);
}

#[test]
fn oversized_income_is_rejected_over_http() {
    let (_dir, db) = init_test_db();
    let behandling_id = foerstegangsbehandling(&db);
    let sb = token_for(&db, "Z111111", &[Rolle::Saksbehandler]);
    let uri = format!("/api/beregning/avkorting/{behandling_id}");

    let resp = send(
        &db,
        request(Method::POST, &uri, Some(&sb), Some(grunnlag("2024-06", 1_000_000_000_000_000_000))),
    );
    assert_eq!(resp.status(), 400);
    assert_eq!(json_body(resp)["code"], "BELOEP_FOR_STORT");
}
