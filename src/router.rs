use crate::auth::bruker_fra_request;
use crate::db::Database;
use crate::errors::ServerError;
use crate::responses::ResultResp;
use crate::routes::{admin, avkorting, oppgaver, vedtak};
use astra::{Body, Request, ResponseBuilder};

pub fn handle(mut req: Request, db: &Database) -> ResultResp {
    let method = req.method().as_str().to_string();
    let path = req.uri().path().to_string();
    let segments: Vec<&str> = path.trim_matches('/').split('/').collect();

    if let ("GET", ["internal", "isalive"]) = (method.as_str(), segments.as_slice()) {
        return ResponseBuilder::new()
            .status(200)
            .body(Body::from("ALIVE"))
            .map_err(|e| ServerError::internal(format!("build response failed: {e}")));
    }

    let bruker = db.with_conn(|conn| bruker_fra_request(&req, conn))?;
    tracing::debug!(%method, %path, bruker = bruker.ident(), "request");

    let req = &mut req;
    match (method.as_str(), segments.as_slice()) {
        ("GET", ["api", "nyeoppgaver"]) => oppgaver::hent_oppgaver(req, db, &bruker),
        ("POST", ["api", "nyeoppgaver"]) => oppgaver::opprett(req, db, &bruker),
        ("PUT", ["api", "nyeoppgaver", "referanse", referanse, "avbryt"]) => {
            oppgaver::avbryt_for_referanse(req, db, &bruker, referanse)
        }
        ("GET", ["api", "nyeoppgaver", id]) => oppgaver::hent(db, &bruker, id),
        ("GET", ["api", "nyeoppgaver", id, "historikk"]) => oppgaver::historikk(db, &bruker, id),
        ("POST", ["api", "nyeoppgaver", id, "tildel-saksbehandler"]) => {
            oppgaver::tildel(req, db, &bruker, id)
        }
        ("POST", ["api", "nyeoppgaver", id, "bytt-saksbehandler"]) => {
            oppgaver::bytt(req, db, &bruker, id)
        }
        ("DELETE", ["api", "nyeoppgaver", id, "saksbehandler"]) => {
            oppgaver::fjern_saksbehandler(db, &bruker, id)
        }
        ("PUT", ["api", "nyeoppgaver", id, "frist"]) => oppgaver::frist(req, db, &bruker, id),
        ("PUT", ["api", "nyeoppgaver", id, "enhet"]) => oppgaver::enhet(req, db, &bruker, id),
        ("PUT", ["api", "nyeoppgaver", id, "kilde"]) => oppgaver::kilde(req, db, &bruker, id),
        ("POST", ["api", "nyeoppgaver", id, "paa-vent"]) => oppgaver::paa_vent(req, db, &bruker, id),
        ("PUT", ["api", "nyeoppgaver", id, "ferdigstill"]) => {
            oppgaver::ferdigstill(req, db, &bruker, id)
        }
        ("PUT", ["api", "nyeoppgaver", id, "avbryt"]) => oppgaver::avbryt(req, db, &bruker, id),

        ("GET", ["api", "beregning", "avkorting", id]) => avkorting::hent(db, &bruker, id),
        ("POST", ["api", "beregning", "avkorting", id]) => avkorting::lagre(req, db, &bruker, id),
        ("DELETE", ["api", "beregning", "avkorting", id]) => avkorting::slett(db, &bruker, id),
        ("POST", ["api", "beregning", "avkorting", id, "aarlig-inntektsjustering"]) => {
            avkorting::aarlig_inntektsjustering(req, db, &bruker, id)
        }
        ("GET", ["api", "beregning", "avkorting", id, "etteroppgjoer"]) => {
            avkorting::hent_etteroppgjoer(db, &bruker, id)
        }
        ("POST", ["api", "beregning", "avkorting", id, "etteroppgjoer", aar]) => {
            avkorting::beregn_etteroppgjoer(req, db, &bruker, id, aar)
        }
        ("POST", ["api", "beregning", "avkorting", id, "gjenopprett"]) => {
            avkorting::gjenopprett(db, &bruker, id)
        }

        ("GET", ["api", "vedtak", id]) => vedtak::hent(db, &bruker, id),
        ("POST", ["api", "vedtak", id]) => vedtak::lagre(req, db, &bruker, id),
        ("POST", ["api", "vedtak", id, "fatt"]) => vedtak::fatt(db, &bruker, id),
        ("POST", ["api", "vedtak", id, "attester"]) => vedtak::attester(req, db, &bruker, id),
        ("POST", ["api", "vedtak", id, "underkjenn"]) => vedtak::underkjenn(req, db, &bruker, id),

        ("POST", ["api", "saker"]) => admin::registrer_sak(req, db, &bruker),
        ("PUT", ["api", "saker", sak_id, "adressebeskyttelse"]) => {
            admin::endre_adressebeskyttelse(req, db, &bruker, sak_id)
        }
        ("PUT", ["api", "saksbehandlere", ident]) => admin::lagre_profil(req, db, &bruker, ident),
        ("POST", ["api", "tokens"]) => admin::utsted(req, db, &bruker),
        ("DELETE", ["api", "tokens"]) => admin::logg_ut(req, db),

        _ => Err(ServerError::NotFound(format!("{method} {path}"))),
    }
}
