// src/jobs/paa_vent.rs

//! Releases oppgaver whose hold has expired.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::db::Database;
use crate::errors::ServerError;
use crate::service::oppgave::{hent_utloept_paa_vent, ta_av_vent_utloept_frist};

/// Outcome of one pass.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Kjoering {
    pub tatt_av_vent: usize,
    pub feilet: usize,
}

/// One pass over expired holds. Each oppgave is released in its own
/// transaction; a failure is logged and the rest continue.
pub fn kjoer_en_gang(db: &Database, now: DateTime<Utc>) -> Result<Kjoering, ServerError> {
    let ider = db.with_conn(|conn| hent_utloept_paa_vent(conn, now))?;
    let mut kjoering = Kjoering::default();

    for id in ider {
        match db.with_tx(|tx| ta_av_vent_utloept_frist(tx, id, now)) {
            Ok(_) => kjoering.tatt_av_vent += 1,
            Err(e) => {
                kjoering.feilet += 1;
                tracing::warn!(oppgave_id = %id, error = %e, "kunne ikke ta oppgave av vent");
            }
        }
    }

    if kjoering.tatt_av_vent > 0 || kjoering.feilet > 0 {
        tracing::info!(
            tatt_av_vent = kjoering.tatt_av_vent,
            feilet = kjoering.feilet,
            "utløpte på vent behandlet"
        );
    }
    Ok(kjoering)
}

/// Runs `kjoer_en_gang` every `intervall` on a background thread.
pub fn start(db: Database, intervall: Duration) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("paa-vent".into())
        .spawn(move || loop {
            if let Err(e) = kjoer_en_gang(&db, Utc::now()) {
                tracing::error!(error = %e, "på vent-jobben feilet");
            }
            thread::sleep(intervall);
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::saker::opprett_sak;
    use crate::domain::bruker::{Bruker, Rolle};
    use crate::domain::oppgave::{
        Adressebeskyttelse, NyOppgave, OppgaveKilde, OppgaveType, Opprinnelse, PaaVentAarsak, Sak,
        Status,
    };
    use crate::service::oppgave::{
        hent_oppgave, opprett_oppgave, oppdater_paa_vent, tildel_saksbehandler, PaaVentRequest,
    };
    use crate::tests::utils::init_test_db;
    use chrono::{Duration as ChronoDuration, TimeZone};

    #[test]
    fn expired_hold_returns_to_previous_status() {
        let (_dir, db) = init_test_db();
        let t0 = Utc.with_ymd_and_hms(2024, 6, 3, 10, 0, 0).unwrap();
        let sb = Bruker::saksbehandler("Z111111", &[Rolle::Saksbehandler], &["4808"]);

        let (utloept, aktiv) = db
            .with_tx(|tx| {
                opprett_sak(
                    tx,
                    &Sak {
                        id: 1,
                        ident: "01010012345".into(),
                        sak_type: "OMSTILLINGSSTOENAD".into(),
                        enhet: "4808".into(),
                        adressebeskyttelse: Adressebeskyttelse::Ugradert,
                    },
                )?;
                let mut ider = Vec::new();
                for (referanse, dager) in [("a", 1), ("b", 30)] {
                    let o = opprett_oppgave(
                        tx,
                        &Bruker::system("etterlatte-behandling"),
                        NyOppgave {
                            sak_id: 1,
                            referanse: referanse.into(),
                            oppgave_type: OppgaveType::Revurdering,
                            kilde: OppgaveKilde::Behandling,
                            opprinnelse: Opprinnelse::Behandling,
                            merknad: None,
                            frist: None,
                            enhet: None,
                            saksbehandler: None,
                        },
                        t0,
                    )?;
                    tildel_saksbehandler(tx, &sb, o.id, "Z111111", t0)?;
                    oppdater_paa_vent(
                        tx,
                        &sb,
                        o.id,
                        &PaaVentRequest {
                            paa_vent: true,
                            aarsak: Some(PaaVentAarsak::Annet),
                            merknad: Some("venter på svar".into()),
                            frist: Some(t0 + ChronoDuration::days(dager)),
                        },
                        t0,
                    )?;
                    ider.push(o.id);
                }
                Ok((ider[0], ider[1]))
            })
            .unwrap();

        let kjoering = kjoer_en_gang(&db, t0 + ChronoDuration::days(2)).unwrap();
        assert_eq!(kjoering, Kjoering { tatt_av_vent: 1, feilet: 0 });

        db.with_conn(|conn| {
            assert_eq!(hent_oppgave(conn, &sb, utloept)?.status, Status::UnderBehandling);
            assert_eq!(hent_oppgave(conn, &sb, aktiv)?.status, Status::PaaVent);
            Ok(())
        })
        .unwrap();

        // Nothing left to do on the next pass.
        let igjen = kjoer_en_gang(&db, t0 + ChronoDuration::days(2)).unwrap();
        assert_eq!(igjen, Kjoering::default());
    }
}
