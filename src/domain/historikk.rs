// src/domain/historikk.rs

//! Derived state read from an oppgave's change log.
//!
//! Both functions expect the log ordered oldest first, which is how
//! `db::endringer::hent_endringer` returns it.

use crate::domain::oppgave::{OppgaveEndring, Status};
use crate::errors::ServerError;

fn sjekk_rekkefoelge(endringer: &[OppgaveEndring]) -> Result<(), ServerError> {
    let sortert = endringer
        .windows(2)
        .all(|w| (w[0].tidspunkt, w[0].id) <= (w[1].tidspunkt, w[1].id));
    if sortert {
        Ok(())
    } else {
        Err(ServerError::internal("endringslogg er ikke sortert på tidspunkt"))
    }
}

/// The status held immediately before the most recent status change: the
/// newest record whose status differs from `gjeldende`.
pub fn forrige_status(
    endringer: &[OppgaveEndring],
    gjeldende: Status,
) -> Result<Option<Status>, ServerError> {
    sjekk_rekkefoelge(endringer)?;
    Ok(endringer
        .iter()
        .rev()
        .map(|e| e.status)
        .find(|status| *status != gjeldende))
}

/// The saksbehandler recorded on the newest transition into `ATTESTERING`.
pub fn siste_sender_til_attestering(
    endringer: &[OppgaveEndring],
) -> Result<Option<String>, ServerError> {
    sjekk_rekkefoelge(endringer)?;

    // A send is a record in ATTESTERING whose predecessor was neither
    // ATTESTERING nor PAA_VENT (releasing a hold is not a new send).
    let mut sender = None;
    let mut forrige: Option<Status> = None;
    for e in endringer {
        let fra_arbeid = !matches!(forrige, Some(Status::Attestering | Status::PaaVent));
        if e.status == Status::Attestering && fra_arbeid {
            if let Some(ident) = &e.saksbehandler {
                sender = Some(ident.clone());
            }
        }
        forrige = Some(e.status);
    }
    Ok(sender)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::oppgave::{Endringstype, OppgaveKilde};
    use chrono::{Duration, TimeZone, Utc};
    use uuid::Uuid;

    fn logg(statuser: &[(Status, Option<&str>)]) -> Vec<OppgaveEndring> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap();
        let id = Uuid::new_v4();
        statuser
            .iter()
            .enumerate()
            .map(|(i, (status, sb))| OppgaveEndring {
                id: i as i64 + 1,
                oppgave_id: id,
                tidspunkt: start + Duration::minutes(i as i64),
                saksbehandler: sb.map(str::to_string),
                status: *status,
                merknad: None,
                enhet: "4808".into(),
                kilde: OppgaveKilde::Behandling,
                endringstype: Endringstype::Status,
            })
            .collect()
    }

    #[test]
    fn finds_status_before_latest_change() {
        let endringer = logg(&[
            (Status::Ny, None),
            (Status::UnderBehandling, Some("Z123456")),
            (Status::Attestering, Some("Z123456")),
            (Status::PaaVent, Some("Z123456")),
        ]);
        assert_eq!(
            forrige_status(&endringer, Status::PaaVent).unwrap(),
            Some(Status::Attestering)
        );
    }

    #[test]
    fn repeated_records_with_current_status_are_skipped() {
        let endringer = logg(&[
            (Status::Ny, None),
            (Status::UnderBehandling, Some("Z1")),
            (Status::PaaVent, Some("Z1")),
            (Status::PaaVent, Some("Z2")),
        ]);
        assert_eq!(
            forrige_status(&endringer, Status::PaaVent).unwrap(),
            Some(Status::UnderBehandling)
        );
    }

    #[test]
    fn no_differing_status_gives_none() {
        let endringer = logg(&[(Status::Ny, None)]);
        assert_eq!(forrige_status(&endringer, Status::Ny).unwrap(), None);
    }

    #[test]
    fn unordered_log_is_rejected() {
        let mut endringer = logg(&[(Status::Ny, None), (Status::UnderBehandling, None)]);
        endringer.reverse();
        assert!(forrige_status(&endringer, Status::UnderBehandling).is_err());
    }

    #[test]
    fn sender_is_taken_from_latest_attestation_entry() {
        let endringer = logg(&[
            (Status::UnderBehandling, Some("A111111")),
            (Status::Attestering, Some("A111111")),
            (Status::Attestering, None),
            (Status::Underkjent, Some("A111111")),
            (Status::UnderBehandling, Some("B222222")),
            (Status::Attestering, Some("B222222")),
            (Status::Attestering, None),
        ]);
        assert_eq!(
            siste_sender_til_attestering(&endringer).unwrap(),
            Some("B222222".to_string())
        );
    }
}
