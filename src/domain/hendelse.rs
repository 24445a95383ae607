// src/domain/hendelse.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::oppgave::{Oppgave, PaaVentAarsak, Status};
use crate::domain::text_enum;

text_enum! {
    /// Outbound statistics event kinds.
    pub enum OppgaveHendelseType {
        Opprettet => "OPPGAVE:OPPRETTET",
        Tildelt => "OPPGAVE:TILDELT",
        Endret => "OPPGAVE:ENDRET",
        PaaVent => "OPPGAVE:PAA_VENT",
        AvVent => "OPPGAVE:AV_VENT",
        Attestering => "OPPGAVE:ATTESTERING",
        Underkjent => "OPPGAVE:UNDERKJENT",
        Ferdigstilt => "OPPGAVE:FERDIGSTILT",
        Avbrutt => "OPPGAVE:AVBRUTT",
    }
}

/// Message for the statistics consumer, written to the outbox in the same
/// transaction as the change it describes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OppgaveHendelse {
    pub hendelse: OppgaveHendelseType,
    pub oppgave_id: Uuid,
    pub sak_id: i64,
    pub referanse: String,
    pub status: Status,
    pub saksbehandler: Option<String>,
    pub enhet: String,
    pub paa_vent_aarsak: Option<PaaVentAarsak>,
    pub tidspunkt: DateTime<Utc>,
}

impl OppgaveHendelse {
    pub fn fra(hendelse: OppgaveHendelseType, oppgave: &Oppgave, tidspunkt: DateTime<Utc>) -> Self {
        Self {
            hendelse,
            oppgave_id: oppgave.id,
            sak_id: oppgave.sak_id,
            referanse: oppgave.referanse.clone(),
            status: oppgave.status,
            saksbehandler: oppgave.saksbehandler.clone(),
            enhet: oppgave.enhet.clone(),
            paa_vent_aarsak: oppgave.paa_vent_aarsak,
            tidspunkt,
        }
    }
}
