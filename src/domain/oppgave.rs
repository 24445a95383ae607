// src/domain/oppgave.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::text_enum;

text_enum! {
    /// Lifecycle status of an oppgave.
    pub enum Status {
        Ny => "NY",
        UnderBehandling => "UNDER_BEHANDLING",
        Attestering => "ATTESTERING",
        Underkjent => "UNDERKJENT",
        PaaVent => "PAA_VENT",
        Ferdigstilt => "FERDIGSTILT",
        Avbrutt => "AVBRUTT",
    }
}

impl Status {
    pub fn er_avsluttet(self) -> bool {
        matches!(self, Status::Ferdigstilt | Status::Avbrutt)
    }

    pub fn er_under_arbeid(self) -> bool {
        !self.er_avsluttet()
    }
}

text_enum! {
    pub enum OppgaveType {
        Foerstegangsbehandling => "FOERSTEGANGSBEHANDLING",
        Revurdering => "REVURDERING",
        VurderKonsekvens => "VURDER_KONSEKVENS",
        ManglerSoeknad => "MANGLER_SOEKNAD",
        KravpakkeUtland => "KRAVPAKKE_UTLAND",
        Klage => "KLAGE",
        Tilbakekreving => "TILBAKEKREVING",
        Omgjoering => "OMGJOERING",
        Journalfoering => "JOURNALFOERING",
        Tilleggsinformasjon => "TILLEGGSINFORMASJON",
        Etteroppgjoer => "ETTEROPPGJOER",
        AarligInntektsjustering => "AARLIG_INNTEKTSJUSTERING",
        Inntektsopplysning => "INNTEKTSOPPLYSNING",
        MeldtInnEndring => "MELDT_INN_ENDRING",
        Aktivitetsplikt => "AKTIVITETSPLIKT",
        GenerellOppgave => "GENERELL_OPPGAVE",
    }
}

impl OppgaveType {
    /// Types whose work ends in a formal decision that must be attested.
    pub fn er_attesterbar(self) -> bool {
        matches!(
            self,
            OppgaveType::Foerstegangsbehandling
                | OppgaveType::Revurdering
                | OppgaveType::Klage
                | OppgaveType::Tilbakekreving
                | OppgaveType::Omgjoering
                | OppgaveType::Etteroppgjoer
                | OppgaveType::AarligInntektsjustering
        )
    }
}

text_enum! {
    /// Source system that owns the referenced entity.
    pub enum OppgaveKilde {
        Behandling => "BEHANDLING",
        GenerellBehandling => "GENERELL_BEHANDLING",
        Hendelse => "HENDELSE",
        Tilbakekreving => "TILBAKEKREVING",
        Saksbehandler => "SAKSBEHANDLER",
        Gjenoppretting => "GJENOPPRETTING",
        Ekstern => "EKSTERN",
    }
}

text_enum! {
    /// What triggered the oppgave.
    pub enum Opprinnelse {
        Behandling => "BEHANDLING",
        Hendelse => "HENDELSE",
        Gosys => "GOSYS",
        Journalfoering => "JOURNALFOERING",
        Saksbehandler => "SAKSBEHANDLER",
        Automatisk => "AUTOMATISK",
        Ukjent => "UKJENT",
    }
}

text_enum! {
    pub enum PaaVentAarsak {
        OpplysningerFraBruker => "OPPLYSNING_FRA_BRUKER",
        OpplysningerFraAndreNav => "OPPLYSNING_FRA_ANDRE_NAV",
        Kravpakke => "KRAVPAKKE",
        Vedtak => "VEDTAK",
        Annet => "ANNET",
    }
}

text_enum! {
    /// Which store operation produced an audit record.
    pub enum Endringstype {
        Opprettet => "OPPRETTET",
        Saksbehandler => "SAKSBEHANDLER",
        Status => "STATUS",
        StatusOgMerknad => "STATUS_OG_MERKNAD",
        Enhet => "ENHET",
        Frist => "FRIST",
        Kilde => "KILDE",
    }
}

text_enum! {
    pub enum Adressebeskyttelse {
        Ugradert => "UGRADERT",
        Fortrolig => "FORTROLIG",
        StrengtFortrolig => "STRENGT_FORTROLIG",
        StrengtFortroligUtland => "STRENGT_FORTROLIG_UTLAND",
    }
}

impl Adressebeskyttelse {
    pub fn er_strengt_fortrolig(self) -> bool {
        matches!(
            self,
            Adressebeskyttelse::StrengtFortrolig | Adressebeskyttelse::StrengtFortroligUtland
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sak {
    pub id: i64,
    pub ident: String,
    pub sak_type: String,
    pub enhet: String,
    pub adressebeskyttelse: Adressebeskyttelse,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Oppgave {
    pub id: Uuid,
    pub status: Status,
    pub enhet: String,
    pub sak_id: i64,
    pub referanse: String,
    #[serde(rename = "type")]
    pub oppgave_type: OppgaveType,
    pub saksbehandler: Option<String>,
    pub forrige_saksbehandler: Option<String>,
    pub kilde: OppgaveKilde,
    pub opprinnelse: Opprinnelse,
    pub merknad: Option<String>,
    pub paa_vent_aarsak: Option<PaaVentAarsak>,
    pub opprettet: DateTime<Utc>,
    pub frist: Option<DateTime<Utc>>,
}

impl Oppgave {
    pub fn er_avsluttet(&self) -> bool {
        self.status.er_avsluttet()
    }

    pub fn er_tildelt(&self, ident: &str) -> bool {
        self.saksbehandler.as_deref() == Some(ident)
    }
}

/// Input for creating an oppgave. Enhet is taken from the sak when absent.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NyOppgave {
    pub sak_id: i64,
    pub referanse: String,
    #[serde(rename = "type")]
    pub oppgave_type: OppgaveType,
    pub kilde: OppgaveKilde,
    #[serde(default = "ukjent_opprinnelse")]
    pub opprinnelse: Opprinnelse,
    pub merknad: Option<String>,
    pub frist: Option<DateTime<Utc>>,
    pub enhet: Option<String>,
    pub saksbehandler: Option<String>,
}

fn ukjent_opprinnelse() -> Opprinnelse {
    Opprinnelse::Ukjent
}

/// Immutable snapshot of an oppgave after one mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OppgaveEndring {
    pub id: i64,
    pub oppgave_id: Uuid,
    pub tidspunkt: DateTime<Utc>,
    pub saksbehandler: Option<String>,
    pub status: Status,
    pub merknad: Option<String>,
    pub enhet: String,
    pub kilde: OppgaveKilde,
    pub endringstype: Endringstype,
}
