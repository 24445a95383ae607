// src/domain/vedtak.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::avkorting::Avkorting;
use crate::domain::periode::Maaned;
use crate::domain::text_enum;

text_enum! {
    pub enum VedtakStatus {
        Opprettet => "OPPRETTET",
        FattetVedtak => "FATTET_VEDTAK",
        Attestert => "ATTESTERT",
        Returnert => "RETURNERT",
    }
}

impl VedtakStatus {
    /// Only a draft or a returned decision may be edited or fattet.
    pub fn kan_endres(self) -> bool {
        matches!(self, VedtakStatus::Opprettet | VedtakStatus::Returnert)
    }
}

text_enum! {
    pub enum VedtakType {
        Innvilgelse => "INNVILGELSE",
        Endring => "ENDRING",
        Opphoer => "OPPHOER",
        Avslag => "AVSLAG",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VedtakFattet {
    pub ansvarlig_saksbehandler: String,
    pub ansvarlig_enhet: String,
    pub tidspunkt: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attestasjon {
    pub attestant: String,
    pub attesterende_enhet: String,
    pub tidspunkt: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vedtak {
    pub id: Uuid,
    pub behandling_id: Uuid,
    pub sak_id: i64,
    pub vedtak_type: VedtakType,
    pub status: VedtakStatus,
    pub virkningstidspunkt: Maaned,
    pub fattet: Option<VedtakFattet>,
    pub attestasjon: Option<Attestasjon>,
    /// Frozen copy of the avkorting the decision was made on.
    pub avkorting: Option<Avkorting>,
    pub opprettet: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NyttVedtak {
    pub sak_id: i64,
    pub vedtak_type: VedtakType,
    pub virkningstidspunkt: Maaned,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnderkjennVedtak {
    pub begrunnelse: String,
    #[serde(default)]
    pub kommentar: Option<String>,
}
