// src/domain/etteroppgjoer.rs

//! Year-end settlement: the reduction for a finished year is recomputed with
//! the income actually earned and compared to what was withheld.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::domain::avkorting::{
    avrund, beregn_avkortingsbeloep, krev_gyldige_beloep, Aarsoppgjoer, Inntektsgrunnlag, Kilde,
    RegelResultat, REGEL_VERSJON,
};
use crate::domain::grunnbeloep::rettsgebyr_for;
use crate::domain::periode::Periode;
use crate::domain::text_enum;
use crate::errors::ServerError;

text_enum! {
    pub enum ResultatType {
        Tilbakekreving => "TILBAKEKREVING",
        Etterbetaling => "ETTERBETALING",
        IngenEndring => "INGEN_ENDRING",
    }
}

/// Income for the year as reported after the fact.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaktiskInntekt {
    #[serde(default)]
    pub loennsinntekt: i64,
    #[serde(default)]
    pub naeringsinntekt: i64,
    #[serde(default)]
    pub afp: i64,
    #[serde(default)]
    pub inntekt_utland: i64,
    #[serde(default)]
    pub spesifikasjon: String,
}

impl FaktiskInntekt {
    fn innenlands(&self) -> i64 {
        self.loennsinntekt + self.naeringsinntekt + self.afp
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EtteroppgjoerResultat {
    pub id: Uuid,
    pub behandling_id: Uuid,
    pub aar: i32,
    pub utbetalt_avkorting: i64,
    pub ny_avkorting: i64,
    /// Positive when too little was withheld.
    pub differanse: i64,
    pub grense_tilbakekreving: i64,
    pub grense_etterbetaling: i64,
    pub resultat_type: ResultatType,
    pub regel_resultat: RegelResultat,
    pub tidspunkt: DateTime<Utc>,
}

pub fn klassifiser(differanse: i64, rettsgebyr: i64) -> ResultatType {
    if differanse > rettsgebyr {
        ResultatType::Tilbakekreving
    } else if -differanse > avrund(rettsgebyr, 4) {
        ResultatType::Etterbetaling
    } else {
        ResultatType::IngenEndring
    }
}

/// Settles `oppgjoer` against `faktisk`. Only months with a paid benefit
/// count, both for the annualisation and the comparison.
pub fn beregn_etteroppgjoer(
    behandling_id: Uuid,
    oppgjoer: &Aarsoppgjoer,
    faktisk: &FaktiskInntekt,
    kilde: Kilde,
    tidspunkt: DateTime<Utc>,
) -> Result<EtteroppgjoerResultat, ServerError> {
    krev_gyldige_beloep(&[
        faktisk.loennsinntekt,
        faktisk.naeringsinntekt,
        faktisk.afp,
        faktisk.inntekt_utland,
    ])?;
    if faktisk.innenlands() < 0 || faktisk.inntekt_utland < 0 {
        return Err(ServerError::validation(
            "NEGATIVT_BELOEP",
            "Faktisk inntekt kan ikke være negativ",
        ));
    }

    let maaneder = oppgjoer.utbetalte_maaneder();
    let (foerste, siste) = match (maaneder.first(), maaneder.last()) {
        (Some(foerste), Some(siste)) => (foerste.maaned, siste.maaned),
        _ => {
            return Err(ServerError::validation(
                "INGEN_UTBETALING_I_AARET",
                format!("Ingen utbetalt ytelse i {}", oppgjoer.aar),
            ))
        }
    };

    let grunnlag = Inntektsgrunnlag {
        id: Uuid::new_v4(),
        periode: Periode::new(foerste, Some(siste)),
        aarsinntekt: faktisk.innenlands(),
        fratrekk_inn_aar: 0,
        inntekt_utland: faktisk.inntekt_utland,
        fratrekk_utland: 0,
        relevante_maaneder: maaneder.len() as u32,
        spesifikasjon: faktisk.spesifikasjon.clone(),
        kilde,
    };

    let utbetalt_avkorting: i64 = maaneder.iter().map(|u| u.trekk).sum();
    let mut ny_avkorting = 0;
    for utbetalt in &maaneder {
        let ny = beregn_avkortingsbeloep(Some(&grunnlag), utbetalt.maaned, tidspunkt)?;
        ny_avkorting += utbetalt.mulig_trekk(ny.avkortingsbeloep);
    }
    let differanse = ny_avkorting - utbetalt_avkorting;

    let rettsgebyr = rettsgebyr_for(oppgjoer.aar)?;
    let grense_etterbetaling = avrund(rettsgebyr, 4);
    let resultat_type = klassifiser(differanse, rettsgebyr);

    let regel_resultat = RegelResultat {
        regel: "etteroppgjoer".to_string(),
        versjon: REGEL_VERSJON.to_string(),
        tidspunkt,
        input: json!({
            "aar": oppgjoer.aar,
            "faktiskInntekt": grunnlag.aarsinntekt,
            "inntektUtland": grunnlag.inntekt_utland,
            "innvilgedeMaaneder": maaneder.len(),
            "forventetInntekt": grunnlag.forventet_inntekt(),
            "rettsgebyr": rettsgebyr,
        }),
        resultat: json!({
            "utbetaltAvkorting": utbetalt_avkorting,
            "nyAvkorting": ny_avkorting,
            "differanse": differanse,
            "resultatType": resultat_type,
        }),
    };

    Ok(EtteroppgjoerResultat {
        id: Uuid::new_v4(),
        behandling_id,
        aar: oppgjoer.aar,
        utbetalt_avkorting,
        ny_avkorting,
        differanse,
        grense_tilbakekreving: rettsgebyr,
        grense_etterbetaling,
        resultat_type,
        regel_resultat,
        tidspunkt,
    })
}
