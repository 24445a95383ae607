// src/domain/avkorting.rs

//! Income-based reduction ("avkorting") of a survivor benefit.
//!
//! The declared annual income is turned into an expected yearly income,
//! the part above half a G is reduced by 45 %, and the result is spread
//! over twelve months. Every computed period carries the inputs and rule
//! version that produced it, so a result can be replayed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::domain::grunnbeloep::grunnbeloep_for;
use crate::domain::periode::{Maaned, Periode};
use crate::errors::ServerError;

pub const REGEL_VERSJON: &str = "avkorting-2024.1";
const AVKORTINGSFAKTOR_PROSENT: i64 = 45;
/// Upper bound for any single amount accepted from a caller.
pub const MAKS_BELOEP: i64 = 100_000_000_000;

/// Who produced a record, and when.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Kilde {
    pub ident: String,
    pub tidspunkt: DateTime<Utc>,
}

impl Kilde {
    pub fn new(ident: &str, tidspunkt: DateTime<Utc>) -> Self {
        Self {
            ident: ident.to_string(),
            tidspunkt,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegelResultat {
    pub regel: String,
    pub versjon: String,
    pub tidspunkt: DateTime<Utc>,
    pub input: Value,
    pub resultat: Value,
}

impl RegelResultat {
    fn ny(regel: &str, tidspunkt: DateTime<Utc>, input: Value, resultat: Value) -> Self {
        Self {
            regel: regel.to_string(),
            versjon: REGEL_VERSJON.to_string(),
            tidspunkt,
            input,
            resultat,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Inntektsgrunnlag {
    pub id: Uuid,
    pub periode: Periode,
    pub aarsinntekt: i64,
    pub fratrekk_inn_aar: i64,
    pub inntekt_utland: i64,
    pub fratrekk_utland: i64,
    /// Months of the year the benefit is granted for.
    pub relevante_maaneder: u32,
    pub spesifikasjon: String,
    pub kilde: Kilde,
}

impl Inntektsgrunnlag {
    /// Expected income for a full year, rounded down to whole thousands.
    pub fn forventet_inntekt(&self) -> i64 {
        let innenlands = (self.aarsinntekt - self.fratrekk_inn_aar).max(0);
        let utland = (self.inntekt_utland - self.fratrekk_utland).max(0);
        let maaneder = self.relevante_maaneder.clamp(1, 12) as i64;
        let aarlig = (innenlands + utland) * 12 / maaneder;
        aarlig / 1000 * 1000
    }
}

/// A caseworker's declaration, before it is placed in an `Aarsoppgjoer`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NyttInntektsgrunnlag {
    pub fom: Maaned,
    pub aarsinntekt: i64,
    #[serde(default)]
    pub fratrekk_inn_aar: i64,
    #[serde(default)]
    pub inntekt_utland: i64,
    #[serde(default)]
    pub fratrekk_utland: i64,
    #[serde(default)]
    pub relevante_maaneder: Option<u32>,
    #[serde(default)]
    pub spesifikasjon: String,
}

/// Benefit per month before reduction, as computed by the benefit calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YtelseFoerAvkorting {
    pub periode: Periode,
    pub beloep: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Avkortingsperiode {
    pub id: Uuid,
    pub periode: Periode,
    pub avkortingsbeloep: i64,
    pub inntektsgrunnlag: Option<Uuid>,
    pub regel_resultat: RegelResultat,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvkortetYtelse {
    pub id: Uuid,
    pub periode: Periode,
    pub ytelse_foer_avkorting: i64,
    pub avkortingsbeloep: i64,
    /// Extra monthly reduction that settles earlier months of the same year.
    pub restanse: i64,
    pub ytelse_etter_avkorting: i64,
    pub regel_resultat: RegelResultat,
}

/// All reduction data for one calendar year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Aarsoppgjoer {
    pub aar: i32,
    pub inntektsgrunnlag: Vec<Inntektsgrunnlag>,
    pub avkortingsperioder: Vec<Avkortingsperiode>,
    pub avkortet_ytelse: Vec<AvkortetYtelse>,
}

/// One paid month as it was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UtbetaltMaaned {
    pub maaned: Maaned,
    pub ytelse_foer_avkorting: i64,
    pub trekk: i64,
}

impl UtbetaltMaaned {
    /// The part of `avkortingsbeloep` that could be withheld from this month.
    pub fn mulig_trekk(&self, avkortingsbeloep: i64) -> i64 {
        avkortingsbeloep.min(self.ytelse_foer_avkorting)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Avkorting {
    pub aarsoppgjoer: Vec<Aarsoppgjoer>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Avkortingsberegning {
    pub forventet_inntekt: i64,
    pub avkortingsbeloep: i64,
    pub regel_resultat: RegelResultat,
}

/// Integer division rounded half away from zero.
pub(crate) fn avrund(teller: i64, nevner: i64) -> i64 {
    if teller >= 0 {
        (teller + nevner / 2) / nevner
    } else {
        -((-teller + nevner / 2) / nevner)
    }
}

/// Rejects amounts whose magnitude exceeds `MAKS_BELOEP`.
pub(crate) fn krev_gyldige_beloep(beloep: &[i64]) -> Result<(), ServerError> {
    match beloep.iter().find(|b| b.unsigned_abs() > MAKS_BELOEP as u64) {
        Some(b) => Err(ServerError::validation(
            "BELOEP_FOR_STORT",
            format!("Beløp {b} er større enn {MAKS_BELOEP}"),
        )),
        None => Ok(()),
    }
}

/// Monthly reduction for `maaned`. No grunnlag counts as zero income.
pub fn beregn_avkortingsbeloep(
    grunnlag: Option<&Inntektsgrunnlag>,
    maaned: Maaned,
    tidspunkt: DateTime<Utc>,
) -> Result<Avkortingsberegning, ServerError> {
    let grunnbeloep = grunnbeloep_for(maaned)?;
    let forventet_inntekt = grunnlag.map_or(0, Inntektsgrunnlag::forventet_inntekt);
    let over_halvt_g = (forventet_inntekt - grunnbeloep.halvt()).max(0);
    let avkortingsbeloep = avrund(over_halvt_g * AVKORTINGSFAKTOR_PROSENT, 100 * 12);

    let regel_resultat = RegelResultat::ny(
        "avkortingsbeloep",
        tidspunkt,
        json!({
            "maaned": maaned,
            "inntektsgrunnlag": grunnlag.map(|g| g.id),
            "aarsinntekt": grunnlag.map_or(0, |g| g.aarsinntekt),
            "fratrekkInnAar": grunnlag.map_or(0, |g| g.fratrekk_inn_aar),
            "inntektUtland": grunnlag.map_or(0, |g| g.inntekt_utland),
            "fratrekkUtland": grunnlag.map_or(0, |g| g.fratrekk_utland),
            "relevanteMaaneder": grunnlag.map_or(12, |g| g.relevante_maaneder),
            "grunnbeloep": grunnbeloep.beloep,
            "halvtGrunnbeloep": grunnbeloep.halvt(),
            "avkortingsfaktorProsent": AVKORTINGSFAKTOR_PROSENT,
        }),
        json!({
            "forventetInntekt": forventet_inntekt,
            "avkortingsbeloep": avkortingsbeloep,
        }),
    );

    Ok(Avkortingsberegning {
        forventet_inntekt,
        avkortingsbeloep,
        regel_resultat,
    })
}

fn ytelse_for(ytelse: &[YtelseFoerAvkorting], maaned: Maaned) -> Option<i64> {
    ytelse
        .iter()
        .rev()
        .find(|y| y.periode.inneholder(maaned))
        .map(|y| y.beloep)
}

/// Drops everything from `fom` onwards and closes periods that straddle it.
fn behold_foer<T>(items: &mut Vec<T>, fom: Maaned, periode: fn(&mut T) -> &mut Periode) {
    items.retain_mut(|item| {
        let p = periode(item);
        if p.fom >= fom {
            return false;
        }
        if p.tom.map_or(true, |tom| tom >= fom) {
            p.tom = Some(fom.forrige());
        }
        true
    });
}

impl Aarsoppgjoer {
    pub fn ny(aar: i32) -> Self {
        Self {
            aar,
            inntektsgrunnlag: Vec::new(),
            avkortingsperioder: Vec::new(),
            avkortet_ytelse: Vec::new(),
        }
    }

    pub fn grunnlag_for(&self, maaned: Maaned) -> Option<&Inntektsgrunnlag> {
        self.inntektsgrunnlag
            .iter()
            .rev()
            .find(|g| g.periode.inneholder(maaned))
    }

    /// Every month with a paid benefit and what was actually withheld.
    pub fn utbetalte_maaneder(&self) -> Vec<UtbetaltMaaned> {
        self.avkortet_ytelse
            .iter()
            .flat_map(|y| {
                let tom = y.periode.tom.unwrap_or(Maaned::desember(self.aar));
                let utbetalt = UtbetaltMaaned {
                    maaned: y.periode.fom,
                    ytelse_foer_avkorting: y.ytelse_foer_avkorting,
                    trekk: y.ytelse_foer_avkorting - y.ytelse_etter_avkorting,
                };
                y.periode
                    .fom
                    .til(tom)
                    .map(move |maaned| UtbetaltMaaned { maaned, ..utbetalt })
            })
            .collect()
    }

    /// Recomputes this year from `fom` to December. Earlier months keep
    /// what was already settled; any shortfall there becomes restanse.
    fn beregn_fra(
        &mut self,
        fom: Maaned,
        ytelse: &[YtelseFoerAvkorting],
        tidspunkt: DateTime<Utc>,
    ) -> Result<(), ServerError> {
        let tom = Maaned::desember(self.aar);
        behold_foer(&mut self.avkortingsperioder, fom, |p| &mut p.periode);
        behold_foer(&mut self.avkortet_ytelse, fom, |y| &mut y.periode);

        let maaneder_med_ytelse: Vec<(Maaned, i64)> = fom
            .til(tom)
            .filter_map(|m| ytelse_for(ytelse, m).map(|beloep| (m, beloep)))
            .collect();

        let gjeldende = self.grunnlag_for(fom);
        let mut skyldig = 0;
        let tidligere = self.utbetalte_maaneder();
        for utbetalt in &tidligere {
            let ny = beregn_avkortingsbeloep(gjeldende, utbetalt.maaned, tidspunkt)?;
            skyldig += utbetalt.mulig_trekk(ny.avkortingsbeloep) - utbetalt.trekk;
        }
        let restanse = if tidligere.is_empty() || maaneder_med_ytelse.is_empty() {
            0
        } else {
            avrund(skyldig, maaneder_med_ytelse.len() as i64)
        };

        let mut perioder: Vec<Avkortingsperiode> = Vec::new();
        for maaned in fom.til(tom) {
            let grunnlag = self.grunnlag_for(maaned);
            let grunnlag_id = grunnlag.map(|g| g.id);
            let beregning = beregn_avkortingsbeloep(grunnlag, maaned, tidspunkt)?;
            match perioder.last_mut() {
                Some(p)
                    if p.avkortingsbeloep == beregning.avkortingsbeloep
                        && p.inntektsgrunnlag == grunnlag_id =>
                {
                    p.periode.tom = Some(maaned);
                }
                _ => perioder.push(Avkortingsperiode {
                    id: Uuid::new_v4(),
                    periode: Periode::new(maaned, Some(maaned)),
                    avkortingsbeloep: beregning.avkortingsbeloep,
                    inntektsgrunnlag: grunnlag_id,
                    regel_resultat: beregning.regel_resultat,
                }),
            }
        }

        let mut avkortet: Vec<AvkortetYtelse> = Vec::new();
        for (maaned, ytelse_foer) in maaneder_med_ytelse {
            let avkortingsbeloep = perioder
                .iter()
                .find(|p| p.periode.inneholder(maaned))
                .map(|p| p.avkortingsbeloep)
                .ok_or_else(|| ServerError::internal(format!("mangler avkorting for {maaned}")))?;
            let etter = (ytelse_foer - avkortingsbeloep - restanse).clamp(0, ytelse_foer);

            match avkortet.last_mut() {
                Some(y)
                    if y.periode.tom.map(|t| t.neste()) == Some(maaned)
                        && y.ytelse_foer_avkorting == ytelse_foer
                        && y.avkortingsbeloep == avkortingsbeloep =>
                {
                    y.periode.tom = Some(maaned);
                }
                _ => avkortet.push(AvkortetYtelse {
                    id: Uuid::new_v4(),
                    periode: Periode::new(maaned, Some(maaned)),
                    ytelse_foer_avkorting: ytelse_foer,
                    avkortingsbeloep,
                    restanse,
                    ytelse_etter_avkorting: etter,
                    regel_resultat: RegelResultat::ny(
                        "avkortet_ytelse",
                        tidspunkt,
                        json!({
                            "maaned": maaned,
                            "ytelseFoerAvkorting": ytelse_foer,
                            "avkortingsbeloep": avkortingsbeloep,
                            "restanse": restanse,
                        }),
                        json!({ "ytelseEtterAvkorting": etter }),
                    ),
                }),
            }
        }

        self.avkortingsperioder.extend(perioder);
        self.avkortet_ytelse.extend(avkortet);
        Ok(())
    }
}

impl Avkorting {
    pub fn er_tom(&self) -> bool {
        self.aarsoppgjoer.is_empty()
    }

    pub fn aarsoppgjoer(&self, aar: i32) -> Option<&Aarsoppgjoer> {
        self.aarsoppgjoer.iter().find(|a| a.aar == aar)
    }

    fn aarsoppgjoer_mut(&mut self, aar: i32) -> &mut Aarsoppgjoer {
        let idx = match self.aarsoppgjoer.binary_search_by_key(&aar, |a| a.aar) {
            Ok(idx) => idx,
            Err(idx) => {
                self.aarsoppgjoer.insert(idx, Aarsoppgjoer::ny(aar));
                idx
            }
        };
        &mut self.aarsoppgjoer[idx]
    }

    pub fn siste_grunnlag(&self) -> Option<&Inntektsgrunnlag> {
        self.aarsoppgjoer
            .iter()
            .flat_map(|a| a.inntektsgrunnlag.iter())
            .max_by_key(|g| g.periode.fom)
    }

    /// Places a new income declaration. A declaration for the same month as
    /// an existing one replaces it; the preceding one in the year is closed
    /// the month before.
    pub fn legg_til_grunnlag(
        &mut self,
        ny: NyttInntektsgrunnlag,
        foerstegangsbehandling: bool,
        kilde: Kilde,
    ) -> Result<Uuid, ServerError> {
        if ny.aarsinntekt < 0
            || ny.fratrekk_inn_aar < 0
            || ny.inntekt_utland < 0
            || ny.fratrekk_utland < 0
        {
            return Err(ServerError::validation(
                "NEGATIVT_BELOEP",
                "Inntekt og fratrekk kan ikke være negative",
            ));
        }
        krev_gyldige_beloep(&[
            ny.aarsinntekt,
            ny.fratrekk_inn_aar,
            ny.inntekt_utland,
            ny.fratrekk_utland,
        ])?;

        if let Some(siste) = self.siste_grunnlag() {
            if ny.fom < siste.periode.fom {
                return Err(ServerError::validation(
                    "FOM_FOER_SISTE_GRUNNLAG",
                    format!(
                        "Ny inntekt fra {} kan ikke starte før siste inntekt fra {}",
                        ny.fom, siste.periode.fom
                    ),
                ));
            }
            let nytt_aar = ny.fom.aar() > siste.periode.fom.aar();
            if nytt_aar && ny.fom.maaned() != 1 && !foerstegangsbehandling {
                return Err(ServerError::validation(
                    "NYTT_AAR_MAA_STARTE_I_JANUAR",
                    format!("Første inntekt i {} må gjelde fra januar", ny.fom.aar()),
                ));
            }
        }

        let aar = ny.fom.aar();
        let oppgjoer = self.aarsoppgjoer_mut(aar);
        let foerste_fom = oppgjoer
            .inntektsgrunnlag
            .first()
            .map(|g| g.periode.fom)
            .filter(|fom| *fom < ny.fom)
            .unwrap_or(ny.fom);
        let relevante_maaneder = ny
            .relevante_maaneder
            .unwrap_or_else(|| foerste_fom.antall_til(&Maaned::desember(aar)));
        if !(1..=12).contains(&relevante_maaneder) {
            return Err(ServerError::validation(
                "UGYLDIG_RELEVANTE_MAANEDER",
                format!("Relevante måneder må være mellom 1 og 12, var {relevante_maaneder}"),
            ));
        }

        oppgjoer.inntektsgrunnlag.retain(|g| g.periode.fom != ny.fom);
        if let Some(forrige) = oppgjoer.inntektsgrunnlag.last_mut() {
            forrige.periode.tom = Some(ny.fom.forrige());
        }

        let id = Uuid::new_v4();
        oppgjoer.inntektsgrunnlag.push(Inntektsgrunnlag {
            id,
            periode: Periode::new(ny.fom, None),
            aarsinntekt: ny.aarsinntekt,
            fratrekk_inn_aar: ny.fratrekk_inn_aar,
            inntekt_utland: ny.inntekt_utland,
            fratrekk_utland: ny.fratrekk_utland,
            relevante_maaneder,
            spesifikasjon: ny.spesifikasjon,
            kilde,
        });
        Ok(id)
    }

    /// Recomputes every year from `virkningstidspunkt` onwards.
    pub fn beregn(
        &mut self,
        ytelse: &[YtelseFoerAvkorting],
        virkningstidspunkt: Maaned,
        tidspunkt: DateTime<Utc>,
    ) -> Result<(), ServerError> {
        if ytelse.is_empty() {
            return Err(ServerError::validation(
                "MANGLER_YTELSE",
                "Kan ikke avkorte uten beregnet ytelse",
            ));
        }
        if ytelse.iter().any(|y| y.beloep < 0) {
            return Err(ServerError::validation(
                "NEGATIVT_BELOEP",
                "Ytelse før avkorting kan ikke være negativ",
            ));
        }
        krev_gyldige_beloep(&ytelse.iter().map(|y| y.beloep).collect::<Vec<_>>())?;

        let siste_aar = ytelse
            .iter()
            .map(|y| y.periode.tom.unwrap_or(y.periode.fom).aar())
            .chain(self.aarsoppgjoer.iter().map(|a| a.aar))
            .max()
            .unwrap_or(virkningstidspunkt.aar())
            .max(virkningstidspunkt.aar());

        for aar in virkningstidspunkt.aar()..=siste_aar {
            let fom = if aar == virkningstidspunkt.aar() {
                virkningstidspunkt
            } else {
                Maaned::januar(aar)
            };
            self.aarsoppgjoer_mut(aar).beregn_fra(fom, ytelse, tidspunkt)?;
        }
        Ok(())
    }

    /// Copies in years found in historical snapshots but missing here,
    /// preferring the newest snapshot that has the year. Returns the years
    /// that were restored.
    pub fn gjenopprett_manglende_aarsoppgjoer(&mut self, historiske: &[Avkorting]) -> Vec<i32> {
        let mut gjenopprettet = Vec::new();
        for historisk in historiske.iter().rev() {
            for oppgjoer in &historisk.aarsoppgjoer {
                if self.aarsoppgjoer(oppgjoer.aar).is_none() {
                    let idx = self
                        .aarsoppgjoer
                        .partition_point(|a| a.aar < oppgjoer.aar);
                    self.aarsoppgjoer.insert(idx, oppgjoer.clone());
                    gjenopprettet.push(oppgjoer.aar);
                }
            }
        }
        gjenopprettet.sort_unstable();
        gjenopprettet
    }
}
