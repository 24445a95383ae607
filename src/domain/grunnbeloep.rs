// src/domain/grunnbeloep.rs

//! The national insurance base amount (G) and the court fee (rettsgebyr),
//! both adjusted yearly. G changes every May.

use crate::domain::periode::Maaned;
use crate::errors::ServerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grunnbeloep {
    pub fom: Maaned,
    pub beloep: i64,
}

impl Grunnbeloep {
    pub fn halvt(&self) -> i64 {
        (self.beloep + 1) / 2
    }
}

// (year, month, amount), oldest first.
const GRUNNBELOEP: &[(i32, u32, i64)] = &[
    (2020, 5, 101_351),
    (2021, 5, 106_399),
    (2022, 5, 111_477),
    (2023, 5, 118_620),
    (2024, 5, 124_028),
    (2025, 5, 130_160),
];

const RETTSGEBYR: &[(i32, i64)] = &[(2022, 1_223), (2023, 1_243), (2024, 1_277), (2025, 1_314)];

/// G in force for `maaned`.
pub fn grunnbeloep_for(maaned: Maaned) -> Result<Grunnbeloep, ServerError> {
    GRUNNBELOEP
        .iter()
        .rev()
        .filter_map(|&(aar, mnd, beloep)| Maaned::new(aar, mnd).map(|fom| Grunnbeloep { fom, beloep }))
        .find(|g| g.fom <= maaned)
        .ok_or_else(|| {
            ServerError::validation(
                "MANGLER_GRUNNBELOEP",
                format!("Grunnbeløp er ikke kjent for {maaned}"),
            )
        })
}

/// Rettsgebyr for `aar`, falling back to the latest known year before it.
pub fn rettsgebyr_for(aar: i32) -> Result<i64, ServerError> {
    RETTSGEBYR
        .iter()
        .rev()
        .find(|(gyldig_fra, _)| *gyldig_fra <= aar)
        .map(|(_, beloep)| *beloep)
        .ok_or_else(|| {
            ServerError::validation(
                "MANGLER_RETTSGEBYR",
                format!("Rettsgebyr er ikke kjent for {aar}"),
            )
        })
}
