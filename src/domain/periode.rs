// src/domain/periode.rs

use chrono::{Datelike, Months, NaiveDate};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A calendar month, written `YYYY-MM` on the wire and in the database.
/// Held as the first day of the month; years are limited to four digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Maaned(NaiveDate);

impl Maaned {
    pub fn new(aar: i32, maaned: u32) -> Option<Self> {
        if !(1..=9999).contains(&aar) {
            return None;
        }
        NaiveDate::from_ymd_opt(aar, maaned, 1).map(Self)
    }

    pub fn januar(aar: i32) -> Self {
        Self(NaiveDate::from_ymd_opt(aar, 1, 1).unwrap_or(NaiveDate::MIN))
    }

    pub fn desember(aar: i32) -> Self {
        Self::januar(aar).pluss(11)
    }

    pub fn aar(&self) -> i32 {
        self.0.year()
    }

    pub fn maaned(&self) -> u32 {
        self.0.month()
    }

    fn pluss(self, antall: u32) -> Self {
        Self(self.0 + Months::new(antall))
    }

    pub fn neste(&self) -> Self {
        self.pluss(1)
    }

    pub fn forrige(&self) -> Self {
        Self(self.0 - Months::new(1))
    }

    fn indeks(&self) -> i64 {
        self.0.year() as i64 * 12 + self.0.month0() as i64
    }

    /// Number of months from `self` to `other`, both inclusive. Zero if `other < self`.
    pub fn antall_til(&self, other: &Maaned) -> u32 {
        (other.indeks() - self.indeks() + 1).max(0) as u32
    }

    /// Iterates every month from `self` through `tom`, inclusive.
    pub fn til(self, tom: Maaned) -> impl Iterator<Item = Maaned> {
        (0..self.antall_til(&tom)).map(move |n| self.pluss(n))
    }
}

impl fmt::Display for Maaned {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m"))
    }
}

impl FromStr for Maaned {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let dato = NaiveDate::parse_from_str(&format!("{s}-01"), "%Y-%m-%d")
            .map_err(|_| format!("ugyldig måned: {s}"))?;
        Maaned::new(dato.year(), dato.month()).ok_or_else(|| format!("ugyldig måned: {s}"))
    }
}

impl Serialize for Maaned {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Maaned {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(d)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

impl ToSql for Maaned {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.to_string()))
    }
}

impl FromSql for Maaned {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: String| FromSqlError::Other(e.into()))
    }
}

/// A month range. `tom = None` means open-ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Periode {
    pub fom: Maaned,
    pub tom: Option<Maaned>,
}

impl Periode {
    pub fn new(fom: Maaned, tom: Option<Maaned>) -> Self {
        Self { fom, tom }
    }

    pub fn inneholder(&self, m: Maaned) -> bool {
        m >= self.fom && self.tom.map_or(true, |tom| m <= tom)
    }
}
