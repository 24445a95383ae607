// src/domain/bruker.rs

use serde::Serialize;

use crate::domain::text_enum;

text_enum! {
    pub enum Rolle {
        Saksbehandler => "SAKSBEHANDLER",
        Attestant => "ATTESTANT",
        StrengtFortrolig => "STRENGT_FORTROLIG",
        Admin => "ADMIN",
    }
}

/// The caller of a request, resolved once at the HTTP boundary and passed
/// down explicitly.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Bruker {
    Saksbehandler {
        ident: String,
        roller: Vec<Rolle>,
        enheter: Vec<String>,
    },
    /// Another backend acting on its own behalf.
    System { navn: String },
    /// The person the case is about.
    Borger { ident: String },
    /// A trusted external party (e.g. a partner agency).
    Ekstern { navn: String },
}

impl Bruker {
    pub fn saksbehandler(ident: &str, roller: &[Rolle], enheter: &[&str]) -> Self {
        Bruker::Saksbehandler {
            ident: ident.to_string(),
            roller: roller.to_vec(),
            enheter: enheter.iter().map(|e| e.to_string()).collect(),
        }
    }

    pub fn system(navn: &str) -> Self {
        Bruker::System {
            navn: navn.to_string(),
        }
    }

    pub fn ident(&self) -> &str {
        match self {
            Bruker::Saksbehandler { ident, .. } | Bruker::Borger { ident } => ident,
            Bruker::System { navn } | Bruker::Ekstern { navn } => navn,
        }
    }

    fn har_rolle(&self, rolle: Rolle) -> bool {
        matches!(self, Bruker::Saksbehandler { roller, .. } if roller.contains(&rolle))
    }

    /// May take, hand out or release ownership of an oppgave.
    pub fn can_assign(&self) -> bool {
        matches!(self, Bruker::Saksbehandler { .. } | Bruker::System { .. })
    }

    /// May perform administrative operations on behalf of the platform.
    pub fn can_act_as_system(&self) -> bool {
        matches!(self, Bruker::System { .. }) || self.har_rolle(Rolle::Admin)
    }

    pub fn er_attestant(&self) -> bool {
        self.har_rolle(Rolle::Attestant)
    }

    pub fn kan_se_strengt_fortrolig(&self) -> bool {
        matches!(self, Bruker::System { .. }) || self.har_rolle(Rolle::StrengtFortrolig)
    }

    /// Units whose oppgaver this caller lists by default. Empty means all.
    pub fn enheter(&self) -> &[String] {
        match self {
            Bruker::Saksbehandler { enheter, .. } => enheter,
            _ => &[],
        }
    }
}

/// Whether `ident` belongs to a synthetic system account rather than a
/// person. Personal NAV idents are one capital letter followed by six digits.
pub fn er_systemident(ident: &str) -> bool {
    let mut chars = ident.chars();
    let personlig = ident.len() == 7
        && chars.next().is_some_and(|c| c.is_ascii_uppercase())
        && chars.all(|c| c.is_ascii_digit());
    !personlig
}
