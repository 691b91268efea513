//! Location resolution: state names to UF codes and the national scope.

use serde::Serialize;

use crate::utils::fold_diacritics;

/// Topics that select the whole country (compared after folding).
pub const NATIONAL_TOKENS: &[&str] = &["br", "brasil"];

pub struct StateInfo {
    pub uf: &'static str,
    /// Lowercase name without diacritics.
    pub folded_name: &'static str,
}

pub const STATES: &[StateInfo] = &[
    StateInfo { uf: "AC", folded_name: "acre" },
    StateInfo { uf: "AL", folded_name: "alagoas" },
    StateInfo { uf: "AP", folded_name: "amapa" },
    StateInfo { uf: "AM", folded_name: "amazonas" },
    StateInfo { uf: "BA", folded_name: "bahia" },
    StateInfo { uf: "CE", folded_name: "ceara" },
    StateInfo { uf: "DF", folded_name: "distrito federal" },
    StateInfo { uf: "ES", folded_name: "espirito santo" },
    StateInfo { uf: "GO", folded_name: "goias" },
    StateInfo { uf: "MA", folded_name: "maranhao" },
    StateInfo { uf: "MT", folded_name: "mato grosso" },
    StateInfo { uf: "MS", folded_name: "mato grosso do sul" },
    StateInfo { uf: "MG", folded_name: "minas gerais" },
    StateInfo { uf: "PA", folded_name: "para" },
    StateInfo { uf: "PB", folded_name: "paraiba" },
    StateInfo { uf: "PR", folded_name: "parana" },
    StateInfo { uf: "PE", folded_name: "pernambuco" },
    StateInfo { uf: "PI", folded_name: "piaui" },
    StateInfo { uf: "RJ", folded_name: "rio de janeiro" },
    StateInfo { uf: "RN", folded_name: "rio grande do norte" },
    StateInfo { uf: "RS", folded_name: "rio grande do sul" },
    StateInfo { uf: "RO", folded_name: "rondonia" },
    StateInfo { uf: "RR", folded_name: "roraima" },
    StateInfo { uf: "SC", folded_name: "santa catarina" },
    StateInfo { uf: "SP", folded_name: "sao paulo" },
    StateInfo { uf: "SE", folded_name: "sergipe" },
    StateInfo { uf: "TO", folded_name: "tocantins" },
];

pub fn is_national(topic: &str) -> bool {
    NATIONAL_TOKENS.contains(&fold_diacritics(topic).as_str())
}

/// Map a state name to its UF code. Unknown names are taken as a literal code.
pub fn resolve_state_code(topic: &str) -> String {
    let folded = fold_diacritics(topic);
    STATES
        .iter()
        .find(|s| s.folded_name == folded)
        .map(|s| s.uf.to_string())
        .unwrap_or_else(|| topic.trim().to_uppercase())
}

/// Resolved filter applied to the dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocationFilter {
    /// `None` selects every state.
    pub state_code: Option<String>,
    /// Folded municipality name.
    pub city: Option<String>,
}

impl LocationFilter {
    pub fn resolve(topic: &str, city: Option<&str>) -> Self {
        let state_code = if is_national(topic) {
            None
        } else {
            Some(resolve_state_code(topic))
        };
        let city = city
            .map(fold_diacritics)
            .filter(|c| !c.is_empty());
        Self { state_code, city }
    }

    pub fn matches(&self, state_code: Option<&str>, municipality: Option<&str>) -> bool {
        if let Some(code) = &self.state_code {
            match state_code {
                Some(found) if found.trim().eq_ignore_ascii_case(code) => {}
                _ => return false,
            }
        }
        if let Some(city) = &self.city {
            match municipality {
                Some(found) if fold_diacritics(found) == *city => {}
                _ => return false,
            }
        }
        true
    }
}
