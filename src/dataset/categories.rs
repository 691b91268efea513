//! Closed categorical types for the cleaned SRAG dataset.
//!
//! Each type decodes from the label written by the cleaning step and from the
//! raw notification-form code, so an unknown value is always detectable.

use serde::{Deserialize, Serialize};

/// Labels that mean "no value" once past ingestion.
pub const MISSING_LABELS: &[&str] = &["", "Não Informado"];

pub trait Categorical: Sized + Copy + 'static {
    const VARIANTS: &'static [Self];

    fn label(&self) -> &'static str;
    fn code(&self) -> &'static str;

    fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        Self::VARIANTS.iter().copied().find(|v| v.label() == label)
    }

    fn from_code(code: &str) -> Option<Self> {
        let code = code.trim();
        Self::VARIANTS.iter().copied().find(|v| v.code() == code)
    }
}

macro_rules! categorical {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $variant:ident => ($code:literal, $label:literal) ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $label)]
                $variant,
            )+
        }

        impl Categorical for $name {
            const VARIANTS: &'static [Self] = &[$($name::$variant),+];

            fn label(&self) -> &'static str {
                match self {
                    $($name::$variant => $label,)+
                }
            }

            fn code(&self) -> &'static str {
                match self {
                    $($name::$variant => $code,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.label())
            }
        }
    };
}

categorical! {
    /// Yes / no / ignored answers shared by many form fields.
    YesNo {
        Yes => ("1", "Sim"),
        No => ("2", "Não"),
        Ignored => ("9", "Ignorado"),
    }
}

categorical! {
    Sex {
        Male => ("M", "Masculino"),
        Female => ("F", "Feminino"),
        Ignored => ("I", "Ignorado"),
    }
}

categorical! {
    Race {
        White => ("1", "Branca"),
        Black => ("2", "Preta"),
        Yellow => ("3", "Amarela"),
        Brown => ("4", "Parda"),
        Indigenous => ("5", "Indígena"),
        Ignored => ("9", "Ignorado"),
    }
}

categorical! {
    Pregnancy {
        FirstTrimester => ("1", "1º Trimestre"),
        SecondTrimester => ("2", "2º Trimestre"),
        ThirdTrimester => ("3", "3º Trimestre"),
        GestationalAgeUnknown => ("4", "Idade gestacional ignorada"),
        NotPregnant => ("5", "Não"),
        NotApplicable => ("6", "Não se aplica"),
        Ignored => ("9", "Ignorado"),
    }
}

categorical! {
    VentilatorySupport {
        Invasive => ("1", "Sim, invasivo"),
        NonInvasive => ("2", "Sim, não invasivo"),
        NoSupport => ("3", "Não"),
        Ignored => ("9", "Ignorado"),
    }
}

categorical! {
    /// Final case classification (CLASSI_FIN).
    Classification {
        Influenza => ("1", "SRAG por Influenza"),
        OtherVirus => ("2", "SRAG por Outro Vírus Respiratório"),
        OtherAgent => ("3", "SRAG por Outro Agente Etiológico"),
        Unspecified => ("4", "SRAG não especificado"),
        Covid19 => ("5", "SRAG por COVID-19"),
    }
}

categorical! {
    Outcome {
        Cure => ("1", "Cura"),
        Death => ("2", "Óbito"),
        Ignored => ("9", "Ignorado"),
    }
}

impl Outcome {
    /// Cure or death; ignored outcomes are not resolved.
    pub fn is_resolved(&self) -> bool {
        matches!(self, Outcome::Cure | Outcome::Death)
    }
}

pub fn is_missing_label(value: &str) -> bool {
    MISSING_LABELS.contains(&value.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_labels() {
        assert_eq!(YesNo::from_label("Sim"), Some(YesNo::Yes));
        assert_eq!(Outcome::from_label(" Óbito "), Some(Outcome::Death));
        assert_eq!(
            VentilatorySupport::from_label("Sim, invasivo"),
            Some(VentilatorySupport::Invasive)
        );
        assert_eq!(
            Classification::from_label("SRAG por COVID-19"),
            Some(Classification::Covid19)
        );
        assert_eq!(Outcome::from_label("Obito"), None);
    }

    #[test]
    fn test_decode_codes() {
        assert_eq!(Outcome::from_code("2"), Some(Outcome::Death));
        assert_eq!(Sex::from_code("F"), Some(Sex::Female));
        assert_eq!(Race::from_code("5"), Some(Race::Indigenous));
        assert_eq!(Classification::from_code("9"), None);
    }

    #[test]
    fn test_label_round_trip_is_closed() {
        for variant in Pregnancy::VARIANTS {
            assert_eq!(Pregnancy::from_label(variant.label()), Some(*variant));
        }
    }

    #[test]
    fn test_missing_labels() {
        assert!(is_missing_label(""));
        assert!(is_missing_label("Não Informado"));
        assert!(!is_missing_label("Ignorado"));
    }

    #[test]
    fn test_resolved_outcome() {
        assert!(Outcome::Cure.is_resolved());
        assert!(Outcome::Death.is_resolved());
        assert!(!Outcome::Ignored.is_resolved());
    }
}
