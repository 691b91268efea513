//! Text helpers for location matching and artifact naming.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Lowercase, trim and strip diacritics: "  São Paulo " -> "sao paulo".
pub fn fold_diacritics(input: &str) -> String {
    input
        .trim()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
}

/// Keep only alphanumeric characters plus `_` and `-`.
pub fn sanitize_file_component(input: &str) -> String {
    input
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-')
        .collect()
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_diacritics() {
        assert_eq!(fold_diacritics("São Paulo"), "sao paulo");
        assert_eq!(fold_diacritics("  SAO PAULO "), "sao paulo");
        assert_eq!(fold_diacritics("Florianópolis"), "florianopolis");
        assert_eq!(fold_diacritics("Goiás"), "goias");
        assert_eq!(fold_diacritics("Maranhão"), "maranhao");
    }

    #[test]
    fn test_sanitize_file_component() {
        assert_eq!(sanitize_file_component("SANTA_CATARINA"), "SANTA_CATARINA");
        assert_eq!(sanitize_file_component("São Paulo/SP"), "SãoPauloSP");
        assert_eq!(sanitize_file_component("a-b_c.d"), "a-b_cd");
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(33.33333, 2), 33.33);
        assert_eq!(round_to(4.25, 1), 4.3);
        assert_eq!(round_to(0.0, 2), 0.0);
    }
}
