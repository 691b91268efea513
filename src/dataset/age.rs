//! Age normalization (NU_IDADE_N + TP_IDADE -> years).

const DAYS_PER_YEAR: f64 = 365.25;
const MONTHS_PER_YEAR: f64 = 12.0;

/// Unit 1 is days, unit 2 is months, any other unit is already years.
/// A missing age or unit yields a missing corrected age.
pub fn normalize_age(age: Option<f64>, unit: Option<i64>) -> Option<f64> {
    let (age, unit) = (age?, unit?);
    let years = match unit {
        1 => age / DAYS_PER_YEAR,
        2 => age / MONTHS_PER_YEAR,
        _ => age,
    };
    Some(years)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(value: Option<f64>, expected: f64) -> bool {
        value.map(|v| (v - expected).abs() < 0.01).unwrap_or(false)
    }

    #[test]
    fn test_days_are_converted() {
        assert!(approx(normalize_age(Some(730.0), Some(1)), 2.0));
    }

    #[test]
    fn test_months_are_converted() {
        assert!(approx(normalize_age(Some(24.0), Some(2)), 2.0));
    }

    #[test]
    fn test_years_pass_through() {
        assert_eq!(normalize_age(Some(45.0), Some(3)), Some(45.0));
        assert_eq!(normalize_age(Some(45.0), Some(7)), Some(45.0));
    }

    #[test]
    fn test_missing_inputs() {
        assert_eq!(normalize_age(Some(45.0), None), None);
        assert_eq!(normalize_age(None, Some(3)), None);
    }
}
