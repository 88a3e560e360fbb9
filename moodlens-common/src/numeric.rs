//! Numeric sanitization
//!
//! NaN and Infinity are not valid JSON numbers, so every value that leaves the
//! core passes through one of these guards first.

/// Clamp a probability-like value to [0, 1]; NaN/Infinity become 0.0.
pub fn sanitize_unit(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Force a percentage to 0.0 unless it is finite and within [0, 100].
///
/// Out-of-range values are replaced, not clamped: a percentage above 100
/// means the computation went wrong and should not masquerade as "100%".
pub fn sanitize_percentage(value: f64) -> f64 {
    if value.is_finite() && (0.0..=100.0).contains(&value) {
        value
    } else {
        0.0
    }
}

/// Signed variant of [`sanitize_percentage`] for differences, range [-100, 100].
pub fn sanitize_signed_percentage(value: f64) -> f64 {
    if value.is_finite() && (-100.0..=100.0).contains(&value) {
        value
    } else {
        0.0
    }
}

/// `part / total * 100`, sanitized. A zero total yields 0.0.
pub fn percentage(part: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    sanitize_percentage(part as f64 / total as f64 * 100.0)
}

/// Round to one decimal place (dashboard precision)
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Parse a loosely formatted number; blanks and "nan" become `None`.
pub fn parse_number(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_unit() {
        assert_eq!(sanitize_unit(f64::NAN), 0.0);
        assert_eq!(sanitize_unit(f64::INFINITY), 0.0);
        assert_eq!(sanitize_unit(f64::NEG_INFINITY), 0.0);
        assert_eq!(sanitize_unit(1.7), 1.0);
        assert_eq!(sanitize_unit(-0.2), 0.0);
        assert_eq!(sanitize_unit(0.42), 0.42);
    }

    #[test]
    fn test_sanitize_percentage_replaces_out_of_range() {
        assert_eq!(sanitize_percentage(50.0), 50.0);
        assert_eq!(sanitize_percentage(100.0), 100.0);
        assert_eq!(sanitize_percentage(100.5), 0.0);
        assert_eq!(sanitize_percentage(-1.0), 0.0);
        assert_eq!(sanitize_percentage(f64::NAN), 0.0);
        assert_eq!(sanitize_signed_percentage(-40.0), -40.0);
        assert_eq!(sanitize_signed_percentage(-140.0), 0.0);
    }

    #[test]
    fn test_percentage_zero_total() {
        assert_eq!(percentage(3, 0), 0.0);
        assert_eq!(percentage(1, 4), 25.0);
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number(" 0.5 "), Some(0.5));
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("nan"), None);
        assert_eq!(parse_number("abc"), None);
        assert_eq!(parse_number("inf"), None);
    }

    #[test]
    fn test_round1() {
        assert_eq!(round1(33.333), 33.3);
        assert_eq!(round1(66.66), 66.7);
    }
}
