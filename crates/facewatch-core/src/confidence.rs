//! Distance-to-confidence scoring for overlay labels.
//!
//! The result is a display string, not a calibrated probability.

/// Distance at or below which two embeddings count as the same person.
pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.6;

/// Exponent of the boost curve applied to strong matches.
const BOOST_EXPONENT: f64 = 0.2;

/// Map an embedding distance to a percentage string such as `"93.41%"`.
///
/// Weak matches (`distance > threshold`) scale linearly toward 0%. Strong
/// matches get a non-linear boost toward 100%, with exactly 50% at
/// `distance == threshold`.
pub fn confidence(distance: f64, threshold: f64) -> String {
    format_percent(confidence_value(distance, threshold))
}

/// Numeric form of [`confidence`], in percent, rounded to 2 decimals.
fn confidence_value(distance: f64, threshold: f64) -> f64 {
    let range = (1.0 - threshold).max(f64::EPSILON);
    let linear = ((1.0 - distance) / (range * 2.0)).clamp(0.0, 1.0);

    let value = if distance > threshold {
        linear
    } else {
        linear + (1.0 - linear) * odd_root_pow((linear - 0.5) * 2.0, BOOST_EXPONENT)
    };

    round2(value * 100.0)
}

/// `base^exp` extended to negative bases as `-(|base|^exp)`.
fn odd_root_pow(base: f64, exp: f64) -> f64 {
    base.signum() * base.abs().powf(exp)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Format like a rounded float: always at least one fractional digit.
fn format_percent(value: f64) -> String {
    // Debug keeps the ".0" that Display drops for whole numbers.
    format!("{value:?}%")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> f64 {
        s.strip_suffix('%').expect("percent suffix").parse().expect("number")
    }

    #[test]
    fn test_perfect_match_is_full_confidence() {
        assert_eq!(confidence(0.0, DEFAULT_MATCH_THRESHOLD), "100.0%");
    }

    #[test]
    fn test_threshold_is_fifty_percent() {
        assert_eq!(confidence(0.6, 0.6), "50.0%");
    }

    #[test]
    fn test_weak_match_is_linear() {
        // (1 - 0.7) / 0.8 = 0.375
        assert_eq!(confidence(0.7, 0.6), "37.5%");
        assert_eq!(confidence(1.0, 0.6), "0.0%");
    }

    #[test]
    fn test_weak_match_never_negative() {
        assert_eq!(confidence(1.4, 0.6), "0.0%");
    }

    #[test]
    fn test_strong_match_boost() {
        // linear = 0.875, boost = 0.75^0.2
        let expected = round2((0.875 + 0.125 * 0.75f64.powf(0.2)) * 100.0);
        assert_eq!(confidence(0.3, 0.6), format!("{expected:?}%"));
        assert!(parse(&confidence(0.3, 0.6)) > 99.0);
    }

    #[test]
    fn test_two_decimal_rounding() {
        let s = confidence(0.45, 0.6);
        let fraction = s.trim_end_matches('%').split('.').nth(1).expect("fractional part");
        assert!(!fraction.is_empty() && fraction.len() <= 2, "got {s}");
    }

    #[test]
    fn test_monotonic_non_increasing_below_threshold() {
        let threshold = DEFAULT_MATCH_THRESHOLD;
        let mut previous = f64::INFINITY;
        for step in 0..=60 {
            let distance = step as f64 * 0.01;
            let s = confidence(distance, threshold);
            assert!(s.ends_with('%'), "{s}");
            let value = parse(&s);
            assert!(value <= previous, "confidence rose at distance {distance}: {value} > {previous}");
            previous = value;
        }
    }

    #[test]
    fn test_degenerate_threshold_is_finite() {
        for threshold in [0.0, 0.99, 1.0, 1.5] {
            for distance in [0.0, 0.5, 1.0, 2.0] {
                assert!(parse(&confidence(distance, threshold)).is_finite());
            }
        }
    }

    #[test]
    fn test_odd_root_pow_negative_base() {
        assert!((odd_root_pow(-1.0, 0.2) + 1.0).abs() < 1e-12);
        assert!((odd_root_pow(0.0, 0.2)).abs() < 1e-12);
    }
}
