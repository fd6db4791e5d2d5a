//! Factor families shared by every confidence formula.
//!
//! Each function is total and returns a value in `[0, 1]`; empty or
//! degenerate input gives `0.0`.

/// Clamps to `[0, 1]`, mapping NaN to 0.
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// `min(found / expected, 1)`; zero expected gives 0.
pub fn coverage(found: usize, expected: usize) -> f64 {
    if expected == 0 {
        return 0.0;
    }
    clamp_unit(found as f64 / expected as f64)
}

/// Coverage over fractional quantities such as character counts.
pub fn coverage_f64(found: f64, expected: f64) -> f64 {
    if expected.is_nan() || expected <= 0.0 {
        return 0.0;
    }
    clamp_unit(found / expected)
}

/// Arithmetic mean ignoring NaN entries; empty gives `None`.
pub fn mean(values: &[f64]) -> Option<f64> {
    let finite: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if finite.is_empty() {
        None
    } else {
        Some(finite.iter().sum::<f64>() / finite.len() as f64)
    }
}

/// `average(scores) / max_score`, clamped; empty gives 0.
pub fn quality(scores: &[f64], max_score: f64) -> f64 {
    if max_score.is_nan() || max_score <= 0.0 {
        return 0.0;
    }
    mean(scores).map_or(0.0, |avg| clamp_unit(avg / max_score))
}

/// Binary structural marker.
pub fn marker(present: bool) -> f64 {
    if present {
        1.0
    } else {
        0.0
    }
}

/// Fraction of required markers present.
pub fn graded_marker(hits: usize, needed: usize) -> f64 {
    coverage(hits, needed)
}

/// 1 while `actual` is within `tolerance` (relative) of `target`, then falls
/// linearly to 0 at twice the tolerance.
pub fn ratio_fit(actual: f64, target: f64, tolerance: f64) -> f64 {
    if target.is_nan() || target <= 0.0 || tolerance.is_nan() || tolerance <= 0.0 || actual.is_nan() {
        return 0.0;
    }
    let deviation = (actual - target).abs() / target;
    if deviation <= tolerance {
        1.0
    } else {
        clamp_unit(1.0 - (deviation - tolerance) / tolerance)
    }
}

/// Rounds to `places` decimal places.
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coverage_monotone_and_saturating() {
        let expected = 7;
        let mut previous = 0.0;
        for found in 0..20 {
            let value = coverage(found, expected);
            assert!(value >= previous);
            assert!((0.0..=1.0).contains(&value));
            if found >= expected {
                assert_eq!(value, 1.0);
            }
            previous = value;
        }
        assert_eq!(coverage(5, 0), 0.0);
    }

    #[test]
    fn test_quality() {
        assert_eq!(quality(&[8.0, 6.0], 10.0), 0.7);
        assert_eq!(quality(&[], 10.0), 0.0);
        assert_eq!(quality(&[25.0], 10.0), 1.0);
        assert_eq!(quality(&[5.0], 0.0), 0.0);
        assert_eq!(quality(&[f64::NAN, 4.0], 10.0), 0.4);
    }

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[8.0, 6.0]), Some(7.0));
        assert_eq!(mean(&[]), None);
    }

    #[test]
    fn test_markers() {
        assert_eq!(marker(true), 1.0);
        assert_eq!(marker(false), 0.0);
        assert_eq!(graded_marker(2, 4), 0.5);
    }

    #[test]
    fn test_ratio_fit() {
        assert_eq!(ratio_fit(1500.0, 1500.0, 0.2), 1.0);
        assert_eq!(ratio_fit(1250.0, 1500.0, 0.2), 1.0);
        assert!((ratio_fit(1050.0, 1500.0, 0.2) - 0.5).abs() < 1e-9);
        assert_eq!(ratio_fit(0.0, 1500.0, 0.2), 0.0);
        assert_eq!(ratio_fit(100.0, 0.0, 0.2), 0.0);
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(0.12345, 2), 0.12);
        assert_eq!(round_to(7.25, 1), 7.3);
    }
}
