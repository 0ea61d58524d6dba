//! Severity tiers for item-count alerts.

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AlertError;

/// How far the live count sits relative to the threshold.
///
/// Ordered: `Info < Warning < High < Critical`. Always recomputed from
/// `(current_count, threshold)`, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    High,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::Info,
        Severity::Warning,
        Severity::High,
        Severity::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl core::fmt::Display for Severity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Severity::ALL
            .into_iter()
            .find(|sev| sev.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown severity '{s}'"))
    }
}

/// Classify `current_count / threshold` into a tier.
///
/// | ratio      | tier     |
/// |------------|----------|
/// | ≥ 1.5      | critical |
/// | ≥ 1.2      | high     |
/// | ≥ 1.0      | warning  |
/// | otherwise  | info     |
///
/// Lower bounds are inclusive. The comparison is done on integers
/// (`2c ≥ 3t`, `5c ≥ 6t`, `c ≥ t`) so boundary ratios are exact.
pub fn classify(current_count: i64, threshold: i64) -> Result<Severity, AlertError> {
    if threshold <= 0 {
        return Err(AlertError::InvalidThreshold(threshold));
    }

    let c = i128::from(current_count);
    let t = i128::from(threshold);

    let severity = if 2 * c >= 3 * t {
        Severity::Critical
    } else if 5 * c >= 6 * t {
        Severity::High
    } else if c >= t {
        Severity::Warning
    } else {
        Severity::Info
    };

    Ok(severity)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_table() {
        assert_eq!(classify(20, 20), Ok(Severity::Warning));
        assert_eq!(classify(24, 20), Ok(Severity::High));
        assert_eq!(classify(30, 20), Ok(Severity::Critical));
        assert_eq!(classify(15, 20), Ok(Severity::Info));
    }

    #[test]
    fn lower_bounds_are_inclusive() {
        // ratio exactly 1.5 / 1.2 / 1.0
        assert_eq!(classify(3, 2), Ok(Severity::Critical));
        assert_eq!(classify(6, 5), Ok(Severity::High));
        assert_eq!(classify(7, 7), Ok(Severity::Warning));
        // just under each bound
        assert_eq!(classify(29, 20), Ok(Severity::High));
        assert_eq!(classify(23, 20), Ok(Severity::Warning));
        assert_eq!(classify(19, 20), Ok(Severity::Info));
    }

    #[test]
    fn non_positive_threshold_is_rejected() {
        assert_eq!(classify(10, 0), Err(AlertError::InvalidThreshold(0)));
        assert_eq!(classify(10, -5), Err(AlertError::InvalidThreshold(-5)));
    }

    #[test]
    fn extreme_values_do_not_overflow() {
        assert_eq!(classify(i64::MAX, 1), Ok(Severity::Critical));
        assert_eq!(classify(i64::MAX, i64::MAX), Ok(Severity::Warning));
        assert_eq!(classify(0, i64::MAX), Ok(Severity::Info));
    }

    #[test]
    fn names_round_trip() {
        for sev in Severity::ALL {
            assert_eq!(sev.as_str().parse::<Severity>(), Ok(sev));
            assert_eq!(
                serde_json::to_value(sev).unwrap(),
                serde_json::Value::String(sev.to_string())
            );
        }
        assert!("severe".parse::<Severity>().is_err());
    }

    #[test]
    fn tiers_are_ordered() {
        assert!(Severity::Info < Severity::Warning);
        assert!(Severity::Warning < Severity::High);
        assert!(Severity::High < Severity::Critical);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 1000,
                ..ProptestConfig::default()
            })]

            /// Same inputs, same tier.
            #[test]
            fn classify_is_deterministic(c in 0i64..1_000_000, t in 1i64..100_000) {
                prop_assert_eq!(classify(c, t), classify(c, t));
            }

            /// Raising the count never lowers the tier.
            #[test]
            fn classify_is_monotonic_in_count(
                c in 0i64..1_000_000,
                bump in 0i64..1_000_000,
                t in 1i64..100_000
            ) {
                let low = classify(c, t).unwrap();
                let high = classify(c + bump, t).unwrap();
                prop_assert!(low <= high);
            }

            /// Raising the threshold never raises the tier.
            #[test]
            fn classify_is_antitonic_in_threshold(
                c in 0i64..1_000_000,
                t in 1i64..100_000,
                bump in 0i64..100_000
            ) {
                let tight = classify(c, t).unwrap();
                let loose = classify(c, t + bump).unwrap();
                prop_assert!(loose <= tight);
            }

            #[test]
            fn zero_or_negative_threshold_always_fails(c in any::<i64>(), t in i64::MIN..=0) {
                prop_assert_eq!(classify(c, t), Err(AlertError::InvalidThreshold(t)));
            }
        }
    }
}
