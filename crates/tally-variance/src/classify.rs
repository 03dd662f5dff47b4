use tally_types::{format_minor_units, Currency, Severity};

use crate::config::{Band, VarianceThresholds};

/// Measured facts of a drawer count and their severity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Classification {
    /// `actual - expected`.
    pub variance_cents: i64,
    /// Variance relative to expected, truncated toward zero. `None` without
    /// an expected baseline.
    pub variance_bps: Option<i64>,
    pub severity: Severity,
    pub reason: String,
}

/// `|variance| / |expected| < band.max_bps / 10_000` and
/// `|variance| < band.max_cents`, without division.
fn within(band: &Band, abs_variance: i128, abs_expected: i128) -> bool {
    abs_variance * 10_000 < i128::from(band.max_bps) * abs_expected
        && abs_variance < i128::from(band.max_cents)
}

fn saturate(value: i128) -> i64 {
    i64::try_from(value).unwrap_or(if value < 0 { i64::MIN } else { i64::MAX })
}

/// Classify a count. Pure: the same inputs always give the same result.
///
/// `variance_cents` is exact whenever `actual - expected` fits in an `i64`,
/// which the detector checks before classifying.
pub fn classify(
    expected_cents: i64,
    actual_cents: i64,
    currency: Currency,
    thresholds: &VarianceThresholds,
) -> Classification {
    let variance = i128::from(actual_cents) - i128::from(expected_cents);
    let variance_cents = saturate(variance);

    if expected_cents == 0 {
        return Classification {
            variance_cents,
            variance_bps: None,
            severity: Severity::Critical,
            reason: "no expected baseline".into(),
        };
    }

    let abs_expected = i128::from(expected_cents).abs();
    let abs_variance = variance.abs();
    let bps = variance * 10_000 / abs_expected;
    let variance_bps = saturate(bps);

    let severity = if within(&thresholds.low, abs_variance, abs_expected) {
        Severity::Low
    } else if within(&thresholds.medium, abs_variance, abs_expected) {
        Severity::Medium
    } else if within(&thresholds.high, abs_variance, abs_expected) {
        Severity::High
    } else {
        Severity::Critical
    };

    let reason = match variance_cents.signum() {
        0 => "drawer balanced".to_string(),
        -1 => format!(
            "cash short by {}",
            format_minor_units(variance_cents.saturating_neg(), currency)
        ),
        _ => format!("cash over by {}", format_minor_units(variance_cents, currency)),
    };

    Classification {
        variance_cents,
        variance_bps: Some(variance_bps),
        severity,
        reason,
    }
}
