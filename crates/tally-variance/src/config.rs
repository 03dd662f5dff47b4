use serde::{Deserialize, Serialize};
use tally_types::VenueId;

/// Upper bounds for one severity level. Both are exclusive and both must
/// hold for the level to apply.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Band {
    /// Relative bound in basis points (100 = 1%).
    pub max_bps: i64,
    /// Absolute bound in minor units.
    pub max_cents: i64,
}

impl Band {
    pub const fn new(max_bps: i64, max_cents: i64) -> Self {
        Self { max_bps, max_cents }
    }
}

/// Severity bands, from the tightest up. Anything outside `high` is critical.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VarianceThresholds {
    pub low: Band,
    pub medium: Band,
    pub high: Band,
}

impl Default for VarianceThresholds {
    fn default() -> Self {
        Self {
            low: Band::new(100, 500),
            medium: Band::new(300, 2_000),
            high: Band::new(700, 10_000),
        }
    }
}

/// Thresholds that replace the defaults for one venue.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VenueOverride {
    pub venue_id: VenueId,
    pub thresholds: VarianceThresholds,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VarianceConfig {
    pub thresholds: VarianceThresholds,
    pub overrides: Vec<VenueOverride>,
    /// Book non-zero variances as `cash_variance` entries in
    /// `evaluate_and_record`.
    pub record_ledger_entry: bool,
}

impl Default for VarianceConfig {
    fn default() -> Self {
        Self {
            thresholds: VarianceThresholds::default(),
            overrides: Vec::new(),
            record_ledger_entry: true,
        }
    }
}

impl VarianceConfig {
    pub fn thresholds_for(&self, venue: VenueId) -> &VarianceThresholds {
        self.overrides
            .iter()
            .find(|o| o.venue_id == venue)
            .map_or(&self.thresholds, |o| &o.thresholds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_apply_per_venue() {
        let cfg: VarianceConfig = toml::from_str(
            r#"
            [thresholds.low]
            max_bps = 50
            max_cents = 200

            [[overrides]]
            venue_id = 7
            [overrides.thresholds.high]
            max_bps = 1500
            max_cents = 50000
            "#,
        )
        .unwrap();

        assert_eq!(cfg.thresholds.low, Band::new(50, 200));
        assert_eq!(cfg.thresholds.medium, VarianceThresholds::default().medium);
        assert_eq!(cfg.thresholds_for(VenueId(7)).high, Band::new(1500, 50_000));
        assert_eq!(cfg.thresholds_for(VenueId(7)).low, VarianceThresholds::default().low);
        assert_eq!(cfg.thresholds_for(VenueId(8)).low, Band::new(50, 200));
        assert!(cfg.record_ledger_entry);
    }
}
