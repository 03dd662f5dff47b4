use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tally_gate::GateConfig;
use tally_ledger::{LedgerConfig, RetryPolicy};
use tally_store::JournalConfig;
use tally_variance::VarianceConfig;

use crate::error::{SdkError, SdkResult};

/// How long a duplicate request waits for the original to finish.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InFlightConfig {
    pub max_wait_ms: u64,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for InFlightConfig {
    fn default() -> Self {
        Self {
            max_wait_ms: 5_000,
            base_delay_ms: 5,
            max_delay_ms: 250,
        }
    }
}

impl InFlightConfig {
    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }

    pub(crate) fn delay(&self, attempt: u32) -> Duration {
        RetryPolicy {
            max_attempts: u32::MAX,
            base_delay_ms: self.base_delay_ms,
            max_delay_ms: self.max_delay_ms,
        }
        .delay(attempt)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Mirror audit events to `tracing` under the `tally::audit` target.
    pub tracing: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self { tracing: true }
    }
}

/// Top-level configuration, usually read from `tally.toml`.
///
/// Every section and field has a default, so an empty file is valid.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TallyConfig {
    pub gate: GateConfig,
    pub ledger: LedgerConfig,
    pub variance: VarianceConfig,
    pub journal: JournalConfig,
    pub in_flight: InFlightConfig,
    pub audit: AuditConfig,
}

impl TallyConfig {
    pub fn from_toml_str(text: &str) -> SdkResult<Self> {
        toml::from_str(text).map_err(|e| SdkError::Config(e.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> SdkResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| SdkError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> SdkResult<String> {
        toml::to_string_pretty(self).map_err(|e| SdkError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_store::SyncMode;
    use tally_types::{Currency, VenueId};

    #[test]
    fn empty_file_gives_defaults() {
        assert_eq!(TallyConfig::from_toml_str("").unwrap(), TallyConfig::default());
    }

    #[test]
    fn sections_override_defaults() {
        let config = TallyConfig::from_toml_str(
            r#"
            [gate]
            ttl_secs = 3600

            [ledger]
            supported_currencies = ["EUR"]

            [ledger.retry]
            max_attempts = 9

            [journal]
            sync_mode = "every_write"

            [[variance.overrides]]
            venue_id = 4
            [variance.overrides.thresholds.low]
            max_bps = 50
            max_cents = 200

            [audit]
            tracing = false
            "#,
        )
        .unwrap();

        assert_eq!(config.gate.ttl_secs, 3600);
        assert!(config.ledger.supports(Currency::EUR));
        assert!(!config.ledger.supports(Currency::BGN));
        assert_eq!(config.ledger.retry.max_attempts, 9);
        assert_eq!(config.ledger.retry.base_delay_ms, RetryPolicy::default().base_delay_ms);
        assert_eq!(config.journal.sync_mode, SyncMode::EveryWrite);
        assert_eq!(config.variance.thresholds_for(VenueId(4)).low.max_bps, 50);
        assert_eq!(config.variance.thresholds_for(VenueId(5)).low.max_bps, 100);
        assert!(!config.audit.tracing);
        assert_eq!(config.in_flight, InFlightConfig::default());
    }

    #[test]
    fn malformed_toml_is_a_config_error() {
        let err = TallyConfig::from_toml_str("[gate]\nttl_secs = \"soon\"").unwrap_err();
        assert!(matches!(err, SdkError::Config(_)));
    }

    #[test]
    fn rendered_config_parses_back() {
        let text = TallyConfig::default().to_toml_string().unwrap();
        assert_eq!(TallyConfig::from_toml_str(&text).unwrap(), TallyConfig::default());
    }
}
