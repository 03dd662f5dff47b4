use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Upper bound on the TTL, ten years.
const MAX_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// Configuration for the idempotency gate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// How long a record keeps its key reserved, in seconds (default: 24h).
    pub ttl_secs: u64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 24 * 60 * 60,
        }
    }
}

impl GateConfig {
    pub fn ttl(&self) -> Duration {
        Duration::seconds(self.ttl_secs.min(MAX_TTL_SECS) as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_ttl_is_one_day() {
        assert_eq!(GateConfig::default().ttl(), Duration::hours(24));
    }

    #[test]
    fn parses_partial_toml() {
        let cfg: GateConfig = toml::from_str("ttl_secs = 60").unwrap();
        assert_eq!(cfg.ttl(), Duration::minutes(1));
        let cfg: GateConfig = toml::from_str("").unwrap();
        assert_eq!(cfg, GateConfig::default());
    }
}
