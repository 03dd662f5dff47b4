use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tally_types::{BusinessDayPolicy, Currency};

/// Backoff for compare-and-set retries on the venue tail.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total commit attempts, the first one included.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 2,
            max_delay_ms: 100,
        }
    }
}

impl RetryPolicy {
    /// Sleep before retry number `attempt` (1-based): exponential, capped,
    /// with jitter in the upper half of the window.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exp = self
            .base_delay_ms
            .saturating_mul(1u64 << attempt.saturating_sub(1).min(20))
            .min(self.max_delay_ms);
        if exp == 0 {
            return Duration::ZERO;
        }
        let jittered = rand::thread_rng().gen_range(exp / 2..=exp);
        Duration::from_millis(jittered)
    }
}

/// Configuration for the ledger writer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub supported_currencies: Vec<Currency>,
    pub retry: RetryPolicy,
    pub business_day: BusinessDayPolicy,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            supported_currencies: vec![Currency::BGN, Currency::EUR, Currency::USD],
            retry: RetryPolicy::default(),
            business_day: BusinessDayPolicy::default(),
        }
    }
}

impl LedgerConfig {
    pub fn supports(&self, currency: Currency) -> bool {
        self.supported_currencies.contains(&currency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_grows_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay_ms: 4,
            max_delay_ms: 20,
        };
        for _ in 0..20 {
            let first = policy.delay(1);
            assert!(first >= Duration::from_millis(2) && first <= Duration::from_millis(4));
            assert!(policy.delay(8) <= Duration::from_millis(20));
        }
    }

    #[test]
    fn zero_base_never_sleeps() {
        let policy = RetryPolicy {
            base_delay_ms: 0,
            ..Default::default()
        };
        assert_eq!(policy.delay(3), Duration::ZERO);
    }

    #[test]
    fn config_from_toml() {
        let cfg: LedgerConfig = toml::from_str(
            r#"
            supported_currencies = ["EUR"]

            [retry]
            max_attempts = 9

            [business_day]
            rollover_hour = 5
            "#,
        )
        .unwrap();
        assert!(cfg.supports(Currency::EUR));
        assert!(!cfg.supports(Currency::BGN));
        assert_eq!(cfg.retry.max_attempts, 9);
        assert_eq!(cfg.retry.base_delay_ms, RetryPolicy::default().base_delay_ms);
        assert_eq!(cfg.business_day.rollover_hour, 5);
    }
}
