use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::identity::{AlertId, DrawerId, EntryId, ShiftId, StaffId, VenueId};
use crate::money::Currency;

/// Severity of a cash variance, ordered from least to most serious.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    /// Severities an external notifier is expected to act on.
    pub fn needs_attention(&self) -> bool {
        *self >= Self::High
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            other => Err(TypeError::InvalidId(format!("unknown severity: {other}"))),
        }
    }
}

/// Manager sign-off on an alert. The only part of an alert that changes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub resolved_by: StaffId,
    pub resolved_at: DateTime<Utc>,
    pub notes: String,
}

/// Result of comparing a drawer's expected cash against the physical count.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CashVarianceAlert {
    pub id: AlertId,
    /// Position in the alert feed, assigned by the store on insert.
    pub seq: u64,
    pub venue_id: VenueId,
    pub business_date: NaiveDate,
    pub shift_id: Option<ShiftId>,
    pub drawer_id: Option<DrawerId>,
    pub currency: Currency,
    pub expected_cents: i64,
    pub actual_cents: i64,
    /// `actual_cents - expected_cents`.
    pub variance_cents: i64,
    /// Variance relative to expected, in basis points (1% = 100).
    /// `None` when there is no expected baseline.
    pub variance_bps: Option<i64>,
    pub severity: Severity,
    pub reason: String,
    pub staff_id: Option<StaffId>,
    pub transaction_count: u32,
    pub cash_transaction_count: u32,
    /// The `cash_variance` ledger entry written for this count, if any.
    pub ledger_entry_id: Option<EntryId>,
    pub created_at: DateTime<Utc>,
    pub resolution: Option<Resolution>,
}

impl CashVarianceAlert {
    pub fn is_resolved(&self) -> bool {
        self.resolution.is_some()
    }

    /// Variance as a percentage, for display only.
    pub fn variance_pct(&self) -> Option<f64> {
        self.variance_bps.map(|bps| bps as f64 / 100.0)
    }

    /// `true` if every measured fact matches `other`; resolution is ignored.
    pub fn same_facts(&self, other: &Self) -> bool {
        let mut a = self.clone();
        let mut b = other.clone();
        a.resolution = None;
        b.resolution = None;
        a == b
    }
}
