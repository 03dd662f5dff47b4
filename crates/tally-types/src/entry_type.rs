use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Kind of money-moving action recorded by a ledger entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    PaymentReceived,
    PaymentRefunded,
    PaymentVoided,
    TipReceived,
    TipAdjusted,
    CashIn,
    CashOut,
    CashDrop,
    CashVariance,
    Adjustment,
}

impl EntryType {
    pub const ALL: [EntryType; 10] = [
        Self::PaymentReceived,
        Self::PaymentRefunded,
        Self::PaymentVoided,
        Self::TipReceived,
        Self::TipAdjusted,
        Self::CashIn,
        Self::CashOut,
        Self::CashDrop,
        Self::CashVariance,
        Self::Adjustment,
    ];

    /// Stable wire name; also the encoding fed into the entry hash.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PaymentReceived => "payment_received",
            Self::PaymentRefunded => "payment_refunded",
            Self::PaymentVoided => "payment_voided",
            Self::TipReceived => "tip_received",
            Self::TipAdjusted => "tip_adjusted",
            Self::CashIn => "cash_in",
            Self::CashOut => "cash_out",
            Self::CashDrop => "cash_drop",
            Self::CashVariance => "cash_variance",
            Self::Adjustment => "adjustment",
        }
    }

    /// Signed types carry their direction in the amount sign. Every other
    /// type records a strictly positive magnitude.
    pub fn is_signed(&self) -> bool {
        matches!(self, Self::Adjustment | Self::CashVariance)
    }

    /// Types that undo or correct an earlier entry.
    pub fn is_correction(&self) -> bool {
        matches!(
            self,
            Self::PaymentRefunded | Self::PaymentVoided | Self::TipAdjusted | Self::Adjustment
        )
    }

    /// Correction types that must name the entry they correct.
    pub fn requires_original(&self) -> bool {
        matches!(self, Self::Adjustment)
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryType {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| TypeError::UnknownEntryType(s.to_string()))
    }
}
