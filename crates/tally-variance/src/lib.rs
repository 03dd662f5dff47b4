//! Cash variance detection.
//!
//! At drawer close the counted cash is compared with what the ledger says
//! should be there. The difference is classified into a [`Severity`] using
//! exact integer arithmetic in basis points, persisted as an alert, and
//! optionally booked as a `cash_variance` ledger entry.
//!
//! The detector only detects and classifies. Deciding when to page a human
//! is left to whoever polls the alert feed.
//!
//! [`Severity`]: tally_types::Severity

pub mod classify;
pub mod config;
pub mod detector;
pub mod error;

pub use classify::{classify, Classification};
pub use config::{Band, VarianceConfig, VarianceThresholds, VenueOverride};
pub use detector::{CashVarianceDetector, DrawerCount};
pub use error::{VarianceError, VarianceResult};
