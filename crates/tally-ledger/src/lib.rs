//! Append-only, hash-chained payment ledger.
//!
//! This crate provides:
//! - [`LedgerWriter`]: validates an [`EntryDraft`], links it to the venue
//!   tail, hashes it, and commits with compare-and-set plus bounded retry
//! - [`ChainVerifier`]: read-only recomputation of a venue chain
//! - Query helpers over the store, including per-shift cash totals
//!
//! Entries are never updated. A correction is a new entry whose
//! `corrects_entry_id` names the original.

pub mod config;
pub mod draft;
pub mod error;
pub mod query;
pub mod validation;
pub mod verify;
pub mod writer;

pub use config::{LedgerConfig, RetryPolicy};
pub use draft::EntryDraft;
pub use error::{LedgerError, LedgerResult};
pub use query::{cash_totals, CashTotals, LedgerReader};
pub use validation::validate_draft;
pub use verify::{ChainVerifier, Verification, VerificationReport, Violation};
pub use writer::{Appended, LedgerWriter};
