//! High-level API for the Tally payment ledger.
//!
//! [`PaymentLedger`] wires the idempotency gate, the chained ledger writer,
//! the cash variance detector, and the audit log behind one type:
//!
//! ```text
//! record(request)
//!   gate.begin ── Proceed ──> writer.append ──> gate.complete(entry JSON)
//!            ├─── Replay ───> cached entry, unchanged
//!            └─── Conflict ─> wait for the in-flight attempt, then replay
//! ```
//!
//! Configuration is read from TOML into [`TallyConfig`]; every field has a
//! default.

pub mod config;
pub mod error;
pub mod ledger;
pub mod request;

pub use config::{AuditConfig, InFlightConfig, TallyConfig};
pub use error::{SdkError, SdkResult};
pub use ledger::PaymentLedger;
pub use request::{CountOutcome, CountRequest, RecordOutcome, RecordRequest};

// Re-export key types for convenience
pub use tally_audit::{AuditAction, AuditEvent, AuditLogger, AuditSink, InMemoryAuditSink};
pub use tally_ledger::{CashTotals, EntryDraft, LedgerError, VerificationReport};
pub use tally_store::{EntryQuery, InMemoryStore, JournalStore};
pub use tally_types::{
    Actor, AlertId, CashVarianceAlert, Currency, EntryId, EntryType, LedgerEntry, PaymentMethod,
    Severity, VenueId,
};
