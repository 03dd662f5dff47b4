//! Operational audit log.
//!
//! Records who did what, from where, with before/after snapshots. Unlike the
//! ledger this log is not hash-chained and writing it is best-effort: a sink
//! failure never fails the operation being audited. Failures are logged,
//! counted, and broadcast on an error channel that operators can subscribe
//! to.

pub mod error;
pub mod event;
pub mod logger;
pub mod sink;

pub use error::AuditError;
pub use event::{AuditAction, AuditEvent};
pub use logger::{AuditFailure, AuditLogger};
pub use sink::{AuditSink, InMemoryAuditSink, TracingAuditSink};
