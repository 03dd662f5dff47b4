//! Foundation types for the Tally payment ledger.
//!
//! Every other Tally crate depends on `tally-types`. Nothing here touches
//! storage or hashing; these are plain values with validation.
//!
//! # Key Types
//!
//! - [`VenueId`], [`StaffId`], [`OrderId`], [`ShiftId`] -- numeric references owned by
//!   the surrounding point-of-sale system
//! - [`EntryId`], [`AlertId`] -- UUID v7 identifiers minted by this core
//! - [`Currency`] -- validated ISO 4217 alphabetic code
//! - [`EntryType`] -- the closed set of money-moving actions
//! - [`LedgerEntry`] -- one immutable, hash-linked financial record
//! - [`IdempotencyRecord`] -- keyed de-duplication state for retried writes
//! - [`CashVarianceAlert`] -- classified drawer-count discrepancy
//! - [`Actor`] -- who performed an operation, with their [`Role`]
//! - [`Clock`] -- injectable time source, with [`BusinessDayPolicy`] for late shifts

pub mod actor;
pub mod alert;
pub mod clock;
pub mod entry;
pub mod entry_type;
pub mod error;
pub mod idempotency;
pub mod identity;
pub mod money;
pub mod payment;

pub use actor::{Actor, Role};
pub use alert::{CashVarianceAlert, Resolution, Severity};
pub use clock::{BusinessDayPolicy, Clock, ManualClock, SystemClock};
pub use entry::{ChainTail, LedgerEntry};
pub use entry_type::EntryType;
pub use error::TypeError;
pub use idempotency::{CachedResponse, IdempotencyRecord, RecordState, RequestFingerprint};
pub use identity::{AlertId, DrawerId, EntryId, OrderId, ShiftId, StaffId, VenueId};
pub use money::{format_minor_units, Currency};
pub use payment::PaymentMethod;
