//! Storage backends for the Tally payment ledger.
//!
//! Three record families are stored, each behind its own trait:
//!
//! - [`LedgerStore`] -- append-only entries ordered by `(venue_id, entry_number)`,
//!   with a unique index on the idempotency key and a per-venue tail pointer
//! - [`IdempotencyStore`] -- keyed de-duplication records with passive TTL expiry
//! - [`AlertStore`] -- cash variance alerts, where only the resolution is mutable
//!
//! # Backends
//!
//! - [`InMemoryStore`] -- `RwLock`-guarded maps for tests and embedding
//! - [`JournalStore`] -- the in-memory indexes rebuilt from a CRC-framed
//!   append-only journal file
//!
//! # Design Rules
//!
//! 1. Entries are never updated or deleted once committed.
//! 2. Appends are compare-and-set on the venue tail; a stale tail is rejected
//!    with [`StoreError::TailMoved`], never silently re-linked.
//! 3. The idempotency key space is guarded by a conditional insert, not a
//!    caller-side lock.
//! 4. Reads return owned snapshots and never observe a half-applied write.
//! 5. All I/O errors are propagated, never silently ignored.

pub mod error;
pub mod journal;
pub mod memory;
pub mod query;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use journal::{JournalConfig, JournalStore, SyncMode};
pub use memory::InMemoryStore;
pub use query::{AlertQuery, EntryQuery};
pub use traits::{AlertStore, IdempotencyStore, InsertOutcome, LedgerStore};
