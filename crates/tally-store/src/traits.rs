use chrono::{DateTime, Utc};
use tally_types::{
    AlertId, CachedResponse, CashVarianceAlert, ChainTail, EntryId, IdempotencyRecord,
    LedgerEntry, RequestFingerprint, Resolution, VenueId,
};

use crate::error::StoreResult;
use crate::query::{AlertQuery, EntryQuery};

/// Append-only ledger entry storage.
///
/// Implementations must satisfy these invariants:
/// - `commit_entry` is atomic: the tail check, the unique-key check, the
///   insert, and the tail advance happen together or not at all.
/// - A committed entry is never modified or removed.
/// - Reads return snapshots of committed state only.
pub trait LedgerStore: Send + Sync {
    /// Current tail of the venue chain, `None` if the venue has no entries.
    fn tail(&self, venue: VenueId) -> StoreResult<Option<ChainTail>>;

    /// Commit `entry` if the venue tail still equals `expected_tail`.
    ///
    /// Fails with `TailMoved` if another writer advanced the tail first, and
    /// with `DuplicateKey` if an entry already carries the idempotency key.
    /// The entry must link to `expected_tail` (number and previous id).
    fn commit_entry(&self, entry: &LedgerEntry, expected_tail: Option<&ChainTail>)
        -> StoreResult<()>;

    fn get(&self, id: EntryId) -> StoreResult<Option<LedgerEntry>>;

    /// Lookup through the unique idempotency-key index.
    fn get_by_key(&self, key: &str) -> StoreResult<Option<LedgerEntry>>;

    /// Entries numbered `from..=to` for the venue, in order.
    fn range(&self, venue: VenueId, from: u64, to: u64) -> StoreResult<Vec<LedgerEntry>>;

    fn query(&self, query: &EntryQuery) -> StoreResult<Vec<LedgerEntry>>;

    /// All venues with at least one entry, sorted.
    fn venues(&self) -> StoreResult<Vec<VenueId>>;

    fn entry_count(&self, venue: VenueId) -> StoreResult<u64> {
        Ok(self.tail(venue)?.map(|t| t.entry_number).unwrap_or(0))
    }
}

/// Result of a conditional insert into the idempotency key space.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InsertOutcome {
    /// No live record existed; the new one is now stored.
    Inserted,
    /// A live record already holds the key.
    Existing(IdempotencyRecord),
}

/// Idempotency record storage with passive expiry.
///
/// A record whose `expires_at` is at or before `now` is treated as absent by
/// every method.
pub trait IdempotencyStore: Send + Sync {
    /// Insert `record` unless a live record holds the key. An expired record
    /// under the same key is replaced.
    fn insert_if_absent(
        &self,
        record: IdempotencyRecord,
        now: DateTime<Utc>,
    ) -> StoreResult<InsertOutcome>;

    fn get_record(&self, key: &str, now: DateTime<Utc>) -> StoreResult<Option<IdempotencyRecord>>;

    /// Move a processing record to completed, caching `response`.
    fn complete(
        &self,
        key: &str,
        fingerprint: &RequestFingerprint,
        response: CachedResponse,
        entry_id: Option<EntryId>,
        now: DateTime<Utc>,
    ) -> StoreResult<IdempotencyRecord>;

    /// Remove a processing record so the key can be retried.
    /// Returns `false` if there was no matching processing record.
    fn remove_processing(&self, key: &str, fingerprint: &RequestFingerprint)
        -> StoreResult<bool>;

    /// Delete every record expired at `now`. Returns the number removed.
    fn purge_expired(&self, now: DateTime<Utc>) -> StoreResult<usize>;
}

/// Cash variance alert storage.
pub trait AlertStore: Send + Sync {
    /// Store a new alert, assigning the next feed sequence number.
    fn insert_alert(&self, alert: CashVarianceAlert) -> StoreResult<CashVarianceAlert>;

    fn get_alert(&self, id: AlertId) -> StoreResult<Option<CashVarianceAlert>>;

    /// Attach a resolution. Fails with `InvalidState` if already resolved.
    fn resolve_alert(&self, id: AlertId, resolution: Resolution)
        -> StoreResult<CashVarianceAlert>;

    /// Alerts with `seq > after_seq`, in feed order.
    fn alerts_after(&self, after_seq: u64, limit: usize) -> StoreResult<Vec<CashVarianceAlert>>;

    fn query_alerts(&self, query: &AlertQuery) -> StoreResult<Vec<CashVarianceAlert>>;
}
