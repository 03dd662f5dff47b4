mod state;

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use tally_types::{
    AlertId, CachedResponse, CashVarianceAlert, ChainTail, EntryId, IdempotencyRecord,
    LedgerEntry, RequestFingerprint, Resolution, VenueId,
};

use crate::error::{StoreError, StoreResult};
use crate::query::{AlertQuery, EntryQuery};
use crate::traits::{AlertStore, IdempotencyStore, InsertOutcome, LedgerStore};

pub(crate) use state::StoreState;

/// In-memory store for entries, idempotency records, and alerts.
///
/// Intended for tests and embedding. A single `RwLock` is the transaction
/// boundary: every mutation checks and applies under one write guard.
#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<StoreState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of idempotency records held, expired ones included.
    pub fn record_count(&self) -> StoreResult<usize> {
        Ok(self.read()?.record_count())
    }

    /// Replace a committed entry without any validation.
    ///
    /// Simulates a direct edit of the underlying table so that verification
    /// can be exercised. Returns `false` if the entry does not exist.
    #[cfg(feature = "test-util")]
    pub fn overwrite_unchecked(&self, entry: LedgerEntry) -> StoreResult<bool> {
        Ok(self.write()?.overwrite_unchecked(entry))
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, StoreState>> {
        self.state.read().map_err(|_| StoreError::poisoned("memory store"))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, StoreState>> {
        self.state.write().map_err(|_| StoreError::poisoned("memory store"))
    }
}

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStore").finish_non_exhaustive()
    }
}

impl LedgerStore for InMemoryStore {
    fn tail(&self, venue: VenueId) -> StoreResult<Option<ChainTail>> {
        Ok(self.read()?.tail(venue))
    }

    fn commit_entry(
        &self,
        entry: &LedgerEntry,
        expected_tail: Option<&ChainTail>,
    ) -> StoreResult<()> {
        let mut state = self.write()?;
        state.check_commit(entry, expected_tail)?;
        state.apply_commit(entry.clone());
        Ok(())
    }

    fn get(&self, id: EntryId) -> StoreResult<Option<LedgerEntry>> {
        Ok(self.read()?.get(id))
    }

    fn get_by_key(&self, key: &str) -> StoreResult<Option<LedgerEntry>> {
        Ok(self.read()?.get_by_key(key))
    }

    fn range(&self, venue: VenueId, from: u64, to: u64) -> StoreResult<Vec<LedgerEntry>> {
        Ok(self.read()?.range(venue, from, to))
    }

    fn query(&self, query: &EntryQuery) -> StoreResult<Vec<LedgerEntry>> {
        Ok(self.read()?.query(query))
    }

    fn venues(&self) -> StoreResult<Vec<VenueId>> {
        Ok(self.read()?.venues())
    }
}

impl IdempotencyStore for InMemoryStore {
    fn insert_if_absent(
        &self,
        record: IdempotencyRecord,
        now: DateTime<Utc>,
    ) -> StoreResult<InsertOutcome> {
        let mut state = self.write()?;
        if let Some(existing) = state.live_record(&record.key, now) {
            return Ok(InsertOutcome::Existing(existing.clone()));
        }
        state.put_record(record);
        Ok(InsertOutcome::Inserted)
    }

    fn get_record(&self, key: &str, now: DateTime<Utc>) -> StoreResult<Option<IdempotencyRecord>> {
        Ok(self.read()?.live_record(key, now).cloned())
    }

    fn complete(
        &self,
        key: &str,
        fingerprint: &RequestFingerprint,
        response: CachedResponse,
        entry_id: Option<EntryId>,
        now: DateTime<Utc>,
    ) -> StoreResult<IdempotencyRecord> {
        let mut state = self.write()?;
        let completed = state.plan_complete(key, fingerprint, response, entry_id, now)?;
        state.put_record(completed.clone());
        Ok(completed)
    }

    fn remove_processing(
        &self,
        key: &str,
        fingerprint: &RequestFingerprint,
    ) -> StoreResult<bool> {
        let mut state = self.write()?;
        if !state.is_processing_for(key, fingerprint) {
            return Ok(false);
        }
        state.remove_record(key);
        Ok(true)
    }

    fn purge_expired(&self, now: DateTime<Utc>) -> StoreResult<usize> {
        Ok(self.write()?.purge_expired(now))
    }
}

impl AlertStore for InMemoryStore {
    fn insert_alert(&self, alert: CashVarianceAlert) -> StoreResult<CashVarianceAlert> {
        let mut state = self.write()?;
        let stored = state.plan_alert_insert(alert)?;
        state.apply_alert_insert(stored.clone());
        Ok(stored)
    }

    fn get_alert(&self, id: AlertId) -> StoreResult<Option<CashVarianceAlert>> {
        Ok(self.read()?.get_alert(id))
    }

    fn resolve_alert(
        &self,
        id: AlertId,
        resolution: Resolution,
    ) -> StoreResult<CashVarianceAlert> {
        let mut state = self.write()?;
        let resolved = state.plan_resolve(id, resolution)?;
        state.apply_resolve(resolved.clone());
        Ok(resolved)
    }

    fn alerts_after(&self, after_seq: u64, limit: usize) -> StoreResult<Vec<CashVarianceAlert>> {
        Ok(self.read()?.alerts_after(after_seq, limit))
    }

    fn query_alerts(&self, query: &AlertQuery) -> StoreResult<Vec<CashVarianceAlert>> {
        Ok(self.read()?.query_alerts(query))
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use chrono::Duration;
    use tally_types::{EntryType, Severity, StaffId};

    fn append(store: &InMemoryStore, venue: u64, key: &str) -> LedgerEntry {
        let tail = store.tail(VenueId(venue)).unwrap();
        let entry = entry_after(venue, tail.as_ref(), key);
        store.commit_entry(&entry, tail.as_ref()).unwrap();
        entry
    }

    #[test]
    fn commit_advances_tail() {
        let store = InMemoryStore::new();
        assert!(store.tail(VenueId(1)).unwrap().is_none());

        let first = append(&store, 1, "a");
        let second = append(&store, 1, "b");

        let tail = store.tail(VenueId(1)).unwrap().unwrap();
        assert_eq!(tail.entry_id, second.id);
        assert_eq!(tail.entry_number, 2);
        assert_eq!(store.entry_count(VenueId(1)).unwrap(), 2);
        assert_eq!(store.get(first.id).unwrap().unwrap(), first);
        assert_eq!(store.get_by_key("b").unwrap().unwrap().id, second.id);
    }

    #[test]
    fn stale_tail_is_rejected() {
        let store = InMemoryStore::new();
        append(&store, 1, "a");

        let stale = entry_after(1, None, "b");
        match store.commit_entry(&stale, None) {
            Err(StoreError::TailMoved { expected, actual, .. }) => {
                assert_eq!(expected, 0);
                assert_eq!(actual, 1);
            }
            other => panic!("expected TailMoved, got {other:?}"),
        }
        assert_eq!(store.entry_count(VenueId(1)).unwrap(), 1);
    }

    #[test]
    fn duplicate_key_is_rejected_across_venues() {
        let store = InMemoryStore::new();
        append(&store, 1, "shared");

        let entry = entry_after(2, None, "shared");
        assert!(matches!(
            store.commit_entry(&entry, None),
            Err(StoreError::DuplicateKey(_))
        ));
        assert!(store.tail(VenueId(2)).unwrap().is_none());
    }

    #[test]
    fn entry_must_link_to_expected_tail() {
        let store = InMemoryStore::new();
        let mut entry = entry_after(1, None, "a");
        entry.entry_number = 2;
        assert!(matches!(
            store.commit_entry(&entry, None),
            Err(StoreError::InvalidState(_))
        ));
    }

    #[test]
    fn venues_are_independent_chains() {
        let store = InMemoryStore::new();
        append(&store, 2, "x");
        append(&store, 1, "y");
        append(&store, 2, "z");

        assert_eq!(store.venues().unwrap(), vec![VenueId(1), VenueId(2)]);
        assert_eq!(store.entry_count(VenueId(1)).unwrap(), 1);
        assert_eq!(store.entry_count(VenueId(2)).unwrap(), 2);
    }

    #[test]
    fn range_is_inclusive_and_clamped() {
        let store = InMemoryStore::new();
        for i in 0..5 {
            append(&store, 1, &format!("k{i}"));
        }
        let numbers = |v: Vec<LedgerEntry>| v.iter().map(|e| e.entry_number).collect::<Vec<_>>();

        assert_eq!(numbers(store.range(VenueId(1), 2, 4).unwrap()), vec![2, 3, 4]);
        assert_eq!(numbers(store.range(VenueId(1), 0, 99).unwrap()), vec![1, 2, 3, 4, 5]);
        assert!(store.range(VenueId(1), 4, 2).unwrap().is_empty());
        assert!(store.range(VenueId(9), 1, 5).unwrap().is_empty());
    }

    #[test]
    fn query_filters_and_pages() {
        let store = InMemoryStore::new();
        for i in 0..6 {
            let tail = store.tail(VenueId(1)).unwrap();
            let mut entry = entry_after(1, tail.as_ref(), &format!("k{i}"));
            if i % 2 == 1 {
                entry.entry_type = EntryType::TipReceived;
            }
            store.commit_entry(&entry, tail.as_ref()).unwrap();
        }

        let tips = store
            .query(&EntryQuery::venue(VenueId(1)).of_types([EntryType::TipReceived]))
            .unwrap();
        assert_eq!(tips.iter().map(|e| e.entry_number).collect::<Vec<_>>(), vec![2, 4, 6]);

        let page = store
            .query(&EntryQuery::venue(VenueId(1)).after(2).limit(2))
            .unwrap();
        assert_eq!(page.iter().map(|e| e.entry_number).collect::<Vec<_>>(), vec![3, 4]);

        let other_day = day().succ_opt().unwrap();
        let none = store
            .query(&EntryQuery::venue(VenueId(1)).between(other_day, other_day))
            .unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn idempotency_insert_is_conditional() {
        let store = InMemoryStore::new();
        assert_eq!(
            store.insert_if_absent(processing("k", 1), t0()).unwrap(),
            InsertOutcome::Inserted
        );
        match store.insert_if_absent(processing("k", 2), t0()).unwrap() {
            InsertOutcome::Existing(existing) => assert_eq!(existing.fingerprint.0, [1; 32]),
            InsertOutcome::Inserted => panic!("second insert must see the first record"),
        }
    }

    #[test]
    fn expired_record_is_absent_and_replaceable() {
        let store = InMemoryStore::new();
        store.insert_if_absent(processing("k", 1), t0()).unwrap();
        let later = t0() + Duration::hours(24);

        assert!(store.get_record("k", later).unwrap().is_none());
        assert_eq!(
            store.insert_if_absent(processing("k", 2), later).unwrap(),
            InsertOutcome::Inserted
        );
    }

    #[test]
    fn complete_and_remove_follow_state() {
        let store = InMemoryStore::new();
        let fp = RequestFingerprint([1; 32]);
        store.insert_if_absent(processing("k", 1), t0()).unwrap();

        assert!(!store.remove_processing("k", &RequestFingerprint([2; 32])).unwrap());

        let response = CachedResponse { status: 201, body: b"{}".to_vec() };
        let done = store.complete("k", &fp, response.clone(), None, t0()).unwrap();
        assert!(done.is_completed());
        assert_eq!(done.response, Some(response.clone()));

        assert!(matches!(
            store.complete("k", &fp, response.clone(), None, t0()),
            Err(StoreError::InvalidState(_))
        ));
        assert!(!store.remove_processing("k", &fp).unwrap());
        assert!(matches!(
            store.complete("missing", &fp, response, None, t0()),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn purge_removes_only_expired() {
        let store = InMemoryStore::new();
        store.insert_if_absent(processing("old", 1), t0()).unwrap();
        let mut fresh = processing("new", 2);
        fresh.expires_at = t0() + Duration::hours(48);
        store.insert_if_absent(fresh, t0()).unwrap();

        assert_eq!(store.purge_expired(t0() + Duration::hours(30)).unwrap(), 1);
        assert_eq!(store.record_count().unwrap(), 1);
    }

    #[test]
    fn alerts_get_feed_sequence() {
        let store = InMemoryStore::new();
        let a = store.insert_alert(alert(1, Severity::Low)).unwrap();
        let b = store.insert_alert(alert(2, Severity::High)).unwrap();
        let c = store.insert_alert(alert(1, Severity::Critical)).unwrap();
        assert_eq!((a.seq, b.seq, c.seq), (1, 2, 3));

        let after = store.alerts_after(1, 10).unwrap();
        assert_eq!(after.iter().map(|a| a.seq).collect::<Vec<_>>(), vec![2, 3]);
        assert_eq!(store.alerts_after(1, 1).unwrap().len(), 1);
        assert!(store.alerts_after(3, 10).unwrap().is_empty());

        let serious = store
            .query_alerts(&AlertQuery {
                min_severity: Some(Severity::High),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(serious.len(), 2);
    }

    #[test]
    fn alert_resolves_once() {
        let store = InMemoryStore::new();
        let stored = store.insert_alert(alert(1, Severity::High)).unwrap();
        let resolution = Resolution {
            resolved_by: StaffId(7),
            resolved_at: t0(),
            notes: "miscounted coins".into(),
        };

        let resolved = store.resolve_alert(stored.id, resolution.clone()).unwrap();
        assert!(resolved.is_resolved());
        assert!(resolved.same_facts(&stored));
        assert!(matches!(
            store.resolve_alert(stored.id, resolution),
            Err(StoreError::InvalidState(_))
        ));

        let open = store
            .query_alerts(&AlertQuery { unresolved_only: true, ..Default::default() })
            .unwrap();
        assert!(open.is_empty());
    }
}
