use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tally_types::{
    AlertId, CachedResponse, CashVarianceAlert, ChainTail, EntryId, IdempotencyRecord,
    LedgerEntry, RecordState, RequestFingerprint, Resolution, VenueId,
};

use crate::error::{StoreError, StoreResult};
use crate::query::{AlertQuery, EntryQuery};

/// Indexes shared by every backend.
///
/// Mutations are split into a `check_*`/`plan_*` step that validates against
/// the current state without changing it, and an `apply_*` step that cannot
/// fail. The journal writes its record between the two.
#[derive(Debug, Default)]
pub(crate) struct StoreState {
    chains: HashMap<VenueId, Vec<LedgerEntry>>,
    entry_index: HashMap<EntryId, (VenueId, usize)>,
    key_index: HashMap<String, EntryId>,
    records: HashMap<String, IdempotencyRecord>,
    /// Feed order; `alerts[i].seq == i + 1`.
    alerts: Vec<CashVarianceAlert>,
    alert_index: HashMap<AlertId, usize>,
}

// ---------------------------------------------------------------------------
// Ledger entries
// ---------------------------------------------------------------------------

impl StoreState {
    pub(crate) fn tail(&self, venue: VenueId) -> Option<ChainTail> {
        self.chains
            .get(&venue)
            .and_then(|chain| chain.last())
            .map(LedgerEntry::tail)
    }

    pub(crate) fn check_commit(
        &self,
        entry: &LedgerEntry,
        expected_tail: Option<&ChainTail>,
    ) -> StoreResult<()> {
        if self.key_index.contains_key(&entry.idempotency_key) {
            return Err(StoreError::DuplicateKey(entry.idempotency_key.clone()));
        }

        let current = self.tail(entry.venue_id);
        if current.as_ref() != expected_tail {
            return Err(StoreError::TailMoved {
                venue: entry.venue_id,
                expected: expected_tail.map_or(0, |t| t.entry_number),
                actual: current.map_or(0, |t| t.entry_number),
            });
        }

        let next_number = expected_tail.map_or(1, |t| t.entry_number + 1);
        if entry.entry_number != next_number
            || entry.previous_entry_id != expected_tail.map(|t| t.entry_id)
        {
            return Err(StoreError::InvalidState(format!(
                "entry #{} does not link to the {} tail",
                entry.entry_number, entry.venue_id
            )));
        }

        if self.entry_index.contains_key(&entry.id) {
            return Err(StoreError::InvalidState(format!(
                "entry {} already committed",
                entry.id
            )));
        }
        Ok(())
    }

    pub(crate) fn apply_commit(&mut self, entry: LedgerEntry) {
        let chain = self.chains.entry(entry.venue_id).or_default();
        self.entry_index
            .insert(entry.id, (entry.venue_id, chain.len()));
        self.key_index.insert(entry.idempotency_key.clone(), entry.id);
        chain.push(entry);
    }

    pub(crate) fn get(&self, id: EntryId) -> Option<LedgerEntry> {
        let (venue, idx) = self.entry_index.get(&id)?;
        self.chains.get(venue)?.get(*idx).cloned()
    }

    pub(crate) fn get_by_key(&self, key: &str) -> Option<LedgerEntry> {
        self.key_index.get(key).and_then(|id| self.get(*id))
    }

    pub(crate) fn range(&self, venue: VenueId, from: u64, to: u64) -> Vec<LedgerEntry> {
        let Some(chain) = self.chains.get(&venue) else {
            return Vec::new();
        };
        let from = from.max(1);
        if from > to {
            return Vec::new();
        }
        let start = (from - 1) as usize;
        let end = (to as usize).min(chain.len());
        chain.get(start..end).map(<[_]>::to_vec).unwrap_or_default()
    }

    pub(crate) fn query(&self, query: &EntryQuery) -> Vec<LedgerEntry> {
        let Some(chain) = self.chains.get(&query.venue_id) else {
            return Vec::new();
        };
        let start = query.after_number.unwrap_or(0) as usize;
        chain
            .get(start..)
            .unwrap_or_default()
            .iter()
            .filter(|e| query.matches(e))
            .take(query.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }

    pub(crate) fn venues(&self) -> Vec<VenueId> {
        let mut venues: Vec<VenueId> = self.chains.keys().copied().collect();
        venues.sort();
        venues
    }

    /// Replace a committed entry in place, bypassing every check.
    #[cfg(feature = "test-util")]
    pub(crate) fn overwrite_unchecked(&mut self, entry: LedgerEntry) -> bool {
        let Some((venue, idx)) = self.entry_index.get(&entry.id).copied() else {
            return false;
        };
        match self.chains.get_mut(&venue).and_then(|c| c.get_mut(idx)) {
            Some(slot) => {
                *slot = entry;
                true
            }
            None => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Idempotency records
// ---------------------------------------------------------------------------

impl StoreState {
    pub(crate) fn live_record(&self, key: &str, now: DateTime<Utc>) -> Option<&IdempotencyRecord> {
        self.records.get(key).filter(|r| !r.is_expired(now))
    }

    pub(crate) fn put_record(&mut self, record: IdempotencyRecord) {
        self.records.insert(record.key.clone(), record);
    }

    pub(crate) fn plan_complete(
        &self,
        key: &str,
        fingerprint: &RequestFingerprint,
        response: CachedResponse,
        entry_id: Option<EntryId>,
        now: DateTime<Utc>,
    ) -> StoreResult<IdempotencyRecord> {
        let record = self
            .live_record(key, now)
            .ok_or_else(|| StoreError::NotFound(format!("idempotency record {key}")))?;
        if record.fingerprint != *fingerprint {
            return Err(StoreError::InvalidState(format!(
                "idempotency record {key} belongs to a different request"
            )));
        }
        if record.is_completed() {
            return Err(StoreError::InvalidState(format!(
                "idempotency record {key} already completed"
            )));
        }

        let mut completed = record.clone();
        completed.state = RecordState::Completed;
        completed.response = Some(response);
        completed.ledger_entry_id = entry_id;
        Ok(completed)
    }

    pub(crate) fn is_processing_for(&self, key: &str, fingerprint: &RequestFingerprint) -> bool {
        self.records
            .get(key)
            .is_some_and(|r| r.is_processing() && r.fingerprint == *fingerprint)
    }

    pub(crate) fn remove_record(&mut self, key: &str) {
        self.records.remove(key);
    }

    pub(crate) fn purge_expired(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.records.len();
        self.records.retain(|_, r| !r.is_expired(now));
        before - self.records.len()
    }

    pub(crate) fn record_count(&self) -> usize {
        self.records.len()
    }
}

// ---------------------------------------------------------------------------
// Alerts
// ---------------------------------------------------------------------------

impl StoreState {
    /// Validate a new alert and stamp it with the next feed sequence number.
    pub(crate) fn plan_alert_insert(
        &self,
        mut alert: CashVarianceAlert,
    ) -> StoreResult<CashVarianceAlert> {
        if self.alert_index.contains_key(&alert.id) {
            return Err(StoreError::InvalidState(format!(
                "alert {} already stored",
                alert.id
            )));
        }
        alert.seq = self.alerts.len() as u64 + 1;
        Ok(alert)
    }

    pub(crate) fn apply_alert_insert(&mut self, alert: CashVarianceAlert) {
        self.alert_index.insert(alert.id, self.alerts.len());
        self.alerts.push(alert);
    }

    pub(crate) fn get_alert(&self, id: AlertId) -> Option<CashVarianceAlert> {
        self.alert_index
            .get(&id)
            .and_then(|idx| self.alerts.get(*idx))
            .cloned()
    }

    pub(crate) fn plan_resolve(
        &self,
        id: AlertId,
        resolution: Resolution,
    ) -> StoreResult<CashVarianceAlert> {
        let mut alert = self
            .get_alert(id)
            .ok_or_else(|| StoreError::NotFound(format!("alert {id}")))?;
        if alert.is_resolved() {
            return Err(StoreError::InvalidState(format!("alert {id} already resolved")));
        }
        alert.resolution = Some(resolution);
        Ok(alert)
    }

    pub(crate) fn apply_resolve(&mut self, resolved: CashVarianceAlert) {
        if let Some(slot) = self
            .alert_index
            .get(&resolved.id)
            .and_then(|idx| self.alerts.get_mut(*idx))
        {
            *slot = resolved;
        }
    }

    pub(crate) fn alerts_after(&self, after_seq: u64, limit: usize) -> Vec<CashVarianceAlert> {
        self.alerts
            .get(after_seq as usize..)
            .unwrap_or_default()
            .iter()
            .take(limit)
            .cloned()
            .collect()
    }

    pub(crate) fn query_alerts(&self, query: &AlertQuery) -> Vec<CashVarianceAlert> {
        self.alerts
            .iter()
            .filter(|a| query.matches(a))
            .take(query.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }
}
