use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tally_crypto::{compute_entry_hash, EntryHashInput};
use tally_store::{LedgerStore, StoreError};
use tally_types::{ChainTail, Clock, EntryId, LedgerEntry, VenueId};
use tracing::{debug, error, info, warn};

use crate::config::LedgerConfig;
use crate::draft::EntryDraft;
use crate::error::{LedgerError, LedgerResult};
use crate::validation::validate_draft;

/// Result of [`LedgerWriter::append_detailed`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Appended {
    pub entry: LedgerEntry,
    /// `false` when the key already held an identical entry.
    pub created: bool,
}

/// The only way entries enter the ledger.
///
/// Each append validates the draft, reads the venue tail, links and hashes
/// the new entry, and commits it with a compare-and-set on the tail. A lost
/// race is retried against the fresh tail; the writer never skips or invents
/// a link.
pub struct LedgerWriter<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    config: LedgerConfig,
    /// Venues whose chain failed verification, with the reason.
    halted: RwLock<HashMap<VenueId, String>>,
}

impl<S: LedgerStore> LedgerWriter<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, config: LedgerConfig) -> Self {
        Self {
            store,
            clock,
            config,
            halted: RwLock::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Append a draft and return the committed entry.
    ///
    /// If the key already holds an entry with the same payload, that entry
    /// is returned and nothing is written.
    pub fn append(&self, draft: EntryDraft) -> LedgerResult<LedgerEntry> {
        self.append_detailed(draft).map(|a| a.entry)
    }

    pub fn append_detailed(&self, draft: EntryDraft) -> LedgerResult<Appended> {
        validate_draft(&draft, &self.config)?;
        self.ensure_not_halted(draft.venue_id)?;
        self.check_correction_target(&draft)?;

        let venue = draft.venue_id;
        let max_attempts = self.config.retry.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            if let Some(existing) = self.store.get_by_key(&draft.idempotency_key)? {
                return self.resolve_existing(&draft, existing);
            }

            let tail = self.store.tail(venue)?;
            let entry = self.build_entry(&draft, tail.as_ref());

            match self.store.commit_entry(&entry, tail.as_ref()) {
                Ok(()) => {
                    debug!(
                        venue = %venue,
                        entry_number = entry.entry_number,
                        entry_type = %entry.entry_type,
                        amount_cents = entry.amount_cents,
                        hash = %entry.short_hash(),
                        "ledger entry appended"
                    );
                    return Ok(Appended {
                        entry,
                        created: true,
                    });
                }
                Err(StoreError::TailMoved { expected, actual, .. }) => {
                    warn!(venue = %venue, attempt, expected, actual, "chain tail moved, retrying");
                    if attempt < max_attempts {
                        std::thread::sleep(self.config.retry.delay(attempt));
                    }
                }
                Err(StoreError::DuplicateKey(_)) => {
                    let existing = self.store.get_by_key(&draft.idempotency_key)?.ok_or_else(|| {
                        StoreError::InvalidState(format!(
                            "key {} reported duplicate but has no entry",
                            draft.idempotency_key
                        ))
                    })?;
                    return self.resolve_existing(&draft, existing);
                }
                Err(other) => return Err(other.into()),
            }
        }

        Err(LedgerError::ChainConflict {
            venue,
            attempts: max_attempts,
        })
    }

    /// Refuse further appends for `venue` until [`resume`](Self::resume).
    pub fn halt(&self, venue: VenueId, reason: impl Into<String>) -> LedgerResult<()> {
        let reason = reason.into();
        error!(venue = %venue, reason = %reason, "venue appends halted");
        self.halted
            .write()
            .map_err(|_| StoreError::Unavailable("halt registry lock poisoned".into()))?
            .insert(venue, reason);
        Ok(())
    }

    /// Lift a halt. Returns `false` if the venue was not halted.
    pub fn resume(&self, venue: VenueId) -> LedgerResult<bool> {
        let lifted = self
            .halted
            .write()
            .map_err(|_| StoreError::Unavailable("halt registry lock poisoned".into()))?
            .remove(&venue)
            .is_some();
        if lifted {
            info!(venue = %venue, "venue appends resumed");
        }
        Ok(lifted)
    }

    /// Reason the venue is halted, if it is.
    pub fn halted_reason(&self, venue: VenueId) -> LedgerResult<Option<String>> {
        Ok(self
            .halted
            .read()
            .map_err(|_| StoreError::Unavailable("halt registry lock poisoned".into()))?
            .get(&venue)
            .cloned())
    }

    fn ensure_not_halted(&self, venue: VenueId) -> LedgerResult<()> {
        match self.halted_reason(venue)? {
            Some(reason) => Err(LedgerError::IntegrityViolation { venue, reason }),
            None => Ok(()),
        }
    }

    fn check_correction_target(&self, draft: &EntryDraft) -> LedgerResult<()> {
        let Some(original_id) = draft.corrects_entry_id else {
            return Ok(());
        };
        let original = self.store.get(original_id)?.ok_or_else(|| {
            LedgerError::Validation(format!("corrected entry {original_id} does not exist"))
        })?;
        if original.venue_id != draft.venue_id {
            return Err(LedgerError::Validation(format!(
                "corrected entry {original_id} belongs to {}",
                original.venue_id
            )));
        }
        Ok(())
    }

    fn resolve_existing(&self, draft: &EntryDraft, existing: LedgerEntry) -> LedgerResult<Appended> {
        if draft.matches(&existing) {
            debug!(key = %draft.idempotency_key, entry = %existing.id, "append already recorded");
            Ok(Appended {
                entry: existing,
                created: false,
            })
        } else {
            Err(LedgerError::DuplicateKeyMismatch {
                key: draft.idempotency_key.clone(),
                existing: existing.id,
            })
        }
    }

    fn build_entry(&self, draft: &EntryDraft, tail: Option<&ChainTail>) -> LedgerEntry {
        let created_at = self.clock.now();
        let mut entry = LedgerEntry {
            id: EntryId::new(),
            venue_id: draft.venue_id,
            idempotency_key: draft.idempotency_key.clone(),
            entry_type: draft.entry_type,
            entry_number: tail.map_or(1, |t| t.entry_number + 1),
            order_id: draft.order_id,
            staff_id: draft.staff_id,
            shift_id: draft.shift_id,
            amount_cents: draft.amount_cents,
            currency: draft.currency,
            payment_method: draft.payment_method.clone(),
            payment_detail: draft.payment_detail.clone(),
            description: draft.description.clone(),
            reference: draft.reference.clone(),
            context: draft.context.clone(),
            corrects_entry_id: draft.corrects_entry_id,
            previous_entry_id: tail.map(|t| t.entry_id),
            entry_hash: [0; 32],
            created_at,
            business_date: self.config.business_day.business_date(created_at),
        };
        entry.entry_hash =
            compute_entry_hash(&EntryHashInput::from_entry(&entry, tail.map(|t| t.entry_hash)));
        entry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};
    use tally_store::{InMemoryStore, JournalConfig, JournalStore};
    use tally_types::{Currency, EntryType, ManualClock, PaymentMethod};

    use crate::config::RetryPolicy;
    use crate::verify::{ChainVerifier, Verification};

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 1, 19, 30, 0).unwrap()))
    }

    fn writer() -> LedgerWriter<InMemoryStore> {
        LedgerWriter::new(Arc::new(InMemoryStore::new()), clock(), LedgerConfig::default())
    }

    fn payment(venue: u64, key: &str, amount: i64) -> EntryDraft {
        EntryDraft::new(VenueId(venue), key, EntryType::PaymentReceived, amount, Currency::BGN)
            .method(PaymentMethod::Cash)
    }

    #[test]
    fn entries_link_into_a_chain() {
        let w = writer();
        let first = w.append(payment(1, "a", 2550)).unwrap();
        let second = w.append(payment(1, "b", 1000)).unwrap();

        assert_eq!(first.entry_number, 1);
        assert!(first.previous_entry_id.is_none());
        assert_eq!(second.entry_number, 2);
        assert_eq!(second.previous_entry_id, Some(first.id));
        assert_eq!(
            second.entry_hash,
            compute_entry_hash(&EntryHashInput::from_entry(&second, Some(first.entry_hash)))
        );
        assert_eq!(first.business_date, NaiveDate::from_ymd_opt(2026, 3, 1).unwrap());
    }

    #[test]
    fn same_key_same_payload_returns_existing() {
        let w = writer();
        let first = w.append_detailed(payment(1, "abc", 2550)).unwrap();
        let again = w.append_detailed(payment(1, "abc", 2550)).unwrap();

        assert!(first.created);
        assert!(!again.created);
        assert_eq!(first.entry, again.entry);
        assert_eq!(w.store().entry_count(VenueId(1)).unwrap(), 1);
    }

    #[test]
    fn same_key_different_payload_is_rejected() {
        let w = writer();
        w.append(payment(1, "abc", 2550)).unwrap();
        let err = w.append(payment(1, "abc", 2551)).unwrap_err();
        assert!(matches!(err, LedgerError::DuplicateKeyMismatch { .. }));
        assert_eq!(w.store().entry_count(VenueId(1)).unwrap(), 1);
    }

    #[test]
    fn correction_must_target_same_venue() {
        let w = writer();
        let original = w.append(payment(1, "a", 1000)).unwrap();

        let refund = EntryDraft::new(VenueId(1), "r", EntryType::PaymentRefunded, 1000, Currency::BGN)
            .corrects(original.id);
        assert_eq!(w.append(refund).unwrap().corrects_entry_id, Some(original.id));

        let cross = EntryDraft::new(VenueId(2), "x", EntryType::Adjustment, -10, Currency::BGN)
            .corrects(original.id);
        assert!(matches!(w.append(cross), Err(LedgerError::Validation(_))));

        let dangling = EntryDraft::new(VenueId(1), "d", EntryType::Adjustment, -10, Currency::BGN)
            .corrects(EntryId::new());
        assert!(matches!(w.append(dangling), Err(LedgerError::Validation(_))));
    }

    #[test]
    fn halted_venue_refuses_appends() {
        let w = writer();
        w.halt(VenueId(1), "hash mismatch at #3").unwrap();
        assert!(matches!(
            w.append(payment(1, "a", 100)),
            Err(LedgerError::IntegrityViolation { .. })
        ));
        assert!(w.append(payment(2, "b", 100)).is_ok());

        assert!(w.resume(VenueId(1)).unwrap());
        assert!(w.append(payment(1, "a", 100)).is_ok());
    }

    #[test]
    fn concurrent_appends_form_one_gapless_chain() {
        let mut config = LedgerConfig::default();
        config.retry = RetryPolicy {
            max_attempts: 1_000,
            base_delay_ms: 0,
            max_delay_ms: 0,
        };
        let w = Arc::new(LedgerWriter::new(Arc::new(InMemoryStore::new()), clock(), config));

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let w = Arc::clone(&w);
                std::thread::spawn(move || {
                    for i in 0..25 {
                        w.append(payment(1, &format!("t{t}-{i}"), 100 + i)).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let entries = w.store().range(VenueId(1), 1, u64::MAX).unwrap();
        assert_eq!(entries.len(), 200);
        for (i, entry) in entries.iter().enumerate() {
            assert_eq!(entry.entry_number, i as u64 + 1);
        }
        assert_eq!(
            ChainVerifier::verify(&**w.store(), VenueId(1), 1, 200).unwrap(),
            Verification::Valid
        );
    }

    #[test]
    fn exhausted_retries_are_a_chain_conflict() {
        /// Store whose tail always moves underneath the writer.
        struct Racing(InMemoryStore);

        impl LedgerStore for Racing {
            fn tail(&self, venue: VenueId) -> tally_store::StoreResult<Option<ChainTail>> {
                self.0.tail(venue)
            }
            fn commit_entry(
                &self,
                entry: &LedgerEntry,
                _: Option<&ChainTail>,
            ) -> tally_store::StoreResult<()> {
                Err(StoreError::TailMoved {
                    venue: entry.venue_id,
                    expected: entry.entry_number - 1,
                    actual: entry.entry_number,
                })
            }
            fn get(&self, id: EntryId) -> tally_store::StoreResult<Option<LedgerEntry>> {
                self.0.get(id)
            }
            fn get_by_key(&self, key: &str) -> tally_store::StoreResult<Option<LedgerEntry>> {
                self.0.get_by_key(key)
            }
            fn range(
                &self,
                venue: VenueId,
                from: u64,
                to: u64,
            ) -> tally_store::StoreResult<Vec<LedgerEntry>> {
                self.0.range(venue, from, to)
            }
            fn query(
                &self,
                query: &tally_store::EntryQuery,
            ) -> tally_store::StoreResult<Vec<LedgerEntry>> {
                self.0.query(query)
            }
            fn venues(&self) -> tally_store::StoreResult<Vec<VenueId>> {
                self.0.venues()
            }
        }

        let mut config = LedgerConfig::default();
        config.retry.base_delay_ms = 0;
        let w = LedgerWriter::new(Arc::new(Racing(InMemoryStore::new())), clock(), config);
        match w.append(payment(1, "a", 100)) {
            Err(LedgerError::ChainConflict { attempts, .. }) => assert_eq!(attempts, 5),
            other => panic!("expected ChainConflict, got {other:?}"),
        }
    }

    #[test]
    fn journal_backed_writer_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("venue.journal");
        let first = {
            let store = Arc::new(JournalStore::open(&path, JournalConfig::default()).unwrap());
            let w = LedgerWriter::new(store, clock(), LedgerConfig::default());
            w.append(payment(1, "a", 100)).unwrap()
        };

        let store = Arc::new(JournalStore::open(&path, JournalConfig::default()).unwrap());
        let w = LedgerWriter::new(store, clock(), LedgerConfig::default());
        let second = w.append(payment(1, "b", 200)).unwrap();
        assert_eq!(second.previous_entry_id, Some(first.id));
        assert_eq!(
            ChainVerifier::verify(&**w.store(), VenueId(1), 1, 2).unwrap(),
            Verification::Valid
        );
    }

    #[test]
    fn float_context_verifies_after_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("venue.journal");
        let context = serde_json::json!({ "tip_ratio": 1.0715660391465826e-75, "split": 0.1 });
        let written = {
            let store = Arc::new(JournalStore::open(&path, JournalConfig::default()).unwrap());
            let w = LedgerWriter::new(store, clock(), LedgerConfig::default());
            w.append(payment(1, "a", 100).context(context.clone())).unwrap()
        };

        let store = JournalStore::open(&path, JournalConfig::default()).unwrap();
        let reloaded = store.get(written.id).unwrap().unwrap();
        assert_eq!(reloaded.context, Some(context));
        assert_eq!(reloaded.entry_hash, written.entry_hash);
        assert_eq!(ChainVerifier::verify(&store, VenueId(1), 1, 1).unwrap(), Verification::Valid);
    }
}
