use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use tally_audit::{AuditAction, AuditLogger, TracingAuditSink};
use tally_crypto::fingerprint_request;
use tally_gate::{GateOutcome, IdempotencyGate};
use tally_ledger::{
    CashTotals, ChainVerifier, LedgerError, LedgerReader, LedgerWriter, VerificationReport,
};
use tally_store::{
    AlertStore, EntryQuery, IdempotencyStore, InMemoryStore, JournalStore, LedgerStore,
};
use tally_types::{
    Actor, AlertId, CachedResponse, CashVarianceAlert, ChainTail, Clock, Currency, EntryId,
    LedgerEntry, RequestFingerprint, Severity, ShiftId, SystemClock, VenueId,
};
use tally_variance::{CashVarianceDetector, DrawerCount};
use tracing::{debug, error, warn};

use crate::config::{AuditConfig, TallyConfig};
use crate::error::{SdkError, SdkResult};
use crate::request::{
    CountOutcome, CountRequest, RecordOutcome, RecordRequest, COUNT_KEY_PREFIX,
};

/// Status cached for a request that ran to completion.
const CREATED: u16 = 201;

/// Admission of a request past the idempotency gate.
enum Admission {
    Proceed,
    Replay(CachedResponse),
}

/// The payment ledger as a whole: idempotent recording, drawer counts,
/// verification, and the audit trail around them.
pub struct PaymentLedger<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    config: TallyConfig,
    gate: IdempotencyGate<S>,
    writer: Arc<LedgerWriter<S>>,
    reader: LedgerReader<S>,
    detector: CashVarianceDetector<S>,
    audit: AuditLogger,
}

impl PaymentLedger<InMemoryStore> {
    /// A ledger that lives only as long as the process.
    pub fn in_memory(config: TallyConfig) -> Self {
        Self::with_default_audit(Arc::new(InMemoryStore::new()), Arc::new(SystemClock), config)
    }
}

impl PaymentLedger<JournalStore> {
    /// Open (or create) a journal-backed ledger.
    pub fn open(path: impl AsRef<Path>, config: TallyConfig) -> SdkResult<Self> {
        let store = JournalStore::open(path, config.journal.clone())?;
        Ok(Self::with_default_audit(Arc::new(store), Arc::new(SystemClock), config))
    }
}

impl<S> PaymentLedger<S>
where
    S: LedgerStore + IdempotencyStore + AlertStore,
{
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, config: TallyConfig, audit: AuditLogger) -> Self {
        let gate = IdempotencyGate::new(store.clone(), clock.clone(), config.gate.clone());
        let writer = Arc::new(LedgerWriter::new(
            store.clone(),
            clock.clone(),
            config.ledger.clone(),
        ));
        let reader = LedgerReader::new(store.clone());
        let detector =
            CashVarianceDetector::new(writer.clone(), clock.clone(), config.variance.clone());
        Self {
            store,
            clock,
            config,
            gate,
            writer,
            reader,
            detector,
            audit,
        }
    }

    /// Like [`new`](Self::new), with the audit sinks named in `config.audit`.
    pub fn with_default_audit(store: Arc<S>, clock: Arc<dyn Clock>, config: TallyConfig) -> Self {
        let audit = default_audit(clock.clone(), &config.audit);
        Self::new(store, clock, config, audit)
    }

    pub fn config(&self) -> &TallyConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn audit(&self) -> &AuditLogger {
        &self.audit
    }

    // ---- Writes ----

    /// Record a financial event exactly once.
    ///
    /// A retry with the same key and payload returns the first entry with
    /// `replayed` set. The same key with a different payload is refused with
    /// a key-reuse error and the ledger is left unchanged.
    pub fn record(&self, request: RecordRequest) -> SdkResult<RecordOutcome> {
        let path = request.path();
        let RecordRequest { draft, actor } = request;
        let key = draft.idempotency_key.clone();
        let venue = draft.venue_id;
        let fingerprint = fingerprint_request("POST", &path, &serde_json::to_vec(&draft)?);

        let mut created = false;
        let result = if key.starts_with(COUNT_KEY_PREFIX) {
            Err(LedgerError::Validation(format!(
                "idempotency key may not start with {COUNT_KEY_PREFIX:?}"
            ))
            .into())
        } else {
            self.gated(&key, &fingerprint, || {
                let appended = self.writer.append_detailed(draft)?;
                created = appended.created;
                let id = appended.entry.id;
                Ok((appended.entry, Some(id)))
            })
        };

        match &result {
            Ok((entry, replayed)) => {
                let action = if *replayed || !created {
                    AuditAction::EntryReplayed
                } else {
                    AuditAction::EntryRecorded
                };
                self.audit.emit(
                    &self
                        .audit
                        .event(action, &actor)
                        .venue(venue)
                        .new_value(entry_snapshot(entry)),
                );
            }
            Err(err) => self.audit.emit(
                &self
                    .audit
                    .event(AuditAction::EntryRecorded, &actor)
                    .venue(venue)
                    .new_value(json!({ "idempotency_key": key }))
                    .failed(err.to_string()),
            ),
        }

        let (entry, replayed) = result?;
        Ok(RecordOutcome {
            entry,
            replayed: replayed || !created,
        })
    }

    /// Evaluate a closing drawer count exactly once per `count_key`.
    pub fn count_drawer(&self, request: CountRequest, actor: &Actor) -> SdkResult<CountOutcome> {
        let key = request.gate_key();
        let venue = request.venue_id;
        let fingerprint =
            fingerprint_request("POST", &request.path(), &serde_json::to_vec(&request)?);

        let result = self.gated(&key, &fingerprint, || {
            let count = self.drawer_count(request)?;
            let alert = self.detector.evaluate_and_record(&count)?;
            let entry_id = alert.ledger_entry_id;
            Ok((alert, entry_id))
        });

        let event = self.audit.event(AuditAction::DrawerCounted, actor).venue(venue);
        match &result {
            Ok((alert, replayed)) => self.audit.emit(&event.new_value(json!({
                "alert_id": alert.id,
                "seq": alert.seq,
                "severity": alert.severity,
                "expected_cents": alert.expected_cents,
                "actual_cents": alert.actual_cents,
                "variance_cents": alert.variance_cents,
                "replayed": replayed,
            }))),
            Err(err) => self.audit.emit(&event.failed(err.to_string())),
        }

        let (alert, replayed) = result?;
        Ok(CountOutcome { alert, replayed })
    }

    /// Attach a manager's resolution to an alert.
    pub fn resolve_alert(
        &self,
        alert_id: AlertId,
        actor: &Actor,
        notes: impl Into<String>,
    ) -> SdkResult<CashVarianceAlert> {
        let mut template = self
            .audit
            .event(AuditAction::AlertResolved, actor)
            .old(json!({ "alert_id": alert_id, "resolution": null }));
        if let Some(alert) = self.detector.get(alert_id)? {
            template = template.venue(alert.venue_id);
        }
        let notes = notes.into();
        Ok(self.audit.audited(
            template,
            || self.detector.resolve(alert_id, actor, notes),
            |alert| Some(json!({ "alert_id": alert.id, "resolution": alert.resolution })),
        )?)
    }

    /// Recompute the venue chain. A break halts appends for the venue
    /// until [`acknowledge_incident`](Self::acknowledge_incident).
    pub fn verify(&self, venue: VenueId) -> SdkResult<VerificationReport> {
        let report = ChainVerifier::verify_venue(&*self.store, venue)?;
        let event = self.audit.event(AuditAction::ChainVerified, &Actor::system()).venue(venue);

        let Some(first) = report.first_broken() else {
            self.audit.emit(&event.new_value(json!({ "checked": report.checked, "valid": true })));
            return Ok(report);
        };

        let reason = format!(
            "{} ({} of {} entries fail verification)",
            first.description,
            report.violations.len(),
            report.checked
        );
        error!(
            venue = %venue,
            entry = %first.entry_id,
            entry_number = first.entry_number,
            violations = report.violations.len(),
            "ledger chain integrity violation"
        );
        self.writer.halt(venue, reason.clone())?;
        self.audit.emit(
            &event
                .new_value(json!({ "checked": report.checked, "valid": false, "halted": true }))
                .failed(reason.clone()),
        );
        Err(LedgerError::IntegrityViolation { venue, reason }.into())
    }

    /// Lift an integrity halt. Nothing is repaired; the broken entries stay
    /// as they are. Returns `false` if the venue was not halted.
    pub fn acknowledge_incident(&self, venue: VenueId, actor: &Actor) -> SdkResult<bool> {
        let event = self
            .audit
            .event(AuditAction::IncidentAcknowledged, actor)
            .venue(venue);
        if !actor.is_manager() {
            self.audit.emit(&event.failed("manager role required"));
            return Err(SdkError::NotAuthorized(actor.to_string()));
        }

        let reason = self.writer.halted_reason(venue)?;
        let lifted = self.writer.resume(venue)?;
        if lifted {
            warn!(venue = %venue, by = %actor, "integrity incident acknowledged, appends resumed");
        }
        self.audit.emit(
            &event
                .old(json!({ "halted": reason }))
                .new_value(json!({ "halted": null })),
        );
        Ok(lifted)
    }

    /// Purge expired idempotency records.
    pub fn sweep_idempotency(&self, actor: &Actor) -> SdkResult<usize> {
        let swept = self.gate.sweep();
        self.audit.record(
            AuditAction::IdempotencySwept,
            actor,
            None,
            swept.as_ref().ok().map(|purged| json!({ "purged": purged })),
            swept.as_ref().map(|_| ()).map_err(ToString::to_string),
        );
        Ok(swept?)
    }

    // ---- Reads ----

    pub fn entries(&self, query: &EntryQuery) -> SdkResult<Vec<LedgerEntry>> {
        Ok(self.reader.entries(query)?)
    }

    pub fn entry(&self, id: EntryId) -> SdkResult<Option<LedgerEntry>> {
        Ok(self.reader.entry(id)?)
    }

    pub fn entry_by_key(&self, key: &str) -> SdkResult<Option<LedgerEntry>> {
        Ok(self.reader.by_key(key)?)
    }

    pub fn tail(&self, venue: VenueId) -> SdkResult<Option<ChainTail>> {
        Ok(self.reader.tail(venue)?)
    }

    pub fn venues(&self) -> SdkResult<Vec<VenueId>> {
        Ok(self.reader.venues()?)
    }

    pub fn shift_totals(
        &self,
        venue: VenueId,
        business_date: NaiveDate,
        shift: Option<ShiftId>,
        currency: Currency,
    ) -> SdkResult<CashTotals> {
        Ok(self.reader.shift_totals(venue, business_date, shift, currency)?)
    }

    /// Read-only chain check. Unlike [`verify`](Self::verify) it never halts.
    pub fn inspect_chain(&self, venue: VenueId) -> SdkResult<VerificationReport> {
        Ok(ChainVerifier::verify_venue(&*self.store, venue)?)
    }

    pub fn halted_reason(&self, venue: VenueId) -> SdkResult<Option<String>> {
        Ok(self.writer.halted_reason(venue)?)
    }

    /// Alerts after `after_seq`, oldest first.
    pub fn alert_feed(
        &self,
        after_seq: u64,
        limit: usize,
        min_severity: Option<Severity>,
    ) -> SdkResult<Vec<CashVarianceAlert>> {
        Ok(self.detector.feed(after_seq, limit, min_severity)?)
    }

    pub fn alerts(
        &self,
        venue: VenueId,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> SdkResult<Vec<CashVarianceAlert>> {
        Ok(self.detector.list(venue, from, to)?)
    }

    pub fn alert(&self, id: AlertId) -> SdkResult<Option<CashVarianceAlert>> {
        Ok(self.detector.get(id)?)
    }

    // ---- Internals ----

    /// Run `op` at most once per key. Returns the value and whether it was
    /// replayed from the cache.
    fn gated<T, F>(&self, key: &str, fingerprint: &RequestFingerprint, op: F) -> SdkResult<(T, bool)>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> SdkResult<(T, Option<EntryId>)>,
    {
        let response = match self.admit(key, fingerprint)? {
            Admission::Replay(response) => response,
            Admission::Proceed => {
                let (value, entry_id) = match op() {
                    Ok(done) => done,
                    Err(err) => {
                        self.release(key, fingerprint);
                        return Err(err);
                    }
                };
                let body = match serde_json::to_vec(&value) {
                    Ok(body) => body,
                    Err(err) => {
                        self.release(key, fingerprint);
                        return Err(err.into());
                    }
                };
                let response = CachedResponse {
                    status: CREATED,
                    body,
                };
                if let Err(err) = self.gate.complete(key, fingerprint, response, entry_id) {
                    warn!(key, error = %err, "response not cached, releasing key");
                    self.release(key, fingerprint);
                }
                return Ok((value, false));
            }
        };
        Ok((serde_json::from_slice(&response.body)?, true))
    }

    /// `begin` on the gate, waiting out a concurrent attempt of the same
    /// request for up to `in_flight.max_wait_ms`.
    fn admit(&self, key: &str, fingerprint: &RequestFingerprint) -> SdkResult<Admission> {
        let started = Instant::now();
        let mut attempt = 0u32;
        loop {
            match self.gate.begin(key, fingerprint)? {
                GateOutcome::Proceed => return Ok(Admission::Proceed),
                GateOutcome::Replay { response, .. } => return Ok(Admission::Replay(response)),
                GateOutcome::Conflict => {
                    if started.elapsed() >= self.config.in_flight.max_wait() {
                        return Err(SdkError::InFlight {
                            key: key.to_string(),
                        });
                    }
                    attempt = attempt.saturating_add(1);
                    debug!(key, attempt, "waiting for in-flight request");
                    std::thread::sleep(self.config.in_flight.delay(attempt));
                }
            }
        }
    }

    fn release(&self, key: &str, fingerprint: &RequestFingerprint) {
        if let Err(err) = self.gate.fail(key, fingerprint) {
            warn!(key, error = %err, "could not release idempotency key");
        }
    }

    fn drawer_count(&self, request: CountRequest) -> SdkResult<DrawerCount> {
        let business_date = request
            .business_date
            .unwrap_or_else(|| self.config.ledger.business_day.business_date(self.clock.now()));
        let totals = self.reader.shift_totals(
            request.venue_id,
            business_date,
            request.shift_id,
            request.currency,
        )?;
        Ok(DrawerCount {
            count_key: request.count_key,
            venue_id: request.venue_id,
            business_date: Some(business_date),
            shift_id: request.shift_id,
            drawer_id: request.drawer_id,
            staff_id: request.staff_id,
            currency: request.currency,
            expected_cents: request.expected_cents.unwrap_or(totals.expected_cash_cents),
            actual_cents: request.actual_cents,
            transaction_count: totals.transaction_count,
            cash_transaction_count: totals.cash_transaction_count,
        })
    }
}

impl<S> std::fmt::Debug for PaymentLedger<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentLedger")
            .field("config", &self.config)
            .field("audit", &self.audit)
            .finish_non_exhaustive()
    }
}

fn default_audit(clock: Arc<dyn Clock>, config: &AuditConfig) -> AuditLogger {
    let logger = AuditLogger::new(clock);
    if config.tracing {
        logger.with_sink(Arc::new(TracingAuditSink))
    } else {
        logger
    }
}

fn entry_snapshot(entry: &LedgerEntry) -> Value {
    json!({
        "entry_id": entry.id,
        "entry_number": entry.entry_number,
        "entry_type": entry.entry_type,
        "amount_cents": entry.amount_cents,
        "currency": entry.currency,
        "idempotency_key": entry.idempotency_key,
        "hash": entry.short_hash(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use tally_audit::InMemoryAuditSink;
    use tally_gate::GateError;
    use tally_ledger::EntryDraft;
    use tally_types::{EntryType, ManualClock, PaymentMethod, StaffId};

    struct Harness {
        ledger: PaymentLedger<InMemoryStore>,
        store: Arc<InMemoryStore>,
        clock: Arc<ManualClock>,
        audit: Arc<InMemoryAuditSink>,
    }

    fn harness() -> Harness {
        let store = Arc::new(InMemoryStore::new());
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 1, 20, 0, 0).unwrap()));
        let audit = Arc::new(InMemoryAuditSink::new());
        let ledger = PaymentLedger::new(
            store.clone(),
            clock.clone(),
            TallyConfig::default(),
            AuditLogger::new(clock.clone()).with_sink(audit.clone()),
        );
        Harness {
            ledger,
            store,
            clock,
            audit,
        }
    }

    fn payment(key: &str, amount: i64) -> RecordRequest {
        RecordRequest::new(
            EntryDraft::new(VenueId(1), key, EntryType::PaymentReceived, amount, Currency::BGN)
                .method(PaymentMethod::Cash)
                .shift(ShiftId(3)),
            Actor::staff(StaffId(9)).on_terminal("till-1"),
        )
    }

    #[test]
    fn retry_replays_the_cached_entry() {
        let h = harness();
        let first = h.ledger.record(payment("abc", 2550)).unwrap();
        let second = h.ledger.record(payment("abc", 2550)).unwrap();

        assert!(!first.replayed);
        assert!(second.replayed);
        assert_eq!(first.entry, second.entry);
        assert_eq!(h.store.entry_count(VenueId(1)).unwrap(), 1);

        let cached = h.ledger.gate.peek("abc").unwrap().unwrap();
        assert_eq!(cached.response.unwrap().body, serde_json::to_vec(&first.entry).unwrap());
        assert_eq!(cached.ledger_entry_id, Some(first.entry.id));

        let actions: Vec<AuditAction> = h.audit.events().iter().map(|e| e.action).collect();
        assert_eq!(actions, vec![AuditAction::EntryRecorded, AuditAction::EntryReplayed]);
    }

    #[test]
    fn concurrent_duplicates_record_one_entry() {
        let h = harness();
        let outcomes: Vec<RecordOutcome> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..2)
                .map(|_| s.spawn(|| h.ledger.record(payment("abc", 2550)).unwrap()))
                .collect();
            handles.into_iter().map(|t| t.join().unwrap()).collect()
        });

        assert_eq!(h.store.entry_count(VenueId(1)).unwrap(), 1);
        assert_eq!(outcomes[0].entry, outcomes[1].entry);
        assert_eq!(outcomes.iter().filter(|o| !o.replayed).count(), 1);
        assert_eq!(outcomes[0].entry.amount_cents, 2550);
        assert_eq!(outcomes[0].entry.currency, Currency::BGN);
    }

    #[test]
    fn key_reuse_is_refused_and_ledger_unchanged() {
        let h = harness();
        let first = h.ledger.record(payment("abc", 2550)).unwrap();

        let err = h.ledger.record(payment("abc", 9999)).unwrap_err();
        assert!(matches!(err, SdkError::Gate(GateError::KeyReuse { .. })));
        assert_eq!(h.store.entry_count(VenueId(1)).unwrap(), 1);
        assert_eq!(h.ledger.tail(VenueId(1)).unwrap().unwrap(), first.entry.tail());

        let last = h.audit.events().pop().unwrap();
        assert!(!last.success);
        assert!(last.error_message.unwrap().contains("key-reuse"));
    }

    #[test]
    fn failed_append_releases_the_key() {
        let h = harness();
        let err = h.ledger.record(payment("bad", 0)).unwrap_err();
        assert!(matches!(err, SdkError::Ledger(LedgerError::Validation(_))));
        assert!(h.ledger.gate.peek("bad").unwrap().is_none());

        // The caller fixes the request and retries with the same key.
        let fixed = h.ledger.record(payment("bad", 100)).unwrap();
        assert!(!fixed.replayed);
    }

    #[test]
    fn entry_keys_cannot_shadow_drawer_counts() {
        let h = harness();
        let count = CountRequest::new("c1", VenueId(1), Currency::BGN, 5_000).expected(5_000);
        h.ledger.count_drawer(count, &Actor::system()).unwrap();

        let err = h.ledger.record(payment("drawer-count:c1", 100)).unwrap_err();
        assert!(matches!(err, SdkError::Ledger(LedgerError::Validation(_))));
        assert_eq!(h.store.entry_count(VenueId(1)).unwrap(), 0);
        assert!(h.ledger.gate.peek("drawer-count:c1").unwrap().is_some());
        assert!(!h.audit.events().pop().unwrap().success);
    }

    #[test]
    fn expired_key_falls_back_to_the_ledger_key_index() {
        let h = harness();
        let first = h.ledger.record(payment("abc", 2550)).unwrap();
        h.clock.advance(Duration::hours(25));
        assert!(h.ledger.gate.peek("abc").unwrap().is_none());

        let again = h.ledger.record(payment("abc", 2550)).unwrap();
        assert!(again.replayed);
        assert_eq!(again.entry.id, first.entry.id);

        h.clock.advance(Duration::hours(25));
        let err = h.ledger.record(payment("abc", 100)).unwrap_err();
        assert!(matches!(
            err,
            SdkError::Ledger(LedgerError::DuplicateKeyMismatch { .. })
        ));
        assert_eq!(h.store.entry_count(VenueId(1)).unwrap(), 1);
    }

    #[test]
    fn sweep_purges_expired_records() {
        let h = harness();
        h.ledger.record(payment("a", 100)).unwrap();
        h.ledger.record(payment("b", 200)).unwrap();
        h.clock.advance(Duration::hours(25));

        assert_eq!(h.ledger.sweep_idempotency(&Actor::system()).unwrap(), 2);
        assert_eq!(h.store.record_count().unwrap(), 0);
        let last = h.audit.events().pop().unwrap();
        assert_eq!(last.action, AuditAction::IdempotencySwept);
        assert_eq!(last.new_value, Some(json!({ "purged": 2 })));
        assert!(last.success);
        assert_eq!(last.actor, Actor::system());
    }

    #[test]
    fn drawer_count_uses_ledger_cash_and_books_variance_once() {
        let h = harness();
        h.ledger.record(payment("p1", 6_000)).unwrap();
        h.ledger.record(payment("p2", 4_000)).unwrap();

        let count = CountRequest::new("close-1", VenueId(1), Currency::BGN, 9_400).shift(ShiftId(3));
        let first = h.ledger.count_drawer(count.clone(), &Actor::staff(StaffId(9))).unwrap();
        assert!(!first.replayed);
        assert_eq!(first.alert.expected_cents, 10_000);
        assert_eq!(first.alert.variance_cents, -600);
        assert_eq!(first.alert.severity, Severity::High);
        assert_eq!(first.alert.cash_transaction_count, 2);

        let booked = h.ledger.entry(first.alert.ledger_entry_id.unwrap()).unwrap().unwrap();
        assert_eq!(booked.entry_type, EntryType::CashVariance);
        assert_eq!(booked.amount_cents, -600);

        let retry = h.ledger.count_drawer(count, &Actor::staff(StaffId(9))).unwrap();
        assert!(retry.replayed);
        assert_eq!(retry.alert, first.alert);
        assert_eq!(h.ledger.alert_feed(0, 10, None).unwrap().len(), 1);
        assert_eq!(h.store.entry_count(VenueId(1)).unwrap(), 3);
    }

    #[test]
    fn resolving_an_alert_is_audited() {
        let h = harness();
        let count = CountRequest::new("close-1", VenueId(1), Currency::BGN, 0).expected(10_000);
        let alert = h.ledger.count_drawer(count, &Actor::system()).unwrap().alert;
        assert_eq!(alert.severity, Severity::Critical);

        let err = h
            .ledger
            .resolve_alert(alert.id, &Actor::staff(StaffId(9)), "found it")
            .unwrap_err();
        assert!(matches!(err, SdkError::Variance(_)));

        let resolved = h
            .ledger
            .resolve_alert(alert.id, &Actor::manager(StaffId(2)), "safe drop not logged")
            .unwrap();
        assert!(resolved.is_resolved());

        let events: Vec<_> = h
            .audit
            .events()
            .into_iter()
            .filter(|e| e.action == AuditAction::AlertResolved)
            .collect();
        assert_eq!(events.len(), 2);
        assert!(!events[0].success);
        assert!(events[1].success);
        assert_eq!(events[1].venue_id, Some(VenueId(1)));
    }

    #[test]
    fn broken_chain_halts_until_acknowledged() {
        let h = harness();
        for i in 0..3 {
            h.ledger.record(payment(&format!("p{i}"), 1_000 + i)).unwrap();
        }
        assert!(h.ledger.verify(VenueId(1)).unwrap().is_valid());

        let mut tampered = h.ledger.entry_by_key("p1").unwrap().unwrap();
        tampered.amount_cents = 1;
        assert!(h.store.overwrite_unchecked(tampered).unwrap());

        let err = h.ledger.verify(VenueId(1)).unwrap_err();
        assert!(matches!(
            err,
            SdkError::Ledger(LedgerError::IntegrityViolation { .. })
        ));
        assert!(h.ledger.halted_reason(VenueId(1)).unwrap().is_some());

        let refused = h.ledger.record(payment("p9", 500)).unwrap_err();
        assert!(matches!(
            refused,
            SdkError::Ledger(LedgerError::IntegrityViolation { .. })
        ));
        assert!(h.ledger.gate.peek("p9").unwrap().is_none());

        let err = h
            .ledger
            .acknowledge_incident(VenueId(1), &Actor::staff(StaffId(9)))
            .unwrap_err();
        assert!(matches!(err, SdkError::NotAuthorized(_)));
        assert!(h
            .ledger
            .acknowledge_incident(VenueId(1), &Actor::manager(StaffId(2)))
            .unwrap());

        assert!(!h.ledger.record(payment("p9", 500)).unwrap().replayed);
        // Acknowledging repairs nothing.
        assert!(!h.ledger.inspect_chain(VenueId(1)).unwrap().is_valid());
    }

    #[test]
    fn journal_ledger_replays_after_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tally.journal");
        let config = TallyConfig {
            audit: AuditConfig { tracing: false },
            ..TallyConfig::default()
        };

        let first = {
            let ledger = PaymentLedger::open(&path, config.clone()).unwrap();
            ledger.record(payment("abc", 2550)).unwrap()
        };

        let ledger = PaymentLedger::open(&path, config).unwrap();
        let again = ledger.record(payment("abc", 2550)).unwrap();
        assert!(again.replayed);
        assert_eq!(again.entry, first.entry);
        assert!(ledger.verify(VenueId(1)).unwrap().is_valid());
    }
}
