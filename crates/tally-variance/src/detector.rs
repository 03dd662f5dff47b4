use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tally_ledger::{EntryDraft, LedgerWriter};
use tally_store::{AlertQuery, AlertStore, LedgerStore, StoreError};
use tally_types::{
    Actor, AlertId, CashVarianceAlert, Clock, Currency, DrawerId, EntryId, EntryType,
    PaymentMethod, Resolution, Severity, ShiftId, StaffId, VenueId,
};
use tracing::{info, warn};

use crate::classify::{classify, Classification};
use crate::config::VarianceConfig;
use crate::error::{VarianceError, VarianceResult};

/// A physical drawer count to compare against the expected amount.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawerCount {
    /// Caller-chosen key identifying this count. Retries reuse it.
    pub count_key: String,
    pub venue_id: VenueId,
    /// Defaults to the business date of the evaluation time.
    #[serde(default)]
    pub business_date: Option<NaiveDate>,
    #[serde(default)]
    pub shift_id: Option<ShiftId>,
    #[serde(default)]
    pub drawer_id: Option<DrawerId>,
    #[serde(default)]
    pub staff_id: Option<StaffId>,
    pub currency: Currency,
    pub expected_cents: i64,
    pub actual_cents: i64,
    #[serde(default)]
    pub transaction_count: u32,
    #[serde(default)]
    pub cash_transaction_count: u32,
}

impl DrawerCount {
    /// Idempotency key of the `cash_variance` entry booked for this count.
    pub fn ledger_key(&self) -> String {
        format!("cash-variance:{}", self.count_key)
    }
}

/// Compares expected with counted cash, classifies the difference, and
/// keeps the resulting alerts.
pub struct CashVarianceDetector<S> {
    writer: Arc<LedgerWriter<S>>,
    clock: Arc<dyn Clock>,
    config: VarianceConfig,
}

impl<S: LedgerStore + AlertStore> CashVarianceDetector<S> {
    pub fn new(writer: Arc<LedgerWriter<S>>, clock: Arc<dyn Clock>, config: VarianceConfig) -> Self {
        Self {
            writer,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &VarianceConfig {
        &self.config
    }

    /// Classification only; nothing is stored.
    pub fn classify_count(&self, count: &DrawerCount) -> Classification {
        classify(
            count.expected_cents,
            count.actual_cents,
            count.currency,
            self.config.thresholds_for(count.venue_id),
        )
    }

    /// Classify a count and persist the alert.
    pub fn evaluate(&self, count: &DrawerCount) -> VarianceResult<CashVarianceAlert> {
        validate(count)?;
        let classification = self.classify_count(count);
        self.persist(count, classification, None)
    }

    /// Like [`evaluate`](Self::evaluate), and also book a non-zero variance
    /// as a `cash_variance` ledger entry linked from the alert.
    ///
    /// The entry's key is derived from `count_key`, so a retried count never
    /// books the variance twice.
    pub fn evaluate_and_record(&self, count: &DrawerCount) -> VarianceResult<CashVarianceAlert> {
        validate(count)?;
        let classification = self.classify_count(count);

        let entry_id = if classification.variance_cents != 0 && self.config.record_ledger_entry {
            Some(self.book_variance(count, &classification)?)
        } else {
            None
        };
        self.persist(count, classification, entry_id)
    }

    /// Attach a manager's resolution. Only the resolution fields change.
    pub fn resolve(
        &self,
        alert_id: AlertId,
        actor: &Actor,
        notes: impl Into<String>,
    ) -> VarianceResult<CashVarianceAlert> {
        let resolved_by = match (actor.is_manager(), actor.staff_id) {
            (true, Some(staff_id)) => staff_id,
            _ => return Err(VarianceError::NotAuthorized(actor.to_string())),
        };

        let resolution = Resolution {
            resolved_by,
            resolved_at: self.clock.now(),
            notes: notes.into(),
        };
        let resolved = self
            .writer
            .store()
            .resolve_alert(alert_id, resolution)
            .map_err(|e| match e {
                StoreError::NotFound(_) => VarianceError::AlertNotFound(alert_id),
                StoreError::InvalidState(_) => VarianceError::AlreadyResolved(alert_id),
                other => VarianceError::Store(other),
            })?;
        info!(alert = %alert_id, by = %resolved_by, "variance alert resolved");
        Ok(resolved)
    }

    pub fn get(&self, alert_id: AlertId) -> VarianceResult<Option<CashVarianceAlert>> {
        Ok(self.writer.store().get_alert(alert_id)?)
    }

    /// Alerts after `after_seq` in feed order, optionally only those at or
    /// above `min_severity`. Pollers pass the last `seq` they saw.
    pub fn feed(
        &self,
        after_seq: u64,
        limit: usize,
        min_severity: Option<Severity>,
    ) -> VarianceResult<Vec<CashVarianceAlert>> {
        let store = self.writer.store();
        let Some(min) = min_severity else {
            return Ok(store.alerts_after(after_seq, limit)?);
        };
        Ok(store
            .alerts_after(after_seq, usize::MAX)?
            .into_iter()
            .filter(|a| a.severity >= min)
            .take(limit)
            .collect())
    }

    /// Alerts for a venue between two business dates, inclusive.
    pub fn list(
        &self,
        venue: VenueId,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> VarianceResult<Vec<CashVarianceAlert>> {
        Ok(self.writer.store().query_alerts(&AlertQuery {
            venue_id: Some(venue),
            from_date: from,
            to_date: to,
            ..Default::default()
        })?)
    }

    fn book_variance(
        &self,
        count: &DrawerCount,
        classification: &Classification,
    ) -> VarianceResult<EntryId> {
        let mut draft = EntryDraft::new(
            count.venue_id,
            count.ledger_key(),
            EntryType::CashVariance,
            classification.variance_cents,
            count.currency,
        )
        .method(PaymentMethod::Cash)
        .description(classification.reason.clone())
        .reference(count.count_key.clone())
        .context(json!({
            "drawer_id": count.drawer_id,
            "expected_cents": count.expected_cents,
            "actual_cents": count.actual_cents,
        }));
        draft.shift_id = count.shift_id;
        draft.staff_id = count.staff_id;

        Ok(self.writer.append(draft)?.id)
    }

    fn persist(
        &self,
        count: &DrawerCount,
        classification: Classification,
        ledger_entry_id: Option<EntryId>,
    ) -> VarianceResult<CashVarianceAlert> {
        let now = self.clock.now();
        let alert = CashVarianceAlert {
            id: AlertId::new(),
            seq: 0,
            venue_id: count.venue_id,
            business_date: count
                .business_date
                .unwrap_or_else(|| self.writer.config().business_day.business_date(now)),
            shift_id: count.shift_id,
            drawer_id: count.drawer_id.clone(),
            currency: count.currency,
            expected_cents: count.expected_cents,
            actual_cents: count.actual_cents,
            variance_cents: classification.variance_cents,
            variance_bps: classification.variance_bps,
            severity: classification.severity,
            reason: classification.reason,
            staff_id: count.staff_id,
            transaction_count: count.transaction_count,
            cash_transaction_count: count.cash_transaction_count,
            ledger_entry_id,
            created_at: now,
            resolution: None,
        };

        let stored = self.writer.store().insert_alert(alert)?;
        if stored.severity.needs_attention() {
            warn!(
                venue = %stored.venue_id,
                seq = stored.seq,
                severity = %stored.severity,
                variance_cents = stored.variance_cents,
                reason = %stored.reason,
                "cash variance alert"
            );
        } else {
            info!(
                venue = %stored.venue_id,
                seq = stored.seq,
                severity = %stored.severity,
                variance_cents = stored.variance_cents,
                "cash variance recorded"
            );
        }
        Ok(stored)
    }
}

fn validate(count: &DrawerCount) -> VarianceResult<()> {
    if count.count_key.trim().is_empty() {
        return Err(VarianceError::Validation("count key is blank".into()));
    }
    if count.actual_cents < 0 {
        return Err(VarianceError::Validation(format!(
            "counted cash cannot be negative, got {}",
            count.actual_cents
        )));
    }
    if count.expected_cents < 0 {
        return Err(VarianceError::Validation(format!(
            "expected cash cannot be negative, got {}",
            count.expected_cents
        )));
    }
    Ok(())
}
