use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use tally_store::{EntryQuery, LedgerStore};
use tally_types::{ChainTail, Currency, EntryId, EntryType, LedgerEntry, ShiftId, VenueId};

use crate::error::LedgerResult;

/// Cash movement and transaction counts over a set of entries.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CashTotals {
    /// Sales-side entries: payments, refunds, voids, and tips.
    pub transaction_count: u32,
    /// Sales-side entries settled in cash.
    pub cash_transaction_count: u32,
    /// Net cash that should be in the drawer from these entries.
    pub expected_cash_cents: i64,
    /// Sum of `amount_cents` per entry type.
    pub net_by_type: BTreeMap<EntryType, i64>,
}

/// Effect of one entry on the cash drawer, in minor units.
pub fn cash_effect(entry: &LedgerEntry) -> i64 {
    let cash = entry.payment_method.as_ref().is_some_and(|m| m.is_cash());
    let amount = entry.amount_cents;
    match entry.entry_type {
        EntryType::PaymentReceived | EntryType::TipReceived | EntryType::Adjustment if cash => amount,
        EntryType::PaymentRefunded | EntryType::PaymentVoided if cash => -amount,
        EntryType::CashIn | EntryType::CashVariance => amount,
        EntryType::CashOut | EntryType::CashDrop => -amount,
        _ => 0,
    }
}

fn is_sales_side(ty: EntryType) -> bool {
    matches!(
        ty,
        EntryType::PaymentReceived
            | EntryType::PaymentRefunded
            | EntryType::PaymentVoided
            | EntryType::TipReceived
            | EntryType::TipAdjusted
    )
}

/// Totals for the entries in `currency`; other currencies are skipped.
pub fn cash_totals<'a>(
    entries: impl IntoIterator<Item = &'a LedgerEntry>,
    currency: Currency,
) -> CashTotals {
    let mut totals = CashTotals::default();
    for entry in entries.into_iter().filter(|e| e.currency == currency) {
        *totals.net_by_type.entry(entry.entry_type).or_default() += entry.amount_cents;
        totals.expected_cash_cents += cash_effect(entry);
        if is_sales_side(entry.entry_type) {
            totals.transaction_count += 1;
            if entry.payment_method.as_ref().is_some_and(|m| m.is_cash()) {
                totals.cash_transaction_count += 1;
            }
        }
    }
    totals
}

/// Read-side access to the ledger.
pub struct LedgerReader<S> {
    store: Arc<S>,
}

impl<S: LedgerStore> LedgerReader<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn entries(&self, query: &EntryQuery) -> LedgerResult<Vec<LedgerEntry>> {
        Ok(self.store.query(query)?)
    }

    pub fn entry(&self, id: EntryId) -> LedgerResult<Option<LedgerEntry>> {
        Ok(self.store.get(id)?)
    }

    pub fn by_key(&self, key: &str) -> LedgerResult<Option<LedgerEntry>> {
        Ok(self.store.get_by_key(key)?)
    }

    pub fn tail(&self, venue: VenueId) -> LedgerResult<Option<ChainTail>> {
        Ok(self.store.tail(venue)?)
    }

    pub fn venues(&self) -> LedgerResult<Vec<VenueId>> {
        Ok(self.store.venues()?)
    }

    /// Cash totals for one business date, optionally narrowed to a shift.
    pub fn shift_totals(
        &self,
        venue: VenueId,
        business_date: NaiveDate,
        shift: Option<ShiftId>,
        currency: Currency,
    ) -> LedgerResult<CashTotals> {
        let entries = self
            .store
            .query(&EntryQuery::venue(venue).between(business_date, business_date))?;
        Ok(cash_totals(
            entries
                .iter()
                .filter(|e| shift.is_none() || e.shift_id == shift),
            currency,
        ))
    }
}
