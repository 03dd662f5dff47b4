use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tally_ledger::EntryDraft;
use tally_types::{
    Actor, CashVarianceAlert, Currency, DrawerId, LedgerEntry, ShiftId, StaffId, VenueId,
};

/// Gate key prefix of drawer counts. Entry keys may not start with it.
pub(crate) const COUNT_KEY_PREFIX: &str = "drawer-count:";

/// A financial event submitted on behalf of an actor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordRequest {
    pub draft: EntryDraft,
    pub actor: Actor,
}

impl RecordRequest {
    pub fn new(draft: EntryDraft, actor: Actor) -> Self {
        Self { draft, actor }
    }

    pub(crate) fn path(&self) -> String {
        format!("/venues/{}/entries", self.draft.venue_id.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordOutcome {
    pub entry: LedgerEntry,
    /// The entry already existed; nothing new was written.
    pub replayed: bool,
}

/// A closing drawer count. Without `expected_cents` the expectation is the
/// ledger's net cash for the business date and shift.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountRequest {
    pub count_key: String,
    pub venue_id: VenueId,
    #[serde(default)]
    pub business_date: Option<NaiveDate>,
    #[serde(default)]
    pub shift_id: Option<ShiftId>,
    #[serde(default)]
    pub drawer_id: Option<DrawerId>,
    #[serde(default)]
    pub staff_id: Option<StaffId>,
    pub currency: Currency,
    #[serde(default)]
    pub expected_cents: Option<i64>,
    pub actual_cents: i64,
}

impl CountRequest {
    pub fn new(
        count_key: impl Into<String>,
        venue_id: VenueId,
        currency: Currency,
        actual_cents: i64,
    ) -> Self {
        Self {
            count_key: count_key.into(),
            venue_id,
            business_date: None,
            shift_id: None,
            drawer_id: None,
            staff_id: None,
            currency,
            expected_cents: None,
            actual_cents,
        }
    }

    pub fn expected(mut self, cents: i64) -> Self {
        self.expected_cents = Some(cents);
        self
    }

    pub fn on(mut self, date: NaiveDate) -> Self {
        self.business_date = Some(date);
        self
    }

    pub fn shift(mut self, shift: ShiftId) -> Self {
        self.shift_id = Some(shift);
        self
    }

    pub fn drawer(mut self, drawer: DrawerId) -> Self {
        self.drawer_id = Some(drawer);
        self
    }

    pub(crate) fn gate_key(&self) -> String {
        format!("{COUNT_KEY_PREFIX}{}", self.count_key)
    }

    pub(crate) fn path(&self) -> String {
        format!("/venues/{}/drawer-counts", self.venue_id.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CountOutcome {
    pub alert: CashVarianceAlert,
    pub replayed: bool,
}
