use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tally_types::{CashVarianceAlert, EntryType, LedgerEntry, Severity, VenueId};

/// Filter for listing ledger entries of one venue.
///
/// Results are always in `entry_number` order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryQuery {
    pub venue_id: VenueId,
    /// Inclusive lower bound on the business date.
    pub from_date: Option<NaiveDate>,
    /// Inclusive upper bound on the business date.
    pub to_date: Option<NaiveDate>,
    /// Empty means every type.
    pub entry_types: Vec<EntryType>,
    /// Only entries with a number greater than this (cursor paging).
    pub after_number: Option<u64>,
    pub limit: Option<usize>,
}

impl EntryQuery {
    pub fn venue(venue_id: VenueId) -> Self {
        Self {
            venue_id,
            from_date: None,
            to_date: None,
            entry_types: Vec::new(),
            after_number: None,
            limit: None,
        }
    }

    pub fn between(mut self, from: NaiveDate, to: NaiveDate) -> Self {
        self.from_date = Some(from);
        self.to_date = Some(to);
        self
    }

    pub fn of_types(mut self, types: impl IntoIterator<Item = EntryType>) -> Self {
        self.entry_types = types.into_iter().collect();
        self
    }

    pub fn after(mut self, entry_number: u64) -> Self {
        self.after_number = Some(entry_number);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether `entry` passes every filter except `limit`.
    pub fn matches(&self, entry: &LedgerEntry) -> bool {
        entry.venue_id == self.venue_id
            && self.from_date.map_or(true, |d| entry.business_date >= d)
            && self.to_date.map_or(true, |d| entry.business_date <= d)
            && (self.entry_types.is_empty() || self.entry_types.contains(&entry.entry_type))
            && self.after_number.map_or(true, |n| entry.entry_number > n)
    }
}

/// Filter for listing variance alerts. Results are in feed (`seq`) order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertQuery {
    pub venue_id: Option<VenueId>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    pub min_severity: Option<Severity>,
    pub unresolved_only: bool,
    pub limit: Option<usize>,
}

impl AlertQuery {
    pub fn matches(&self, alert: &CashVarianceAlert) -> bool {
        self.venue_id.map_or(true, |v| alert.venue_id == v)
            && self.from_date.map_or(true, |d| alert.business_date >= d)
            && self.to_date.map_or(true, |d| alert.business_date <= d)
            && self.min_severity.map_or(true, |s| alert.severity >= s)
            && (!self.unresolved_only || !alert.is_resolved())
    }
}
