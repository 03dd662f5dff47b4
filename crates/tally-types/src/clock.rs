use std::sync::Mutex;

use chrono::{DateTime, Duration, NaiveDate, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// Source of wall-clock time.
///
/// Injected everywhere time matters (entry timestamps, idempotency TTLs,
/// alert resolution) so tests can pin it.
pub trait Clock: Send + Sync {
    /// Current instant, truncated to microseconds.
    fn now(&self) -> DateTime<Utc>;
}

/// The system wall clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now().trunc_subsecs(6)
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start.trunc_subsecs(6)),
        }
    }

    /// Move the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now = to.trunc_subsecs(6);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Maps instants onto the operating day they belong to.
///
/// A bar that closes at 03:00 attributes a 01:30 sale to the previous
/// business date. The venue's UTC offset is applied first, then the
/// rollover hour.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusinessDayPolicy {
    /// Local hour (0-23) at which a new business date starts.
    pub rollover_hour: u32,
    /// Venue offset from UTC in minutes.
    pub utc_offset_minutes: i32,
}

impl Default for BusinessDayPolicy {
    fn default() -> Self {
        Self {
            rollover_hour: 4,
            utc_offset_minutes: 0,
        }
    }
}

impl BusinessDayPolicy {
    pub fn business_date(&self, at: DateTime<Utc>) -> NaiveDate {
        let local = at.naive_utc() + Duration::minutes(i64::from(self.utc_offset_minutes));
        (local - Duration::hours(i64::from(self.rollover_hour.min(23)))).date()
    }
}
