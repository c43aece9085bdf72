//! crates/daily_drill_core/src/time.rs
//!
//! The service clock. All calendar-day reasoning (daily sets, quota windows,
//! history grouping) happens in one fixed timezone offset so that a "day"
//! means the same thing on every code path.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};

/// A clock pinned to the service timezone.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    offset: FixedOffset,
}

impl Clock {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    /// Builds a clock from a whole-hour UTC offset, e.g. `9` for Tokyo.
    /// Fails for offsets outside ±23 hours.
    pub fn from_utc_offset_hours(hours: i32) -> Option<Self> {
        FixedOffset::east_opt(hours * 3600).map(Self::new)
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// The current calendar date in the service timezone.
    pub fn today(&self) -> NaiveDate {
        self.local_date(Utc::now())
    }

    /// The calendar date a given instant falls on in the service timezone.
    pub fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.offset).date_naive()
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new(FixedOffset::east_opt(0).unwrap())
    }
}
