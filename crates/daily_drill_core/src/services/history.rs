//! crates/daily_drill_core/src/services/history.rs
//!
//! The history aggregator: a read-only projection of a user's answers,
//! grouped by the calendar date they were created on.

use std::sync::Arc;

use uuid::Uuid;

use crate::domain::{HistoryDay, HistoryEntry};
use crate::ports::RecordStore;
use crate::services::ServiceError;
use crate::time::Clock;

/// Joins answers with their question and optional feedback into
/// date-grouped views. Entries without feedback are a normal, frequent
/// state, not an error.
pub struct HistoryAggregator {
    store: Arc<dyn RecordStore>,
    clock: Clock,
}

impl HistoryAggregator {
    pub fn new(store: Arc<dyn RecordStore>, clock: Clock) -> Self {
        Self { store, clock }
    }

    /// Returns the user's full history, one group per distinct date,
    /// groups ordered by date descending, entries within a group in
    /// creation-time descending order.
    pub async fn history(&self, user_id: Uuid) -> Result<Vec<HistoryDay>, ServiceError> {
        self.store.get_user(user_id).await?;
        let entries = self.store.list_answer_history(user_id).await?;
        Ok(group_by_day(entries, &self.clock))
    }
}

/// Groups a creation-time-descending entry stream by local calendar date.
/// Because the input is sorted, dates are non-increasing and a single
/// run-length pass yields descending groups with original order preserved.
fn group_by_day(entries: Vec<HistoryEntry>, clock: &Clock) -> Vec<HistoryDay> {
    let mut days: Vec<HistoryDay> = Vec::new();
    for entry in entries {
        let date = clock.local_date(entry.answer.created_at);
        match days.last_mut() {
            Some(day) if day.date == date => day.entries.push(entry),
            _ => days.push(HistoryDay {
                date,
                entries: vec![entry],
            }),
        }
    }
    days
}
