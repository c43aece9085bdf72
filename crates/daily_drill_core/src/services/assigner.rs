//! crates/daily_drill_core/src/services/assigner.rs
//!
//! The session assigner: one deterministic set of questions per user per
//! calendar day, created lazily on the first request of the day.

use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Arc;

use chrono::NaiveDate;
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use uuid::Uuid;

use crate::domain::{DailyOverview, DailyQuestion, DailySet, Question, SESSION_SIZE};
use crate::ports::RecordStore;
use crate::services::ServiceError;

/// Produces and retrieves the daily question set for a user.
///
/// Set uniqueness is enforced by the store's atomic get-or-create, never by
/// this service: two concurrent first-requests both propose a candidate set
/// and both observe whichever row the store kept.
pub struct SessionAssigner {
    store: Arc<dyn RecordStore>,
}

impl SessionAssigner {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Returns today's set for the user, creating it if this is the first
    /// request of the day. Fails with `NotFound` for an unknown user and
    /// `InsufficientContent` when fewer than `SESSION_SIZE` active
    /// questions exist.
    pub async fn get_or_create_daily_set(
        &self,
        user_id: Uuid,
        today: NaiveDate,
    ) -> Result<DailySet, ServiceError> {
        self.store.get_user(user_id).await?;

        let active = self.store.list_active_questions().await?;
        if active.len() < SESSION_SIZE {
            return Err(ServiceError::InsufficientContent);
        }

        let candidates = sample_question_ids(user_id, today, &active);
        let set = self
            .store
            .get_or_create_daily_set(user_id, today, &candidates)
            .await?;
        Ok(set)
    }

    /// Assembles the `/today` read model: the daily set plus, per question,
    /// the already-submitted answer and its feedback if present.
    pub async fn daily_overview(
        &self,
        user_id: Uuid,
        today: NaiveDate,
    ) -> Result<DailyOverview, ServiceError> {
        let set = self.get_or_create_daily_set(user_id, today).await?;
        let answers = self.store.list_answers_for_day(user_id, today).await?;

        let mut questions = Vec::with_capacity(set.question_ids.len());
        for question_id in &set.question_ids {
            let question = self.store.get_question(*question_id).await?;
            let answered = answers
                .iter()
                .find(|(answer, _)| answer.question_id == *question_id)
                .cloned();
            let (answer, feedback) = match answered {
                Some((answer, feedback)) => (Some(answer), feedback),
                None => (None, None),
            };
            questions.push(DailyQuestion {
                question,
                answer,
                feedback,
            });
        }

        Ok(DailyOverview { set, questions })
    }
}

/// The set-selection policy: `SESSION_SIZE` distinct active question ids,
/// shuffled with an RNG seeded from `(user_id, date)`. Concurrent callers
/// for the same user and day therefore propose identical candidate sets.
fn sample_question_ids(user_id: Uuid, date: NaiveDate, active: &[Question]) -> Vec<Uuid> {
    let mut ids: Vec<Uuid> = active.iter().map(|q| q.id).collect();
    // Stable base order, independent of store iteration order.
    ids.sort_unstable();
    let mut rng = StdRng::seed_from_u64(set_seed(user_id, date));
    ids.shuffle(&mut rng);
    ids.truncate(SESSION_SIZE);
    ids
}

fn set_seed(user_id: Uuid, date: NaiveDate) -> u64 {
    let mut hasher = DefaultHasher::new();
    user_id.hash(&mut hasher);
    date.hash(&mut hasher);
    hasher.finish()
}
