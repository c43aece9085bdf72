//! crates/daily_drill_core/src/services/submission.rs
//!
//! The submission controller: admission-checks an answer, persists it, and
//! runs the best-effort feedback pipeline against the scoring oracle.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use tokio::time::timeout;
use tracing::{error, warn};
use uuid::Uuid;

use crate::domain::{Answer, Feedback, DAILY_QUOTA, MAX_CONTENT_CHARS, MAX_ELAPSED_SEC};
use crate::ports::{NewAnswer, RecordStore, ScoringService};
use crate::services::ServiceError;

/// The result of a submission: the persisted answer and, when the oracle
/// call succeeded and validated, the persisted feedback.
#[derive(Debug, Clone)]
pub struct SubmissionOutcome {
    pub answer: Answer,
    pub feedback: Option<Feedback>,
}

/// Orchestrates a single answer submission.
///
/// Within one submission, answer persistence strictly precedes the scoring
/// attempt, and the scoring outcome never affects whether the answer
/// persists.
pub struct SubmissionController {
    store: Arc<dyn RecordStore>,
    scorer: Arc<dyn ScoringService>,
    scorer_timeout: Duration,
}

impl SubmissionController {
    pub fn new(
        store: Arc<dyn RecordStore>,
        scorer: Arc<dyn ScoringService>,
        scorer_timeout: Duration,
    ) -> Self {
        Self {
            store,
            scorer,
            scorer_timeout,
        }
    }

    /// Validates, admits and persists one answer, then attempts feedback.
    ///
    /// Validation and admission failures are terminal and leave no side
    /// effects. An empty `content` is a valid submission (timeout before
    /// typing), not an error.
    pub async fn submit_answer(
        &self,
        user_id: Uuid,
        question_id: Uuid,
        content: &str,
        elapsed_sec: i32,
        today: NaiveDate,
    ) -> Result<SubmissionOutcome, ServiceError> {
        if content.chars().count() > MAX_CONTENT_CHARS {
            return Err(ServiceError::Validation(format!(
                "content exceeds {} characters",
                MAX_CONTENT_CHARS
            )));
        }
        if !(0..=MAX_ELAPSED_SEC).contains(&elapsed_sec) {
            return Err(ServiceError::Validation(format!(
                "elapsed_sec must be between 0 and {}",
                MAX_ELAPSED_SEC
            )));
        }

        // Only questions of today's set may be answered.
        let set = self
            .store
            .get_daily_set(user_id, today)
            .await?
            .ok_or_else(|| {
                ServiceError::Validation("no daily set assigned for today".to_string())
            })?;
        if !set.question_ids.contains(&question_id) {
            return Err(ServiceError::Validation(
                "question is not part of today's set".to_string(),
            ));
        }

        // Quota check and insert are one atomic store operation; a second
        // device racing past the check cannot exceed the quota.
        let answer = self
            .store
            .insert_answer_if_under_quota(
                NewAnswer {
                    user_id,
                    question_id,
                    content: content.to_string(),
                    elapsed_sec,
                },
                today,
                DAILY_QUOTA,
            )
            .await?;

        let feedback = self.generate_feedback(&answer).await;
        Ok(SubmissionOutcome { answer, feedback })
    }

    /// Best-effort feedback generation. Every failure mode (oracle timeout,
    /// transport error, schema-invalid output, persist failure) is logged
    /// and collapses to `None`; none of them fails the submission.
    async fn generate_feedback(&self, answer: &Answer) -> Option<Feedback> {
        let question = match self.store.get_question(answer.question_id).await {
            Ok(question) => question,
            Err(e) => {
                error!(answer_id = %answer.id, error = %e, "failed to load question for scoring");
                return None;
            }
        };

        let scored = timeout(
            self.scorer_timeout,
            self.scorer.score(&question.text, &answer.content),
        )
        .await;
        let card = match scored {
            Err(_) => {
                warn!(answer_id = %answer.id, "scoring oracle timed out");
                return None;
            }
            Ok(Err(e)) => {
                warn!(answer_id = %answer.id, error = %e, "scoring oracle call failed");
                return None;
            }
            Ok(Ok(card)) => card,
        };

        // The gateway already validates; re-check here so a misbehaving
        // adapter can never persist out-of-schema feedback.
        if let Err(reason) = card.validate() {
            warn!(answer_id = %answer.id, %reason, "scoring oracle output failed schema validation");
            return None;
        }

        match self.store.insert_feedback(answer.id, &card).await {
            Ok(feedback) => Some(feedback),
            Err(e) => {
                error!(answer_id = %answer.id, error = %e, "failed to persist feedback");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ScoreCard;
    use crate::services::support::{
        FailingScorer, InvalidScorer, MemoryStore, SlowScorer, StubScorer,
    };
    use crate::services::SessionAssigner;
    use crate::domain::DailySet;

    const SCORER_TIMEOUT: Duration = Duration::from_millis(200);

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn good_card() -> ScoreCard {
        ScoreCard {
            score_clarity: 8,
            score_reasoning: 7,
            score_diversity: 6,
            summary: "結論が明確で根拠も具体的です。".to_string(),
        }
    }

    async fn set_up(store: &Arc<MemoryStore>, today: NaiveDate) -> (Uuid, DailySet) {
        let user_id = store.seed_user("a@example.com");
        for i in 0..6 {
            store.seed_question(&format!("question {i}"), true);
        }
        let assigner = SessionAssigner::new(store.clone());
        let set = assigner.get_or_create_daily_set(user_id, today).await.unwrap();
        (user_id, set)
    }

    fn controller(
        store: Arc<MemoryStore>,
        scorer: Arc<dyn ScoringService>,
    ) -> SubmissionController {
        SubmissionController::new(store, scorer, SCORER_TIMEOUT)
    }

    #[tokio::test]
    async fn valid_submission_persists_answer_and_feedback() {
        let store = MemoryStore::new();
        let today = day(2026, 8, 31);
        let (user_id, set) = set_up(&store, today).await;
        let controller = controller(store.clone(), Arc::new(StubScorer::new(good_card())));

        let outcome = controller
            .submit_answer(user_id, set.question_ids[0], "経済成長が重要です", 30, today)
            .await
            .unwrap();

        assert_eq!(outcome.answer.content, "経済成長が重要です");
        assert_eq!(outcome.answer.elapsed_sec, 30);
        let feedback = outcome.feedback.expect("feedback expected on oracle success");
        assert!((0..=10).contains(&feedback.score_clarity));
        assert!((0..=10).contains(&feedback.score_reasoning));
        assert!((0..=10).contains(&feedback.score_diversity));
        assert!(feedback.summary.chars().count() <= 100);
        assert_eq!(store.answer_count(user_id), 1);
    }

    #[tokio::test]
    async fn empty_content_is_a_valid_timeout_submission() {
        let store = MemoryStore::new();
        let today = day(2026, 8, 31);
        let (user_id, set) = set_up(&store, today).await;
        let controller = controller(store.clone(), Arc::new(StubScorer::new(good_card())));

        let outcome = controller
            .submit_answer(user_id, set.question_ids[0], "", 60, today)
            .await
            .unwrap();
        assert_eq!(outcome.answer.content, "");
    }

    #[tokio::test]
    async fn oversized_content_is_rejected_without_side_effects() {
        let store = MemoryStore::new();
        let today = day(2026, 8, 31);
        let (user_id, set) = set_up(&store, today).await;
        let controller = controller(store.clone(), Arc::new(StubScorer::new(good_card())));

        let content = "あ".repeat(1001);
        let result = controller
            .submit_answer(user_id, set.question_ids[0], &content, 30, today)
            .await;
        assert!(matches!(result, Err(ServiceError::Validation(_))));
        assert_eq!(store.answer_count(user_id), 0);
    }

    #[tokio::test]
    async fn out_of_range_elapsed_sec_is_rejected() {
        let store = MemoryStore::new();
        let today = day(2026, 8, 31);
        let (user_id, set) = set_up(&store, today).await;
        let controller = controller(store.clone(), Arc::new(StubScorer::new(good_card())));

        for elapsed in [-1, 61] {
            let result = controller
                .submit_answer(user_id, set.question_ids[0], "ok", elapsed, today)
                .await;
            assert!(matches!(result, Err(ServiceError::Validation(_))));
        }
        assert_eq!(store.answer_count(user_id), 0);
    }

    #[tokio::test]
    async fn question_outside_todays_set_is_rejected() {
        let store = MemoryStore::new();
        let today = day(2026, 8, 31);
        let (user_id, set) = set_up(&store, today).await;
        let controller = controller(store.clone(), Arc::new(StubScorer::new(good_card())));

        // An active question that is not part of the assigned set.
        let outsider = store.seed_question("outsider", true);
        assert!(!set.question_ids.contains(&outsider.id));

        let result = controller
            .submit_answer(user_id, outsider.id, "ok", 10, today)
            .await;
        assert!(matches!(result, Err(ServiceError::Validation(_))));
        assert_eq!(store.answer_count(user_id), 0);
    }

    #[tokio::test]
    async fn fourth_answer_of_the_day_hits_the_quota() {
        let store = MemoryStore::new();
        let today = day(2026, 8, 31);
        let (user_id, set) = set_up(&store, today).await;
        let controller = controller(store.clone(), Arc::new(StubScorer::new(good_card())));

        for question_id in &set.question_ids {
            controller
                .submit_answer(user_id, *question_id, "ok", 10, today)
                .await
                .unwrap();
        }
        assert_eq!(store.answer_count(user_id), 3);

        // A fourth submission cannot go through, whichever question it names.
        // Simulate a set that somehow grew a fourth member to isolate the
        // quota check from the duplicate check.
        store.push_question_into_set(user_id, today);
        let set = store.get_daily_set(user_id, today).await.unwrap().unwrap();
        let result = controller
            .submit_answer(user_id, set.question_ids[3], "one too many", 10, today)
            .await;
        assert!(matches!(result, Err(ServiceError::QuotaExceeded)));
        assert_eq!(store.answer_count(user_id), 3);
    }

    #[tokio::test]
    async fn concurrent_submissions_never_exceed_the_quota() {
        let store = MemoryStore::new();
        let today = day(2026, 8, 31);
        let (user_id, _) = set_up(&store, today).await;
        // Grow the set to four members so every racing submission names a
        // distinct question and only the quota can turn one away.
        store.push_question_into_set(user_id, today);
        let set = store.get_daily_set(user_id, today).await.unwrap().unwrap();
        assert_eq!(set.question_ids.len(), 4);
        let controller = controller(store.clone(), Arc::new(StubScorer::new(good_card())));

        let (a, b, c, d) = tokio::join!(
            controller.submit_answer(user_id, set.question_ids[0], "one", 10, today),
            controller.submit_answer(user_id, set.question_ids[1], "two", 10, today),
            controller.submit_answer(user_id, set.question_ids[2], "three", 10, today),
            controller.submit_answer(user_id, set.question_ids[3], "four", 10, today),
        );

        let results = [a, b, c, d];
        let admitted = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(admitted, 3);
        for result in results {
            if let Err(e) = result {
                assert!(matches!(e, ServiceError::QuotaExceeded));
            }
        }
        assert_eq!(store.answer_count(user_id), 3);
    }

    #[tokio::test]
    async fn answering_the_same_question_twice_is_rejected_not_duplicated() {
        let store = MemoryStore::new();
        let today = day(2026, 8, 31);
        let (user_id, set) = set_up(&store, today).await;
        let controller = controller(store.clone(), Arc::new(StubScorer::new(good_card())));

        controller
            .submit_answer(user_id, set.question_ids[0], "first", 10, today)
            .await
            .unwrap();
        let result = controller
            .submit_answer(user_id, set.question_ids[0], "second", 10, today)
            .await;
        assert!(matches!(result, Err(ServiceError::AlreadyAnswered)));
        assert_eq!(store.answer_count(user_id), 1);
    }

    #[tokio::test]
    async fn oracle_failure_still_returns_the_persisted_answer() {
        let store = MemoryStore::new();
        let today = day(2026, 8, 31);
        let (user_id, set) = set_up(&store, today).await;
        let controller = controller(store.clone(), Arc::new(FailingScorer));

        let outcome = controller
            .submit_answer(user_id, set.question_ids[0], "ok", 10, today)
            .await
            .unwrap();
        assert!(outcome.feedback.is_none());
        assert_eq!(store.answer_count(user_id), 1);
        assert_eq!(store.feedback_count(), 0);
    }

    #[tokio::test]
    async fn oracle_timeout_collapses_to_null_feedback() {
        let store = MemoryStore::new();
        let today = day(2026, 8, 31);
        let (user_id, set) = set_up(&store, today).await;
        let slow = SlowScorer::new(good_card(), SCORER_TIMEOUT * 4);
        let controller = controller(store.clone(), Arc::new(slow));

        let outcome = controller
            .submit_answer(user_id, set.question_ids[0], "ok", 10, today)
            .await
            .unwrap();
        assert!(outcome.feedback.is_none());
        assert_eq!(store.answer_count(user_id), 1);
    }

    #[tokio::test]
    async fn schema_invalid_oracle_output_is_treated_as_failure() {
        let store = MemoryStore::new();
        let today = day(2026, 8, 31);
        let (user_id, set) = set_up(&store, today).await;
        // Scores outside 0..=10 must never reach the store.
        let controller = controller(store.clone(), Arc::new(InvalidScorer));

        let outcome = controller
            .submit_answer(user_id, set.question_ids[0], "ok", 10, today)
            .await
            .unwrap();
        assert!(outcome.feedback.is_none());
        assert_eq!(store.feedback_count(), 0);
    }
}
