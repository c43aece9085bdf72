//! crates/daily_drill_core/src/services/support.rs
//!
//! Test doubles shared by the service tests: an in-memory `RecordStore`
//! mirroring the real store's atomic semantics, and canned scorers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::domain::{
    Answer, AuthSession, DailySet, Feedback, HistoryEntry, Question, ScoreCard, User,
    UserCredentials,
};
use crate::ports::{NewAnswer, PortError, PortResult, RecordStore, ScoringService};

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, User>,
    credentials: HashMap<String, UserCredentials>,
    auth_sessions: HashMap<String, AuthSession>,
    questions: Vec<Question>,
    daily_sets: Vec<DailySet>,
    // Answers are stored with the admission date they were counted under.
    answers: Vec<(Answer, NaiveDate)>,
    feedback: Vec<Feedback>,
}

/// An in-memory record store. Uniqueness and quota checks happen under one
/// lock, matching the atomicity the real store provides per statement.
pub(crate) struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(Inner::default()),
        })
    }

    pub fn seed_user(&self, email: &str) -> Uuid {
        let user_id = Uuid::new_v4();
        let mut inner = self.inner.lock().unwrap();
        inner.users.insert(
            user_id,
            User {
                user_id,
                email: Some(email.to_string()),
            },
        );
        user_id
    }

    pub fn seed_question(&self, text: &str, active: bool) -> Question {
        let question = Question {
            id: Uuid::new_v4(),
            category: "general".to_string(),
            text: text.to_string(),
            is_active: active,
            created_at: Utc::now(),
        };
        self.inner.lock().unwrap().questions.push(question.clone());
        question
    }

    /// Inserts an answer directly, bypassing admission, with a caller-chosen
    /// creation instant. Returns the answer id.
    pub fn seed_answer_at(
        &self,
        user_id: Uuid,
        question_id: Uuid,
        created_at: DateTime<Utc>,
    ) -> Uuid {
        let answer = Answer {
            id: Uuid::new_v4(),
            user_id,
            question_id,
            content: "seeded".to_string(),
            elapsed_sec: 10,
            created_at,
        };
        let id = answer.id;
        self.inner
            .lock()
            .unwrap()
            .answers
            .push((answer, created_at.date_naive()));
        id
    }

    pub fn seed_feedback(&self, answer_id: Uuid, card: &ScoreCard) {
        self.inner.lock().unwrap().feedback.push(Feedback {
            id: Uuid::new_v4(),
            answer_id,
            score_clarity: card.score_clarity,
            score_reasoning: card.score_reasoning,
            score_diversity: card.score_diversity,
            summary: card.summary.clone(),
            created_at: Utc::now(),
        });
    }

    /// Appends one extra active question to an existing daily set, to let
    /// quota tests submit a fourth in-set answer.
    pub fn push_question_into_set(&self, user_id: Uuid, date: NaiveDate) {
        let question = self.seed_question("extra", true);
        let mut inner = self.inner.lock().unwrap();
        let set = inner
            .daily_sets
            .iter_mut()
            .find(|s| s.user_id == user_id && s.date == date)
            .expect("daily set must exist");
        set.question_ids.push(question.id);
    }

    pub fn answer_count(&self, user_id: Uuid) -> usize {
        self.inner
            .lock()
            .unwrap()
            .answers
            .iter()
            .filter(|(a, _)| a.user_id == user_id)
            .count()
    }

    pub fn feedback_count(&self) -> usize {
        self.inner.lock().unwrap().feedback.len()
    }

    pub fn daily_set_count(&self) -> usize {
        self.inner.lock().unwrap().daily_sets.len()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn get_user(&self, user_id: Uuid) -> PortResult<User> {
        self.inner
            .lock()
            .unwrap()
            .users
            .get(&user_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("User {}", user_id)))
    }

    async fn find_user_by_email(&self, email: &str) -> PortResult<User> {
        self.inner
            .lock()
            .unwrap()
            .users
            .values()
            .find(|u| u.email.as_deref() == Some(email))
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("User {}", email)))
    }

    async fn create_user_with_email(
        &self,
        email: &str,
        hashed_password: &str,
    ) -> PortResult<User> {
        let mut inner = self.inner.lock().unwrap();
        if inner.credentials.contains_key(email) {
            return Err(PortError::Conflict(format!("email {} taken", email)));
        }
        let user_id = Uuid::new_v4();
        inner.credentials.insert(
            email.to_string(),
            UserCredentials {
                user_id,
                email: email.to_string(),
                hashed_password: hashed_password.to_string(),
            },
        );
        let user = User {
            user_id,
            email: Some(email.to_string()),
        };
        inner.users.insert(user_id, user.clone());
        Ok(user)
    }

    async fn get_user_credentials(&self, email: &str) -> PortResult<UserCredentials> {
        self.inner
            .lock()
            .unwrap()
            .credentials
            .get(email)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("User {}", email)))
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        self.inner.lock().unwrap().auth_sessions.insert(
            session_id.to_string(),
            AuthSession {
                id: session_id.to_string(),
                user_id,
                expires_at,
            },
        );
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        let inner = self.inner.lock().unwrap();
        match inner.auth_sessions.get(session_id) {
            Some(session) if session.expires_at > Utc::now() => Ok(session.user_id),
            _ => Err(PortError::Unauthorized),
        }
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        self.inner.lock().unwrap().auth_sessions.remove(session_id);
        Ok(())
    }

    async fn list_active_questions(&self) -> PortResult<Vec<Question>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .questions
            .iter()
            .filter(|q| q.is_active)
            .cloned()
            .collect())
    }

    async fn get_question(&self, question_id: Uuid) -> PortResult<Question> {
        self.inner
            .lock()
            .unwrap()
            .questions
            .iter()
            .find(|q| q.id == question_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Question {}", question_id)))
    }

    async fn get_or_create_daily_set(
        &self,
        user_id: Uuid,
        date: NaiveDate,
        candidate_question_ids: &[Uuid],
    ) -> PortResult<DailySet> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(existing) = inner
            .daily_sets
            .iter()
            .find(|s| s.user_id == user_id && s.date == date)
        {
            return Ok(existing.clone());
        }
        let set = DailySet {
            id: Uuid::new_v4(),
            user_id,
            date,
            question_ids: candidate_question_ids.to_vec(),
            created_at: Utc::now(),
        };
        inner.daily_sets.push(set.clone());
        Ok(set)
    }

    async fn get_daily_set(&self, user_id: Uuid, date: NaiveDate) -> PortResult<Option<DailySet>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .daily_sets
            .iter()
            .find(|s| s.user_id == user_id && s.date == date)
            .cloned())
    }

    async fn insert_answer_if_under_quota(
        &self,
        answer: NewAnswer,
        date: NaiveDate,
        quota: i64,
    ) -> PortResult<Answer> {
        let mut inner = self.inner.lock().unwrap();
        let todays = inner
            .answers
            .iter()
            .filter(|(a, d)| a.user_id == answer.user_id && *d == date)
            .count() as i64;
        if todays >= quota {
            return Err(PortError::QuotaExceeded);
        }
        if inner.answers.iter().any(|(a, d)| {
            a.user_id == answer.user_id && a.question_id == answer.question_id && *d == date
        }) {
            return Err(PortError::Conflict(format!(
                "question {} already answered on {}",
                answer.question_id, date
            )));
        }
        let stored = Answer {
            id: Uuid::new_v4(),
            user_id: answer.user_id,
            question_id: answer.question_id,
            content: answer.content,
            elapsed_sec: answer.elapsed_sec,
            created_at: Utc::now(),
        };
        inner.answers.push((stored.clone(), date));
        Ok(stored)
    }

    async fn list_answers_for_day(
        &self,
        user_id: Uuid,
        date: NaiveDate,
    ) -> PortResult<Vec<(Answer, Option<Feedback>)>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .answers
            .iter()
            .filter(|(a, d)| a.user_id == user_id && *d == date)
            .map(|(a, _)| {
                let feedback = inner.feedback.iter().find(|f| f.answer_id == a.id).cloned();
                (a.clone(), feedback)
            })
            .collect())
    }

    async fn insert_feedback(&self, answer_id: Uuid, score: &ScoreCard) -> PortResult<Feedback> {
        let mut inner = self.inner.lock().unwrap();
        if inner.feedback.iter().any(|f| f.answer_id == answer_id) {
            return Err(PortError::Conflict(format!(
                "feedback for answer {} exists",
                answer_id
            )));
        }
        let feedback = Feedback {
            id: Uuid::new_v4(),
            answer_id,
            score_clarity: score.score_clarity,
            score_reasoning: score.score_reasoning,
            score_diversity: score.score_diversity,
            summary: score.summary.clone(),
            created_at: Utc::now(),
        };
        inner.feedback.push(feedback.clone());
        Ok(feedback)
    }

    async fn list_answer_history(&self, user_id: Uuid) -> PortResult<Vec<HistoryEntry>> {
        let inner = self.inner.lock().unwrap();
        let mut answers: Vec<Answer> = inner
            .answers
            .iter()
            .filter(|(a, _)| a.user_id == user_id)
            .map(|(a, _)| a.clone())
            .collect();
        answers.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let mut entries = Vec::with_capacity(answers.len());
        for answer in answers {
            let question = inner
                .questions
                .iter()
                .find(|q| q.id == answer.question_id)
                .cloned()
                .ok_or_else(|| {
                    PortError::NotFound(format!("Question {}", answer.question_id))
                })?;
            let feedback = inner
                .feedback
                .iter()
                .find(|f| f.answer_id == answer.id)
                .cloned();
            entries.push(HistoryEntry {
                answer,
                question,
                feedback,
            });
        }
        Ok(entries)
    }
}

//=========================================================================================
// Canned Scorers
//=========================================================================================

/// Always succeeds with a fixed score card.
pub(crate) struct StubScorer {
    card: ScoreCard,
}

impl StubScorer {
    pub fn new(card: ScoreCard) -> Self {
        Self { card }
    }
}

#[async_trait]
impl ScoringService for StubScorer {
    async fn score(&self, _question_text: &str, _answer_text: &str) -> PortResult<ScoreCard> {
        Ok(self.card.clone())
    }
}

/// Always fails, simulating transport or parse errors at the gateway.
pub(crate) struct FailingScorer;

#[async_trait]
impl ScoringService for FailingScorer {
    async fn score(&self, _question_text: &str, _answer_text: &str) -> PortResult<ScoreCard> {
        Err(PortError::Unexpected("oracle unreachable".to_string()))
    }
}

/// Succeeds, but only after a delay; used to exercise the caller timeout.
pub(crate) struct SlowScorer {
    card: ScoreCard,
    delay: Duration,
}

impl SlowScorer {
    pub fn new(card: ScoreCard, delay: Duration) -> Self {
        Self { card, delay }
    }
}

#[async_trait]
impl ScoringService for SlowScorer {
    async fn score(&self, _question_text: &str, _answer_text: &str) -> PortResult<ScoreCard> {
        tokio::time::sleep(self.delay).await;
        Ok(self.card.clone())
    }
}

/// Succeeds with out-of-schema output, as a misbehaving adapter would.
pub(crate) struct InvalidScorer;

#[async_trait]
impl ScoringService for InvalidScorer {
    async fn score(&self, _question_text: &str, _answer_text: &str) -> PortResult<ScoreCard> {
        Ok(ScoreCard {
            score_clarity: 12,
            score_reasoning: 5,
            score_diversity: 5,
            summary: "範囲外".to_string(),
        })
    }
}
