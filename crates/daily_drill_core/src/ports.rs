//! crates/daily_drill_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or APIs.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::domain::{
    Answer, DailySet, Feedback, HistoryEntry, Question, ScoreCard, User, UserCredentials,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    /// A uniqueness constraint was violated (e.g. a second answer for the
    /// same question on the same day, or a taken email address).
    #[error("Conflict: {0}")]
    Conflict(String),
    /// The atomic admission check refused the write: the daily quota is
    /// already used up. Nothing was persisted.
    #[error("Daily answer quota exceeded")]
    QuotaExceeded,
    #[error("Unauthorized")]
    Unauthorized,
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Record Store Port
//=========================================================================================

/// The fields of an answer that the caller supplies; id and timestamps are
/// assigned by the store.
#[derive(Debug, Clone)]
pub struct NewAnswer {
    pub user_id: Uuid,
    pub question_id: Uuid,
    pub content: String,
    pub elapsed_sec: i32,
}

/// The durable record store. It is the single source of truth and the sole
/// arbiter of the daily-set-uniqueness and quota invariants: both
/// `get_or_create_daily_set` and `insert_answer_if_under_quota` must be
/// single atomic operations, never read-then-write from the caller.
#[async_trait]
pub trait RecordStore: Send + Sync {
    // --- User Management ---
    async fn get_user(&self, user_id: Uuid) -> PortResult<User>;

    async fn find_user_by_email(&self, email: &str) -> PortResult<User>;

    async fn create_user_with_email(
        &self,
        email: &str,
        hashed_password: &str,
    ) -> PortResult<User>;

    async fn get_user_credentials(&self, email: &str) -> PortResult<UserCredentials>;

    // --- Auth Sessions ---
    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;

    // --- Questions (read-only; content is managed externally) ---
    async fn list_active_questions(&self) -> PortResult<Vec<Question>>;

    async fn get_question(&self, question_id: Uuid) -> PortResult<Question>;

    // --- Daily Sets ---
    /// Atomically inserts a daily set for `(user_id, date)` with the given
    /// candidate question ids if none exists yet, and returns the stored set
    /// either way. Concurrent callers must all observe the same row.
    async fn get_or_create_daily_set(
        &self,
        user_id: Uuid,
        date: NaiveDate,
        candidate_question_ids: &[Uuid],
    ) -> PortResult<DailySet>;

    async fn get_daily_set(&self, user_id: Uuid, date: NaiveDate) -> PortResult<Option<DailySet>>;

    // --- Answers & Feedback ---
    /// Checks the per-day quota and inserts the answer in one conditional
    /// write. Fails with `QuotaExceeded` (no write) when the user already
    /// has `quota` answers on `date`, and with `Conflict` when the question
    /// was already answered that day.
    ///
    /// The count check alone is not serializable under READ COMMITTED; the
    /// quota cap relies on it together with the per-`(user, question, date)`
    /// uniqueness and the caller restricting `question_id` to the daily set.
    async fn insert_answer_if_under_quota(
        &self,
        answer: NewAnswer,
        date: NaiveDate,
        quota: i64,
    ) -> PortResult<Answer>;

    async fn list_answers_for_day(
        &self,
        user_id: Uuid,
        date: NaiveDate,
    ) -> PortResult<Vec<(Answer, Option<Feedback>)>>;

    async fn insert_feedback(&self, answer_id: Uuid, score: &ScoreCard) -> PortResult<Feedback>;

    /// All answers of the user joined with their question and optional
    /// feedback, ordered by creation time descending.
    async fn list_answer_history(&self, user_id: Uuid) -> PortResult<Vec<HistoryEntry>>;
}

//=========================================================================================
// Scorer Gateway Port
//=========================================================================================

/// The boundary to the external scoring oracle. Pure request/response, no
/// state, no internal retries; retry policy, if any, belongs to the caller.
#[async_trait]
pub trait ScoringService: Send + Sync {
    /// Scores a free-text answer against its question. Transport failures,
    /// non-JSON output and schema-invalid output all fail the call.
    async fn score(&self, question_text: &str, answer_text: &str) -> PortResult<ScoreCard>;
}
