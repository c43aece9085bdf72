//! crates/daily_drill_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

/// Number of questions assigned to a user per calendar day.
pub const SESSION_SIZE: usize = 3;

/// Maximum number of answers a user may submit per calendar day.
/// Deliberately equal to the session size; this is not a tunable rate limit.
pub const DAILY_QUOTA: i64 = 3;

/// Maximum answer length, counted in characters (not bytes).
pub const MAX_CONTENT_CHARS: usize = 1000;

/// Upper bound on the reported answering time, in seconds.
pub const MAX_ELAPSED_SEC: i32 = 60;

/// Maximum feedback summary length, counted in characters.
pub const MAX_SUMMARY_CHARS: usize = 100;

/// Inclusive range every feedback score must fall into.
pub const SCORE_RANGE: std::ops::RangeInclusive<i32> = 0..=10;

// Represents a user - used throughout the app
#[derive(Debug, Clone)]
pub struct User {
    pub user_id: Uuid,
    pub email: Option<String>,
}

// Only used internally for login/signup - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: Uuid,
    pub email: String,
    pub hashed_password: String,
}

// Represents a browser login session (auth cookie)
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub id: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// A practice prompt. Managed by an external content process; this core
/// only ever reads questions.
#[derive(Debug, Clone)]
pub struct Question {
    pub id: Uuid,
    pub category: String,
    pub text: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// The fixed, ordered set of question ids assigned to one user for one
/// calendar day. Created lazily, never mutated, never deleted.
#[derive(Debug, Clone)]
pub struct DailySet {
    pub id: Uuid,
    pub user_id: Uuid,
    pub date: NaiveDate,
    pub question_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// A submitted answer. Immutable after creation. Content may be the empty
/// string when the user ran out of time before typing anything.
#[derive(Debug, Clone)]
pub struct Answer {
    pub id: Uuid,
    pub user_id: Uuid,
    pub question_id: Uuid,
    pub content: String,
    pub elapsed_sec: i32,
    pub created_at: DateTime<Utc>,
}

/// Scoring feedback for one answer (1:1). Absence of feedback is a valid,
/// stable state, not an error.
#[derive(Debug, Clone)]
pub struct Feedback {
    pub id: Uuid,
    pub answer_id: Uuid,
    pub score_clarity: i32,
    pub score_reasoning: i32,
    pub score_diversity: i32,
    pub summary: String,
    pub created_at: DateTime<Utc>,
}

/// Validated output of the scoring oracle, not yet persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreCard {
    pub score_clarity: i32,
    pub score_reasoning: i32,
    pub score_diversity: i32,
    pub summary: String,
}

impl ScoreCard {
    /// Checks the oracle output against the feedback schema: all three
    /// scores in `SCORE_RANGE`, summary within `MAX_SUMMARY_CHARS`.
    pub fn validate(&self) -> Result<(), String> {
        for (name, score) in [
            ("score_clarity", self.score_clarity),
            ("score_reasoning", self.score_reasoning),
            ("score_diversity", self.score_diversity),
        ] {
            if !SCORE_RANGE.contains(&score) {
                return Err(format!("{} out of range: {}", name, score));
            }
        }
        if self.summary.chars().count() > MAX_SUMMARY_CHARS {
            return Err(format!(
                "summary too long: {} chars",
                self.summary.chars().count()
            ));
        }
        Ok(())
    }
}

/// One question of the day together with the user's answer state.
#[derive(Debug, Clone)]
pub struct DailyQuestion {
    pub question: Question,
    pub answer: Option<Answer>,
    pub feedback: Option<Feedback>,
}

/// The full `/today` read model: the daily set plus per-question state.
#[derive(Debug, Clone)]
pub struct DailyOverview {
    pub set: DailySet,
    pub questions: Vec<DailyQuestion>,
}

/// One history row: an answer joined with its question and optional feedback.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub answer: Answer,
    pub question: Question,
    pub feedback: Option<Feedback>,
}

/// All history entries of one calendar date, newest first.
#[derive(Debug, Clone)]
pub struct HistoryDay {
    pub date: NaiveDate,
    pub entries: Vec<HistoryEntry>,
}
