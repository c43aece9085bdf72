//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `RecordStore` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.
//!
//! The two invariants this system depends on live here, in the schema and in
//! single conditional statements, never in application-level read-then-write:
//! daily-set uniqueness (`UNIQUE (user_id, date)` + insert-on-conflict) and
//! the daily answer quota (conditional `INSERT .. SELECT .. WHERE count < quota`
//! + `UNIQUE (user_id, question_id, answered_on)`).

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use daily_drill_core::domain::{
    Answer, DailySet, Feedback, HistoryEntry, Question, ScoreCard, User, UserCredentials,
};
use daily_drill_core::ports::{NewAnswer, PortError, PortResult, RecordStore};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `RecordStore` port.
#[derive(Clone)]
pub struct StoreAdapter {
    pool: PgPool,
}

impl StoreAdapter {
    /// Creates a new `StoreAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn not_found_or(e: sqlx::Error, what: String) -> PortError {
    match e {
        sqlx::Error::RowNotFound => PortError::NotFound(what),
        _ => unexpected(e),
    }
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .map_or(false, |db| db.is_unique_violation())
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    user_id: Uuid,
    email: Option<String>,
}
impl UserRecord {
    fn to_domain(self) -> User {
        User {
            user_id: self.user_id,
            email: self.email,
        }
    }
}

#[derive(FromRow)]
struct CredentialsRecord {
    user_id: Uuid,
    email: String,
    hashed_password: String,
}
impl CredentialsRecord {
    fn to_domain(self) -> UserCredentials {
        UserCredentials {
            user_id: self.user_id,
            email: self.email,
            hashed_password: self.hashed_password,
        }
    }
}

#[derive(FromRow)]
struct QuestionRecord {
    id: Uuid,
    category: String,
    text: String,
    is_active: bool,
    created_at: DateTime<Utc>,
}
impl QuestionRecord {
    fn to_domain(self) -> Question {
        Question {
            id: self.id,
            category: self.category,
            text: self.text,
            is_active: self.is_active,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct DailySetRecord {
    id: Uuid,
    user_id: Uuid,
    date: NaiveDate,
    question_ids: Vec<Uuid>,
    created_at: DateTime<Utc>,
}
impl DailySetRecord {
    fn to_domain(self) -> DailySet {
        DailySet {
            id: self.id,
            user_id: self.user_id,
            date: self.date,
            question_ids: self.question_ids,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct AnswerRecord {
    id: Uuid,
    user_id: Uuid,
    question_id: Uuid,
    content: String,
    elapsed_sec: i32,
    created_at: DateTime<Utc>,
}
impl AnswerRecord {
    fn to_domain(self) -> Answer {
        Answer {
            id: self.id,
            user_id: self.user_id,
            question_id: self.question_id,
            content: self.content,
            elapsed_sec: self.elapsed_sec,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct FeedbackRecord {
    id: Uuid,
    answer_id: Uuid,
    score_clarity: i32,
    score_reasoning: i32,
    score_diversity: i32,
    summary: String,
    created_at: DateTime<Utc>,
}
impl FeedbackRecord {
    fn to_domain(self) -> Feedback {
        Feedback {
            id: self.id,
            answer_id: self.answer_id,
            score_clarity: self.score_clarity,
            score_reasoning: self.score_reasoning,
            score_diversity: self.score_diversity,
            summary: self.summary,
            created_at: self.created_at,
        }
    }
}

/// One joined row of answer + optional feedback columns.
#[derive(FromRow)]
struct AnswerWithFeedbackRecord {
    id: Uuid,
    user_id: Uuid,
    question_id: Uuid,
    content: String,
    elapsed_sec: i32,
    created_at: DateTime<Utc>,
    feedback_id: Option<Uuid>,
    score_clarity: Option<i32>,
    score_reasoning: Option<i32>,
    score_diversity: Option<i32>,
    summary: Option<String>,
    feedback_created_at: Option<DateTime<Utc>>,
}
impl AnswerWithFeedbackRecord {
    fn to_domain(self) -> (Answer, Option<Feedback>) {
        let answer = Answer {
            id: self.id,
            user_id: self.user_id,
            question_id: self.question_id,
            content: self.content,
            elapsed_sec: self.elapsed_sec,
            created_at: self.created_at,
        };
        // The LEFT JOIN yields either all feedback columns or none.
        let feedback = match (
            self.feedback_id,
            self.score_clarity,
            self.score_reasoning,
            self.score_diversity,
            self.summary,
            self.feedback_created_at,
        ) {
            (Some(id), Some(clarity), Some(reasoning), Some(diversity), Some(summary), Some(at)) => {
                Some(Feedback {
                    id,
                    answer_id: answer.id,
                    score_clarity: clarity,
                    score_reasoning: reasoning,
                    score_diversity: diversity,
                    summary,
                    created_at: at,
                })
            }
            _ => None,
        };
        (answer, feedback)
    }
}

/// One joined row of answer + question + optional feedback columns.
#[derive(FromRow)]
struct HistoryRecord {
    id: Uuid,
    user_id: Uuid,
    question_id: Uuid,
    content: String,
    elapsed_sec: i32,
    created_at: DateTime<Utc>,
    category: String,
    text: String,
    is_active: bool,
    question_created_at: DateTime<Utc>,
    feedback_id: Option<Uuid>,
    score_clarity: Option<i32>,
    score_reasoning: Option<i32>,
    score_diversity: Option<i32>,
    summary: Option<String>,
    feedback_created_at: Option<DateTime<Utc>>,
}
impl HistoryRecord {
    fn to_domain(self) -> HistoryEntry {
        let question = Question {
            id: self.question_id,
            category: self.category,
            text: self.text,
            is_active: self.is_active,
            created_at: self.question_created_at,
        };
        let (answer, feedback) = AnswerWithFeedbackRecord {
            id: self.id,
            user_id: self.user_id,
            question_id: self.question_id,
            content: self.content,
            elapsed_sec: self.elapsed_sec,
            created_at: self.created_at,
            feedback_id: self.feedback_id,
            score_clarity: self.score_clarity,
            score_reasoning: self.score_reasoning,
            score_diversity: self.score_diversity,
            summary: self.summary,
            feedback_created_at: self.feedback_created_at,
        }
        .to_domain();
        HistoryEntry {
            answer,
            question,
            feedback,
        }
    }
}

//=========================================================================================
// `RecordStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl RecordStore for StoreAdapter {
    async fn get_user(&self, user_id: Uuid) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "SELECT user_id, email FROM users WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or(e, format!("User {} not found", user_id)))?;
        Ok(record.to_domain())
    }

    async fn find_user_by_email(&self, email: &str) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "SELECT user_id, email FROM users WHERE email = lower($1)",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or(e, format!("User {} not found", email)))?;
        Ok(record.to_domain())
    }

    async fn create_user_with_email(
        &self,
        email: &str,
        hashed_password: &str,
    ) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "INSERT INTO users (user_id, email, hashed_password) \
             VALUES ($1, lower($2), $3) \
             RETURNING user_id, email",
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(hashed_password)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                PortError::Conflict(format!("email {} is already registered", email))
            } else {
                unexpected(e)
            }
        })?;
        Ok(record.to_domain())
    }

    async fn get_user_credentials(&self, email: &str) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT user_id, email, hashed_password FROM users \
             WHERE email = lower($1) AND hashed_password IS NOT NULL",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or(e, format!("User {} not found", email)))?;
        Ok(record.to_domain())
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(session_id)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        let row: Option<(Uuid,)> = sqlx::query_as(
            "SELECT user_id FROM auth_sessions WHERE id = $1 AND expires_at > now()",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        row.map(|(user_id,)| user_id).ok_or(PortError::Unauthorized)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn list_active_questions(&self) -> PortResult<Vec<Question>> {
        let records = sqlx::query_as::<_, QuestionRecord>(
            "SELECT id, category, text, is_active, created_at FROM questions \
             WHERE is_active ORDER BY created_at ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn get_question(&self, question_id: Uuid) -> PortResult<Question> {
        let record = sqlx::query_as::<_, QuestionRecord>(
            "SELECT id, category, text, is_active, created_at FROM questions WHERE id = $1",
        )
        .bind(question_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or(e, format!("Question {} not found", question_id)))?;
        Ok(record.to_domain())
    }

    async fn get_or_create_daily_set(
        &self,
        user_id: Uuid,
        date: NaiveDate,
        candidate_question_ids: &[Uuid],
    ) -> PortResult<DailySet> {
        // The unique constraint on (user_id, date) decides the winner under
        // concurrency; losers fall through to the select and observe it.
        sqlx::query(
            "INSERT INTO daily_sets (id, user_id, date, question_ids) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (user_id, date) DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(date)
        .bind(candidate_question_ids)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;

        let record = sqlx::query_as::<_, DailySetRecord>(
            "SELECT id, user_id, date, question_ids, created_at FROM daily_sets \
             WHERE user_id = $1 AND date = $2",
        )
        .bind(user_id)
        .bind(date)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn get_daily_set(&self, user_id: Uuid, date: NaiveDate) -> PortResult<Option<DailySet>> {
        let record = sqlx::query_as::<_, DailySetRecord>(
            "SELECT id, user_id, date, question_ids, created_at FROM daily_sets \
             WHERE user_id = $1 AND date = $2",
        )
        .bind(user_id)
        .bind(date)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(|r| r.to_domain()))
    }

    async fn insert_answer_if_under_quota(
        &self,
        answer: NewAnswer,
        date: NaiveDate,
        quota: i64,
    ) -> PortResult<Answer> {
        // Quota check and insert in one statement; no row means at-quota.
        // Racing statements can each pass the count subquery under READ
        // COMMITTED; the cap then holds via the (user_id, question_id,
        // answered_on) unique index and set-membership admission upstream.
        let record = sqlx::query_as::<_, AnswerRecord>(
            "INSERT INTO answers (id, user_id, question_id, content, elapsed_sec, answered_on) \
             SELECT $1, $2, $3, $4, $5, $6 \
             WHERE (SELECT count(*) FROM answers \
                    WHERE user_id = $2 AND answered_on = $6) < $7 \
             RETURNING id, user_id, question_id, content, elapsed_sec, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(answer.user_id)
        .bind(answer.question_id)
        .bind(&answer.content)
        .bind(answer.elapsed_sec)
        .bind(date)
        .bind(quota)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                PortError::Conflict(format!(
                    "question {} already answered on {}",
                    answer.question_id, date
                ))
            } else {
                unexpected(e)
            }
        })?;
        record.map(|r| r.to_domain()).ok_or(PortError::QuotaExceeded)
    }

    async fn list_answers_for_day(
        &self,
        user_id: Uuid,
        date: NaiveDate,
    ) -> PortResult<Vec<(Answer, Option<Feedback>)>> {
        let records = sqlx::query_as::<_, AnswerWithFeedbackRecord>(
            "SELECT a.id, a.user_id, a.question_id, a.content, a.elapsed_sec, a.created_at, \
                    f.id AS feedback_id, f.score_clarity, f.score_reasoning, f.score_diversity, \
                    f.summary, f.created_at AS feedback_created_at \
             FROM answers a \
             LEFT JOIN feedback f ON f.answer_id = a.id \
             WHERE a.user_id = $1 AND a.answered_on = $2 \
             ORDER BY a.created_at ASC",
        )
        .bind(user_id)
        .bind(date)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn insert_feedback(&self, answer_id: Uuid, score: &ScoreCard) -> PortResult<Feedback> {
        let record = sqlx::query_as::<_, FeedbackRecord>(
            "INSERT INTO feedback \
             (id, answer_id, score_clarity, score_reasoning, score_diversity, summary) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING id, answer_id, score_clarity, score_reasoning, score_diversity, \
                       summary, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(answer_id)
        .bind(score.score_clarity)
        .bind(score.score_reasoning)
        .bind(score.score_diversity)
        .bind(&score.summary)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                PortError::Conflict(format!("feedback for answer {} already exists", answer_id))
            } else {
                unexpected(e)
            }
        })?;
        Ok(record.to_domain())
    }

    async fn list_answer_history(&self, user_id: Uuid) -> PortResult<Vec<HistoryEntry>> {
        let records = sqlx::query_as::<_, HistoryRecord>(
            "SELECT a.id, a.user_id, a.question_id, a.content, a.elapsed_sec, a.created_at, \
                    q.category, q.text, q.is_active, q.created_at AS question_created_at, \
                    f.id AS feedback_id, f.score_clarity, f.score_reasoning, f.score_diversity, \
                    f.summary, f.created_at AS feedback_created_at \
             FROM answers a \
             JOIN questions q ON q.id = a.question_id \
             LEFT JOIN feedback f ON f.answer_id = a.id \
             WHERE a.user_id = $1 \
             ORDER BY a.created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }
}
