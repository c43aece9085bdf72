//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints, the wire-level
//! DTOs, and the master definition for the OpenAPI specification.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use chrono::{DateTime, NaiveDate, Utc};
use daily_drill_core::domain::{
    Answer, DailyOverview, DailySet, Feedback, HistoryDay, Question,
};
use daily_drill_core::services::{
    HistoryAggregator, ServiceError, SessionAssigner, SubmissionController,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

use crate::web::state::AppState;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::web::auth::signup_handler,
        crate::web::auth::login_handler,
        crate::web::auth::logout_handler,
        today_handler,
        answer_handler,
        history_handler,
    ),
    components(
        schemas(
            crate::web::auth::SignupRequest,
            crate::web::auth::LoginRequest,
            crate::web::auth::AuthResponse,
            QuestionDto,
            DailySetDto,
            AnswerDto,
            FeedbackDto,
            DailyQuestionDto,
            TodayResponse,
            AnswerRequest,
            AnswerResponse,
            HistoryEntryDto,
            HistoryDayDto,
            HistoryResponse,
            ErrorBody,
        )
    ),
    tags(
        (name = "Daily Drill API", description = "API endpoints for the daily practice session.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Serialize, ToSchema)]
pub struct QuestionDto {
    pub id: Uuid,
    pub category: String,
    pub text: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Question> for QuestionDto {
    fn from(q: Question) -> Self {
        Self {
            id: q.id,
            category: q.category,
            text: q.text,
            is_active: q.is_active,
            created_at: q.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct DailySetDto {
    pub id: Uuid,
    pub user_id: Uuid,
    pub date: NaiveDate,
    pub question_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl From<DailySet> for DailySetDto {
    fn from(s: DailySet) -> Self {
        Self {
            id: s.id,
            user_id: s.user_id,
            date: s.date,
            question_ids: s.question_ids,
            created_at: s.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct AnswerDto {
    pub id: Uuid,
    pub user_id: Uuid,
    pub question_id: Uuid,
    pub content: String,
    pub elapsed_sec: i32,
    pub created_at: DateTime<Utc>,
}

impl From<Answer> for AnswerDto {
    fn from(a: Answer) -> Self {
        Self {
            id: a.id,
            user_id: a.user_id,
            question_id: a.question_id,
            content: a.content,
            elapsed_sec: a.elapsed_sec,
            created_at: a.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct FeedbackDto {
    pub id: Uuid,
    pub answer_id: Uuid,
    pub score_clarity: i32,
    pub score_reasoning: i32,
    pub score_diversity: i32,
    pub summary: String,
    pub created_at: DateTime<Utc>,
}

impl From<Feedback> for FeedbackDto {
    fn from(f: Feedback) -> Self {
        Self {
            id: f.id,
            answer_id: f.answer_id,
            score_clarity: f.score_clarity,
            score_reasoning: f.score_reasoning,
            score_diversity: f.score_diversity,
            summary: f.summary,
            created_at: f.created_at,
        }
    }
}

/// One of today's questions, with the user's answer state for it.
#[derive(Serialize, ToSchema)]
pub struct DailyQuestionDto {
    pub question: QuestionDto,
    pub answer: Option<AnswerDto>,
    pub feedback: Option<FeedbackDto>,
}

#[derive(Serialize, ToSchema)]
pub struct TodayResponse {
    pub daily_set: DailySetDto,
    pub questions: Vec<DailyQuestionDto>,
}

impl From<DailyOverview> for TodayResponse {
    fn from(overview: DailyOverview) -> Self {
        Self {
            daily_set: overview.set.into(),
            questions: overview
                .questions
                .into_iter()
                .map(|dq| DailyQuestionDto {
                    question: dq.question.into(),
                    answer: dq.answer.map(Into::into),
                    feedback: dq.feedback.map(Into::into),
                })
                .collect(),
        }
    }
}

/// The submission payload. Field names are camelCase on the wire.
#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRequest {
    pub question_id: Uuid,
    pub content: String,
    pub elapsed_sec: i32,
}

#[derive(Serialize, ToSchema)]
pub struct AnswerResponse {
    pub answer: AnswerDto,
    /// `null` whenever the scoring oracle failed; the answer is persisted
    /// regardless.
    pub feedback: Option<FeedbackDto>,
}

#[derive(Serialize, ToSchema)]
pub struct HistoryEntryDto {
    pub question: QuestionDto,
    pub answer: AnswerDto,
    pub feedback: Option<FeedbackDto>,
}

#[derive(Serialize, ToSchema)]
pub struct HistoryDayDto {
    pub date: NaiveDate,
    pub answers: Vec<HistoryEntryDto>,
}

impl From<HistoryDay> for HistoryDayDto {
    fn from(day: HistoryDay) -> Self {
        Self {
            date: day.date,
            answers: day
                .entries
                .into_iter()
                .map(|entry| HistoryEntryDto {
                    question: entry.question.into(),
                    answer: entry.answer.into(),
                    feedback: entry.feedback.map(Into::into),
                })
                .collect(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct HistoryResponse {
    pub history: Vec<HistoryDayDto>,
}

//=========================================================================================
// Error Mapping
//=========================================================================================

/// Maps the core error taxonomy onto HTTP statuses. Infrastructure failures
/// are logged with context and surfaced as a generic message only.
fn error_response(e: ServiceError) -> (StatusCode, Json<ErrorBody>) {
    let (status, message) = match &e {
        ServiceError::NotFound(what) => (StatusCode::NOT_FOUND, format!("{} not found", what)),
        ServiceError::Validation(reason) => (StatusCode::BAD_REQUEST, reason.clone()),
        ServiceError::QuotaExceeded => (StatusCode::FORBIDDEN, "Daily limit reached".to_string()),
        ServiceError::AlreadyAnswered => (
            StatusCode::CONFLICT,
            "This question was already answered today".to_string(),
        ),
        ServiceError::InsufficientContent => {
            error!("No daily set could be built: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to get daily set".to_string(),
            )
        }
        ServiceError::Store(_) => {
            error!("Record store failure: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            )
        }
    };
    (status, Json(ErrorBody { error: message }))
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Get today's daily set together with per-question answer/feedback state.
///
/// Creates the set on the first request of a new day; repeated and
/// concurrent requests observe the same set.
#[utoipa::path(
    get,
    path = "/today",
    responses(
        (status = 200, description = "Today's daily set", body = TodayResponse),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Unknown user", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
pub async fn today_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorBody>)> {
    let assigner = SessionAssigner::new(state.store.clone());
    let overview = assigner
        .daily_overview(user_id, state.clock.today())
        .await
        .map_err(error_response)?;
    Ok(Json(TodayResponse::from(overview)))
}

/// Submit a timed answer to one of today's questions.
///
/// The answer is persisted first; feedback generation is best-effort and a
/// scoring failure yields `feedback: null`, never a failed response.
#[utoipa::path(
    post,
    path = "/answer",
    request_body = AnswerRequest,
    responses(
        (status = 200, description = "Answer persisted", body = AnswerResponse),
        (status = 400, description = "Validation failure", body = ErrorBody),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Daily quota reached", body = ErrorBody),
        (status = 409, description = "Question already answered today", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
pub async fn answer_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<AnswerRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorBody>)> {
    let controller = SubmissionController::new(
        state.store.clone(),
        state.scorer.clone(),
        state.config.scorer_timeout,
    );
    let outcome = controller
        .submit_answer(
            user_id,
            req.question_id,
            &req.content,
            req.elapsed_sec,
            state.clock.today(),
        )
        .await
        .map_err(error_response)?;
    Ok(Json(AnswerResponse {
        answer: outcome.answer.into(),
        feedback: outcome.feedback.map(Into::into),
    }))
}

/// Get the user's full answer history, grouped by date, newest first.
#[utoipa::path(
    get,
    path = "/history",
    responses(
        (status = 200, description = "Date-grouped answer history", body = HistoryResponse),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Unknown user", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
pub async fn history_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorBody>)> {
    let aggregator = HistoryAggregator::new(state.store.clone(), state.clock);
    let history = aggregator.history(user_id).await.map_err(error_response)?;
    Ok(Json(HistoryResponse {
        history: history.into_iter().map(Into::into).collect(),
    }))
}
