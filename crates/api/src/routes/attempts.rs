//! Attempt, submission, and result endpoints.

use std::collections::HashMap;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{AggregateId, CourseId, QuizId, UserId};
use domain::{
    AttemptService, CreateAttempt, QuizResult, ResultStatus, RetakeAttempt, StartResult, UserQuiz,
};
use event_store::EventStore;
use messaging::{Answer, GradedQuestion, InMemoryBroker};
use projections::{AttemptHistoryView, AttemptSummary, ProjectionProcessor};
use saga::{CircuitBreaker, SubmissionService, SubmitQuiz};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S: EventStore> {
    pub attempts: Arc<AttemptService<S>>,
    pub submissions: SubmissionService<S, InMemoryBroker>,
    pub history: AttemptHistoryView,
    pub projection_processor: Arc<ProjectionProcessor<S>>,
    pub broker: InMemoryBroker,
    pub progress_breaker: CircuitBreaker,
}

// -- Request types --

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAttemptRequest {
    pub user_id: UserId,
    pub quiz_id: QuizId,
    pub course_id: CourseId,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    pub result_id: Option<AggregateId>,
    pub answers: Vec<Answer>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

// -- Response types --

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserQuizResponse {
    pub user_quiz_id: AggregateId,
    pub user_id: Option<UserId>,
    pub quiz_id: Option<QuizId>,
    pub course_id: Option<CourseId>,
    pub status: String,
    pub attempt_count: u32,
    pub results_started: u32,
    pub best_score: f64,
    pub first_attempt_at: Option<DateTime<Utc>>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub passed_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl UserQuizResponse {
    fn from_aggregate(user_quiz_id: AggregateId, uq: &UserQuiz) -> Self {
        Self {
            user_quiz_id,
            user_id: uq.user_id(),
            quiz_id: uq.quiz_id(),
            course_id: uq.course_id(),
            status: uq.status().to_string(),
            attempt_count: uq.attempt_count(),
            results_started: uq.results_started(),
            best_score: uq.best_score(),
            first_attempt_at: uq.first_attempt_at(),
            last_attempt_at: uq.last_attempt_at(),
            passed_at: uq.passed_at(),
            updated_at: uq.updated_at(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultResponse {
    pub result_id: AggregateId,
    pub user_quiz_id: Option<AggregateId>,
    pub attempt_number: u32,
    pub status: ResultStatus,
    pub score: Option<f64>,
    pub total_marks: Option<f64>,
    pub percentage_score: Option<f64>,
    pub is_passed: Option<bool>,
    pub graded_questions: Vec<GradedQuestion>,
    pub started_at: Option<DateTime<Utc>>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<i64>,
}

impl ResultResponse {
    fn from_aggregate(result_id: AggregateId, r: &QuizResult) -> Self {
        Self {
            result_id,
            user_quiz_id: r.user_quiz_id(),
            attempt_number: r.attempt_number(),
            status: r.status(),
            score: r.score(),
            total_marks: r.total_marks(),
            percentage_score: r.percentage_score(),
            is_passed: r.is_passed(),
            graded_questions: r.graded_questions().to_vec(),
            started_at: r.started_at(),
            submitted_at: r.submitted_at(),
            completed_at: r.completed_at(),
            duration_seconds: r.duration_seconds(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionAcceptedResponse {
    pub result_id: AggregateId,
    pub attempt_number: u32,
    pub status: ResultStatus,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptSummaryResponse {
    pub result_id: AggregateId,
    pub attempt_number: u32,
    pub status: ResultStatus,
    pub score: Option<f64>,
    pub percentage_score: Option<f64>,
    pub is_passed: Option<bool>,
    pub started_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<AttemptSummary> for AttemptSummaryResponse {
    fn from(a: AttemptSummary) -> Self {
        Self {
            result_id: a.result_id,
            attempt_number: a.attempt_number,
            status: a.status,
            score: a.score,
            percentage_score: a.percentage_score,
            is_passed: a.is_passed,
            started_at: a.started_at,
            submitted_at: a.submitted_at,
            completed_at: a.completed_at,
        }
    }
}

// -- Handlers --

/// POST /attempts: create the attempt record for a user and quiz.
#[tracing::instrument(skip(state, req), fields(user_id = %req.user_id, quiz_id = %req.quiz_id))]
pub async fn create<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<CreateAttemptRequest>,
) -> Result<(StatusCode, Json<UserQuizResponse>), ApiError> {
    let cmd = CreateAttempt::new(req.user_id, req.quiz_id, req.course_id);
    let user_quiz_id = UserQuiz::id_for(req.user_id, req.quiz_id);
    let user_quiz = state.attempts.create_attempt(cmd).await?;

    Ok((
        StatusCode::CREATED,
        Json(UserQuizResponse::from_aggregate(user_quiz_id, &user_quiz)),
    ))
}

/// GET /attempts/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<UserQuizResponse>, ApiError> {
    let user_quiz_id = parse_aggregate_id(&id)?;
    let user_quiz = load_user_quiz(&state, user_quiz_id).await?;
    Ok(Json(UserQuizResponse::from_aggregate(user_quiz_id, &user_quiz)))
}

/// POST /attempts/{id}/retake: grant another attempt.
#[tracing::instrument(skip(state))]
pub async fn retake<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<UserQuizResponse>, ApiError> {
    let user_quiz_id = parse_aggregate_id(&id)?;
    let user_quiz = state.attempts.retake(RetakeAttempt { user_quiz_id }).await?;
    Ok(Json(UserQuizResponse::from_aggregate(user_quiz_id, &user_quiz)))
}

/// POST /attempts/{id}/results: open a result for the next attempt.
#[tracing::instrument(skip(state))]
pub async fn start_result<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<ResultResponse>), ApiError> {
    let user_quiz_id = parse_aggregate_id(&id)?;
    load_user_quiz(&state, user_quiz_id).await?;

    let cmd = StartResult::for_user_quiz(user_quiz_id);
    let result_id = cmd.result_id;
    let result = state.attempts.start_result(cmd).await?;

    Ok((
        StatusCode::CREATED,
        Json(ResultResponse::from_aggregate(result_id, &result)),
    ))
}

/// POST /attempts/{id}/submissions: store answers and hand them to grading.
///
/// Responds 202: the grade arrives asynchronously.
#[tracing::instrument(skip(state, req), fields(answers = req.answers.len()))]
pub async fn submit<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<SubmitRequest>,
) -> Result<(StatusCode, Json<SubmissionAcceptedResponse>), ApiError> {
    let user_quiz_id = parse_aggregate_id(&id)?;

    let mut cmd = SubmitQuiz::new(user_quiz_id, req.answers).with_metadata(req.metadata);
    cmd.result_id = req.result_id;
    let accepted = state.submissions.submit(cmd).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmissionAcceptedResponse {
            result_id: accepted.result_id,
            attempt_number: accepted.attempt_number,
            status: ResultStatus::Pending,
        }),
    ))
}

/// GET /attempts/{id}/results: attempt history from the read model.
#[tracing::instrument(skip(state))]
pub async fn history<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<AttemptSummaryResponse>>, ApiError> {
    let user_quiz_id = parse_aggregate_id(&id)?;
    load_user_quiz(&state, user_quiz_id).await?;

    // Run catch-up to ensure the read model includes latest events
    state.projection_processor.run_catch_up().await?;

    let attempts = state
        .history
        .attempts_for_user_quiz(user_quiz_id)
        .await
        .into_iter()
        .map(AttemptSummaryResponse::from)
        .collect();

    Ok(Json(attempts))
}

/// GET /results/{id}
#[tracing::instrument(skip(state))]
pub async fn get_result<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<ResultResponse>, ApiError> {
    let result_id = parse_aggregate_id(&id)?;
    let result = state
        .attempts
        .get_result(result_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Result {id} not found")))?;

    Ok(Json(ResultResponse::from_aggregate(result_id, &result)))
}

async fn load_user_quiz<S: EventStore + Clone>(
    state: &AppState<S>,
    user_quiz_id: AggregateId,
) -> Result<UserQuiz, ApiError> {
    state
        .attempts
        .get_user_quiz(user_quiz_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("User quiz {user_quiz_id} not found")))
}

fn parse_aggregate_id(id: &str) -> Result<AggregateId, ApiError> {
    let uuid = uuid::Uuid::parse_str(id)
        .map_err(|e| ApiError::BadRequest(format!("Invalid ID format: {e}")))?;
    Ok(AggregateId::from(uuid))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_rejects_garbage() {
        assert!(matches!(
            parse_aggregate_id("not-a-uuid"),
            Err(ApiError::BadRequest(_))
        ));
    }

    #[test]
    fn submit_request_reads_camel_case() {
        let json = serde_json::json!({
            "answers": [{
                "questionType": "TrueFalse",
                "questionId": uuid::Uuid::new_v4(),
                "selectedChoiceIds": [uuid::Uuid::new_v4()]
            }]
        });

        let req: SubmitRequest = serde_json::from_value(json).unwrap();

        assert!(req.result_id.is_none());
        assert_eq!(req.answers.len(), 1);
        assert!(req.metadata.is_empty());
    }
}
