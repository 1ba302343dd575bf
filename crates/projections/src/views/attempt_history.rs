//! Attempt history read model: one summary per quiz result.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{AggregateId, CourseId, QuizId, UserId};
use domain::{Aggregate, QuizResult, QuizResultEvent, ResultStatus};
use event_store::EventEnvelope;
use tokio::sync::RwLock;

use crate::Result;
use crate::projection::{Projection, ProjectionPosition};

/// Summary of one attempt at a quiz.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptSummary {
    pub result_id: AggregateId,
    pub user_quiz_id: AggregateId,
    pub user_id: UserId,
    pub quiz_id: QuizId,
    pub course_id: CourseId,
    pub attempt_number: u32,
    pub status: ResultStatus,
    pub score: Option<f64>,
    pub percentage_score: Option<f64>,
    pub is_passed: Option<bool>,
    pub started_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub republish_count: u32,
    pub last_republished_at: Option<DateTime<Utc>>,
    /// Reconciliation gave up; the result may still be graded late.
    pub abandoned: bool,
}

struct AttemptHistoryState {
    attempts: HashMap<AggregateId, AttemptSummary>,
    position: ProjectionPosition,
}

/// Read model of every result, queryable by user quiz.
///
/// Lags the event store; anything that acts on what it reports should
/// re-check the aggregate first.
#[derive(Clone)]
pub struct AttemptHistoryView {
    state: Arc<RwLock<AttemptHistoryState>>,
}

impl AttemptHistoryView {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(AttemptHistoryState {
                attempts: HashMap::new(),
                position: ProjectionPosition::zero(),
            })),
        }
    }

    pub async fn result_count(&self) -> usize {
        self.state.read().await.attempts.len()
    }

    pub async fn get(&self, result_id: AggregateId) -> Option<AttemptSummary> {
        self.state.read().await.attempts.get(&result_id).cloned()
    }

    /// Attempts of one user quiz, oldest first.
    pub async fn attempts_for_user_quiz(&self, user_quiz_id: AggregateId) -> Vec<AttemptSummary> {
        let mut attempts: Vec<_> = self
            .state
            .read()
            .await
            .attempts
            .values()
            .filter(|a| a.user_quiz_id == user_quiz_id)
            .cloned()
            .collect();
        attempts.sort_by_key(|a| a.attempt_number);
        attempts
    }

    /// Results still waiting for a grade whose submission was last
    /// published at or before `cutoff`, oldest first. Abandoned results are
    /// left out.
    pub async fn pending_submitted_before(&self, cutoff: DateTime<Utc>) -> Vec<AggregateId> {
        let state = self.state.read().await;
        let mut pending: Vec<_> = state
            .attempts
            .values()
            .filter(|a| a.status == ResultStatus::Pending && !a.abandoned)
            .filter_map(|a| {
                a.last_republished_at
                    .or(a.submitted_at)
                    .filter(|at| *at <= cutoff)
                    .map(|at| (at, a.result_id))
            })
            .collect();
        pending.sort();
        pending.into_iter().map(|(_, id)| id).collect()
    }
}

impl Default for AttemptHistoryView {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Projection for AttemptHistoryView {
    fn name(&self) -> &'static str {
        "AttemptHistoryView"
    }

    async fn handle(&self, event: &EventEnvelope) -> Result<()> {
        if event.aggregate_type != QuizResult::aggregate_type() {
            let mut state = self.state.write().await;
            state.position = state.position.advance();
            return Ok(());
        }

        let result_event: QuizResultEvent = serde_json::from_value(event.payload.clone())?;
        let result_id = event.aggregate_id;

        let mut state = self.state.write().await;

        match result_event {
            QuizResultEvent::ResultOpened(data) => {
                state.attempts.insert(
                    result_id,
                    AttemptSummary {
                        result_id,
                        user_quiz_id: data.user_quiz_id,
                        user_id: data.user_id,
                        quiz_id: data.quiz_id,
                        course_id: data.course_id,
                        attempt_number: data.attempt_number,
                        status: ResultStatus::InProgress,
                        score: None,
                        percentage_score: None,
                        is_passed: None,
                        started_at: data.started_at,
                        submitted_at: None,
                        completed_at: None,
                        republish_count: 0,
                        last_republished_at: None,
                        abandoned: false,
                    },
                );
            }
            QuizResultEvent::AnswersSubmitted(data) => {
                if let Some(attempt) = state.attempts.get_mut(&result_id) {
                    attempt.status = ResultStatus::Pending;
                    attempt.submitted_at = Some(data.submitted_at);
                }
            }
            QuizResultEvent::ResultGraded(data) => {
                if let Some(attempt) = state.attempts.get_mut(&result_id) {
                    attempt.status = ResultStatus::Completed;
                    attempt.score = Some(data.score);
                    attempt.percentage_score = Some(data.percentage_score);
                    attempt.is_passed = Some(data.is_passed);
                    attempt.completed_at = Some(data.completed_at);
                }
            }
            QuizResultEvent::SubmissionRepublished(data) => {
                if let Some(attempt) = state.attempts.get_mut(&result_id) {
                    attempt.republish_count = data.republish_count;
                    attempt.last_republished_at = Some(data.republished_at);
                }
            }
            QuizResultEvent::SubmissionAbandoned(data) => {
                if let Some(attempt) = state.attempts.get_mut(&result_id) {
                    attempt.republish_count = data.republish_count;
                    attempt.abandoned = true;
                }
            }
        }

        state.position = state.position.advance();
        Ok(())
    }

    async fn position(&self) -> ProjectionPosition {
        self.state.read().await.position
    }

    async fn reset(&self) -> Result<()> {
        let mut state = self.state.write().await;
        state.attempts.clear();
        state.position = ProjectionPosition::zero();
        Ok(())
    }
}
