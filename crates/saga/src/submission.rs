//! The synchronous submission entry point.

use std::collections::HashMap;
use std::sync::Arc;

use common::AggregateId;
use domain::{Aggregate, AttemptService, StartResult, SubmitAnswers};
use event_store::EventStore;
use messaging::{Answer, Publisher, PublisherExt};

use crate::error::{Result, SagaError};

/// A student's answers for one attempt.
#[derive(Debug, Clone)]
pub struct SubmitQuiz {
    pub user_quiz_id: AggregateId,
    /// A result already opened for this attempt; a new one is started if
    /// absent.
    pub result_id: Option<AggregateId>,
    pub answers: Vec<Answer>,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl SubmitQuiz {
    pub fn new(user_quiz_id: AggregateId, answers: Vec<Answer>) -> Self {
        Self {
            user_quiz_id,
            result_id: None,
            answers,
            metadata: HashMap::new(),
        }
    }

    pub fn for_result(mut self, result_id: AggregateId) -> Self {
        self.result_id = Some(result_id);
        self
    }

    pub fn with_metadata(mut self, metadata: HashMap<String, serde_json::Value>) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Returned once answers are stored and handed to grading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Accepted {
    pub result_id: AggregateId,
    pub attempt_number: u32,
}

/// Records submissions and publishes them for grading.
pub struct SubmissionService<S: EventStore, P> {
    attempts: Arc<AttemptService<S>>,
    publisher: P,
}

impl<S, P> SubmissionService<S, P>
where
    S: EventStore + Clone,
    P: Publisher,
{
    pub fn new(attempts: Arc<AttemptService<S>>, publisher: P) -> Self {
        Self {
            attempts,
            publisher,
        }
    }

    /// Stores the answers as a Pending result and publishes `QuizSubmitted`.
    ///
    /// Grading happens later. If publishing fails the result stays Pending
    /// and is republished by reconciliation.
    #[tracing::instrument(
        skip(self, cmd),
        fields(user_quiz_id = %cmd.user_quiz_id, answers = cmd.answers.len())
    )]
    pub async fn submit(&self, cmd: SubmitQuiz) -> Result<Accepted> {
        let SubmitQuiz {
            user_quiz_id,
            result_id,
            answers,
            metadata,
        } = cmd;

        if self.attempts.get_user_quiz(user_quiz_id).await?.is_none() {
            return Err(SagaError::UserQuizNotFound(user_quiz_id));
        }

        let result_id = match result_id {
            Some(result_id) => {
                let result = self
                    .attempts
                    .get_result(result_id)
                    .await?
                    .ok_or(SagaError::ResultNotFound(result_id))?;
                if result.user_quiz_id() != Some(user_quiz_id) {
                    return Err(SagaError::ResultNotFound(result_id));
                }
                result_id
            }
            None => {
                let started = self
                    .attempts
                    .start_result(StartResult::for_user_quiz(user_quiz_id))
                    .await?;
                started.id().ok_or(SagaError::UserQuizNotFound(user_quiz_id))?
            }
        };

        let result = self
            .attempts
            .submit_answers(SubmitAnswers::new(result_id, answers).with_metadata(metadata))
            .await?;

        let submission = result
            .to_submission()
            .ok_or(SagaError::ResultNotFound(result_id))?;

        let message_id = self.publisher.publish(&submission).await.map_err(|e| {
            tracing::warn!(%result_id, error = %e, "Submission stored but not published");
            e
        })?;

        metrics::counter!("quiz_submissions_total").increment(1);
        tracing::info!(
            %result_id,
            %message_id,
            attempt_number = result.attempt_number(),
            "Quiz submitted for grading"
        );

        Ok(Accepted {
            result_id,
            attempt_number: result.attempt_number(),
        })
    }
}
