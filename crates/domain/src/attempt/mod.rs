//! Attempt owner aggregates: the user's quiz record and its results.

mod commands;
mod events;
mod result;
mod service;
mod state;
mod user_quiz;

pub use commands::*;
pub use events::{
    AnswersSubmittedData, AttemptRetakenData, GradeRecordedData, QuizResultEvent,
    ResultGradedData, ResultOpenedData, ResultStartedData, SubmissionAbandonedData,
    SubmissionRepublishedData,
    UserQuizCreatedData, UserQuizEvent,
};
pub use result::QuizResult;
pub use service::AttemptService;
pub use state::{ResultStatus, UserQuizStatus};
pub use user_quiz::UserQuiz;

use common::{AggregateId, QuizId, UserId};
use thiserror::Error;

/// Errors raised by the attempt aggregates.
#[derive(Debug, Error)]
pub enum AttemptError {
    /// The user already has a record for this quiz.
    #[error("User {user_id} already has an attempt record for quiz {quiz_id}")]
    AlreadyExists { user_id: UserId, quiz_id: QuizId },

    #[error("User quiz not found")]
    UserQuizNotFound,

    #[error("Result not found")]
    ResultNotFound,

    /// The result id is already used by another user quiz.
    #[error("Result {0} already exists")]
    ResultAlreadyExists(AggregateId),

    /// Every granted attempt already has a result; a retake is needed.
    #[error("No attempt available: all {attempt_count} attempts have been started")]
    NoAttemptAvailable { attempt_count: u32 },

    /// A grade arrived for a result that this user quiz never started.
    #[error("Result {result_id} was not started on user quiz {user_quiz_id}")]
    ResultNotStarted {
        user_quiz_id: AggregateId,
        result_id: AggregateId,
    },

    /// Reconciliation gave up on this submission.
    #[error("Submission for result {0} was abandoned")]
    SubmissionAbandoned(AggregateId),

    #[error("Invalid state transition: cannot {action} a {current} result")]
    InvalidResultTransition {
        current: ResultStatus,
        action: &'static str,
    },
}

impl AttemptError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            AttemptError::UserQuizNotFound | AttemptError::ResultNotFound
        )
    }
}
