//! Saga error types.

use common::AggregateId;
use domain::DomainError;
use event_store::EventStoreError;
use messaging::MessagingError;
use question_bank::QuestionBankError;
use thiserror::Error;

/// Errors that can occur during saga operations.
#[derive(Debug, Error)]
pub enum SagaError {
    #[error("User quiz not found: {0}")]
    UserQuizNotFound(AggregateId),

    #[error("Result not found: {0}")]
    ResultNotFound(AggregateId),

    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),

    #[error("Question bank error: {0}")]
    QuestionBank(#[from] QuestionBankError),

    #[error("Messaging error: {0}")]
    Messaging(#[from] MessagingError),

    /// The course progress service rejected or failed a call.
    #[error("Progress service error: {0}")]
    ProgressService(String),

    /// Calls are short-circuited until the breaker half-opens.
    #[error("Circuit breaker is open")]
    CircuitOpen,
}

impl SagaError {
    /// Returns true when the error means the thing asked for does not exist.
    pub fn is_not_found(&self) -> bool {
        match self {
            SagaError::UserQuizNotFound(_) | SagaError::ResultNotFound(_) => true,
            SagaError::Domain(e) => e.is_not_found(),
            _ => false,
        }
    }

    /// Returns false for errors that another immediate attempt cannot fix.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, SagaError::CircuitOpen) && !self.is_not_found()
    }
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;
