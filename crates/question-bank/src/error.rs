use common::{QuestionId, QuizId};
use thiserror::Error;

/// Errors raised while loading an answer key.
#[derive(Debug, Error)]
pub enum QuestionBankError {
    /// The quiz lists a question the bank does not have.
    #[error("Quiz {quiz_id} references missing question {question_id}")]
    MissingQuestion {
        quiz_id: QuizId,
        question_id: QuestionId,
    },

    /// A question cannot be graded as stored.
    #[error("Question {question_id} is malformed: {reason}")]
    MalformedQuestion {
        question_id: QuestionId,
        reason: String,
    },

    /// The bank is temporarily unreachable.
    #[error("Question bank unavailable")]
    Unavailable,

    #[error("Invalid catalog fixture: {0}")]
    Fixture(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

pub type Result<T> = std::result::Result<T, QuestionBankError>;
