//! Attempt owner domain.
//!
//! - [`Aggregate`] and [`DomainEvent`] for event-sourced entities
//! - [`CommandHandler`] for load, decide, append
//! - the [`UserQuiz`] and [`QuizResult`] aggregates with [`AttemptService`]

pub mod aggregate;
pub mod attempt;
pub mod command;
pub mod error;

pub use aggregate::{Aggregate, DomainEvent};
pub use attempt::{
    AbandonSubmission, AttemptError, AttemptService, CreateAttempt, MarkRepublished, QuizResult,
    QuizResultEvent, RecordResultGrade, RecordUserQuizGrade, ResultStatus, RetakeAttempt,
    StartResult, SubmitAnswers, UserQuiz, UserQuizEvent, UserQuizStatus,
};
pub use command::{Command, CommandHandler, CommandResult};
pub use error::DomainError;
