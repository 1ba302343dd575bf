//! Identifier types shared by every service in the quiz grading saga.

pub mod types;

pub use types::{AggregateId, ChoiceId, CourseId, QuestionId, QuizId, UserId};
