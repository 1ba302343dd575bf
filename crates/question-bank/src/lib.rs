//! Question bank and grading engine.
//!
//! This side owns quizzes, questions and their answer keys. It grades a
//! submission without ever touching the attempt store: the only output is
//! a [`GradingReport`], which the saga turns into a `QuizGraded` message.

pub mod answer_key;
pub mod bank;
pub mod error;
pub mod grading;
pub mod model;
pub mod postgres;

pub use answer_key::{AnswerKey, ExpectedAnswer, KeyEntry};
pub use bank::{CatalogFixture, InMemoryQuestionBank, QuestionBank};
pub use error::{QuestionBankError, Result};
pub use grading::{GradingEngine, GradingPolicy, GradingReport};
pub use model::{Question, QuestionChoice, QuestionStatus, Quiz, QuizQuestion, QuizStatus};
pub use postgres::PgQuestionBank;

pub use messaging::QuestionType;
