//! The quiz submission-and-grading saga.
//!
//! ```text
//! client ──► SubmissionService ──QuizSubmitted──► SubmissionConsumer
//!                                                   (grading engine)
//!                                                        │
//!        ResultFinalizationConsumer ◄──QuizGraded────────┘
//!                   │
//!                   └─ first pass ──► ProgressQueue ──► ProgressWorker
//! ```
//!
//! Each step is keyed by a result or user quiz id and is safe to run more
//! than once, so the channel's redelivery doubles as the retry mechanism.
//! [`PendingReconciler`] republishes submissions whose grade never came back.

pub mod error;
pub mod finalization;
pub mod grading_consumer;
pub mod progress;
pub mod reconcile;
pub mod services;
pub mod submission;

pub use error::{Result, SagaError};
pub use finalization::{FinalizationOutcome, ResultFinalizationConsumer};
pub use grading_consumer::{GradingOutcome, SubmissionConsumer};
pub use progress::{ProgressDirty, ProgressQueue, ProgressWorker};
pub use reconcile::{DEFAULT_MAX_REPUBLISH, PendingReconciler, ReconcileReport};
pub use services::{
    CircuitBreaker, CircuitState, CourseProgressRecalculator, HttpProgressRecalculator,
    InMemoryProgressRecalculator, LoggingProgressRecalculator, RetryPolicy,
};
pub use submission::{Accepted, SubmissionService, SubmitQuiz};
