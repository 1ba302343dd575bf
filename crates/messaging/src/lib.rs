//! Asynchronous messaging between the attempt owner and the grading engine.
//!
//! The two services share nothing but the contracts in [`contracts`]. The
//! channel delivers at least once: a handler that fails gets the message
//! again, and a handler that succeeds may still see a duplicate. Handlers
//! are expected to be idempotent.

pub mod broker;
pub mod contracts;
pub mod dispatch;
pub mod envelope;
pub mod error;

pub use broker::{
    DEFAULT_HISTORY_CAPACITY, DEFAULT_MAX_DELIVERIES, DeadLetter, Delivery, InMemoryBroker,
    NackOutcome, Publisher, PublisherExt,
};
pub use contracts::{Answer, GradedQuestion, Message, QuestionType, QuizGraded, QuizSubmitted};
pub use dispatch::{DeliveryContext, DispatchOutcome, MessageHandler, dispatch, drain, run_consumer};
pub use envelope::MessageEnvelope;
pub use error::{MessagingError, Result};
