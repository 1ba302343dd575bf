//! Read model views for the query side.

pub mod attempt_history;

pub use attempt_history::{AttemptHistoryView, AttemptSummary};
