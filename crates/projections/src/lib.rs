//! Read models and projections for the query side.
//!
//! - [`Projection`] trait for processing events into read models
//! - [`ProjectionProcessor`] for feeding events from the store to projections
//! - [`AttemptHistoryView`], the per-result attempt history

pub mod error;
pub mod processor;
pub mod projection;
pub mod views;

pub use error::{ProjectionError, Result};
pub use processor::ProjectionProcessor;
pub use projection::{Projection, ProjectionPosition};
pub use views::{AttemptHistoryView, AttemptSummary};
