//! Domain error types.

use event_store::EventStoreError;
use thiserror::Error;

use crate::attempt::AttemptError;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),

    /// A command was rejected by an attempt aggregate.
    #[error("Attempt error: {0}")]
    Attempt(#[from] AttemptError),

    #[error("Aggregate not found: {aggregate_type} with id {aggregate_id}")]
    AggregateNotFound {
        aggregate_type: &'static str,
        aggregate_id: String,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DomainError {
    /// Returns true when the target of a command does not exist.
    pub fn is_not_found(&self) -> bool {
        match self {
            DomainError::AggregateNotFound { .. } => true,
            DomainError::Attempt(e) => e.is_not_found(),
            _ => false,
        }
    }

    /// Returns true when another writer changed the aggregate first.
    pub fn is_conflict(&self) -> bool {
        matches!(self, DomainError::EventStore(e) if e.is_conflict())
    }
}
