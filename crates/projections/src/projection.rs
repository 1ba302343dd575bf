//! The projection seam and its position counter.

use async_trait::async_trait;
use event_store::EventEnvelope;

use crate::Result;

/// How far into the global event stream a projection has read.
///
/// Every event counts, including ones the projection ignores, so the
/// position lines up with the store's insertion order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct ProjectionPosition {
    pub events_processed: u64,
}

impl ProjectionPosition {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn advance(&self) -> Self {
        Self {
            events_processed: self.events_processed + 1,
        }
    }
}

impl std::fmt::Display for ProjectionPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "position({})", self.events_processed)
    }
}

/// Turns stored events into a query-side view.
///
/// `handle` must advance the position for every event it is given, even
/// those it does not care about.
#[async_trait]
pub trait Projection: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle(&self, event: &EventEnvelope) -> Result<()>;

    async fn position(&self) -> ProjectionPosition;

    /// Drops all state and rewinds to position zero.
    async fn reset(&self) -> Result<()>;
}
