//! Append-only event log with optimistic concurrency.
//!
//! The attempt owner stores its aggregates as event streams. An append
//! carries the version the writer last saw; a mismatch is rejected, which is
//! how two deliveries of the same message racing on one attempt are kept
//! from both taking effect.

pub mod error;
pub mod event;
pub mod memory;
pub mod postgres;
pub mod store;

pub use common::AggregateId;
pub use error::{EventStoreError, Result};
pub use event::{CAUSATION_ID, EventEnvelope, EventEnvelopeBuilder, EventId, Version};
pub use memory::InMemoryEventStore;
pub use postgres::PostgresEventStore;
pub use store::{AppendOptions, EventStore, EventStoreExt, EventStream};
