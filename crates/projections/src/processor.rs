//! Feeds the global event stream to registered projections.

use event_store::EventStore;
use futures_util::StreamExt;
use tokio::sync::Mutex;

use crate::Result;
use crate::projection::Projection;

/// Replays the store into projections, delivering each event once.
///
/// Positions are counts of events seen, so catch-up can run on a timer or
/// in front of a query without double-applying anything.
pub struct ProjectionProcessor<S: EventStore> {
    store: S,
    projections: Vec<Box<dyn Projection>>,
    // Held for a whole catch-up: positions are read once up front.
    catch_up: Mutex<()>,
}

impl<S: EventStore> ProjectionProcessor<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            projections: Vec::new(),
            catch_up: Mutex::new(()),
        }
    }

    pub fn register(&mut self, projection: Box<dyn Projection>) {
        self.projections.push(projection);
    }

    pub fn projection_count(&self) -> usize {
        self.projections.len()
    }

    /// Delivers every event a projection has not seen yet. Returns how
    /// many deliveries were made across all projections.
    #[tracing::instrument(skip(self))]
    pub async fn run_catch_up(&self) -> Result<u64> {
        let _guard = self.catch_up.lock().await;

        let mut seen = Vec::with_capacity(self.projections.len());
        for projection in &self.projections {
            seen.push(projection.position().await.events_processed);
        }
        let behind = seen.iter().copied().min().unwrap_or(0);

        let mut stream = self.store.stream_all_events().await?;
        let mut index: u64 = 0;
        let mut delivered: u64 = 0;

        while let Some(event) = stream.next().await {
            let event = event?;
            index += 1;
            if index <= behind {
                continue;
            }

            for (projection, seen) in self.projections.iter().zip(&seen) {
                if index > *seen {
                    projection.handle(&event).await?;
                    delivered += 1;
                }
            }
        }

        if delivered > 0 {
            metrics::counter!("projections_events_processed").increment(delivered);
            tracing::debug!(delivered, total_events = index, "Catch-up complete");
        }
        Ok(delivered)
    }

    /// Clears every projection and replays the store from the start.
    #[tracing::instrument(skip(self))]
    pub async fn rebuild_all(&self) -> Result<u64> {
        for projection in &self.projections {
            tracing::info!(projection = projection.name(), "Resetting projection");
            projection.reset().await?;
        }
        self.run_catch_up().await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use common::{CourseId, QuizId, UserId};
    use domain::{Aggregate, AttemptService, CreateAttempt, StartResult};
    use event_store::{EventEnvelope, InMemoryEventStore};
    use tokio::sync::RwLock;

    use super::*;
    use crate::projection::ProjectionPosition;
    use crate::{AttemptHistoryView, ProjectionError};

    /// Records event types; fails on the configured one.
    #[derive(Clone, Default)]
    struct EventLog {
        seen: Arc<RwLock<Vec<String>>>,
        fail_on: Option<&'static str>,
    }

    #[async_trait]
    impl Projection for EventLog {
        fn name(&self) -> &'static str {
            "EventLog"
        }

        async fn handle(&self, event: &EventEnvelope) -> Result<()> {
            if self.fail_on == Some(event.event_type.as_str()) {
                return Err(ProjectionError::Projection(format!("refused {}", event.event_type)));
            }
            self.seen.write().await.push(event.event_type.clone());
            Ok(())
        }

        async fn position(&self) -> ProjectionPosition {
            ProjectionPosition {
                events_processed: self.seen.read().await.len() as u64,
            }
        }

        async fn reset(&self) -> Result<()> {
            self.seen.write().await.clear();
            Ok(())
        }
    }

    /// One attempt with one started result: three events.
    async fn seeded_store() -> InMemoryEventStore {
        let store = InMemoryEventStore::new();
        let service = AttemptService::new(store.clone());
        let user_quiz = service
            .create_attempt(CreateAttempt::new(UserId::new(), QuizId::new(), CourseId::new()))
            .await
            .unwrap();
        service
            .start_result(StartResult::for_user_quiz(user_quiz.id().unwrap()))
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn catch_up_delivers_every_stored_event() {
        let log = EventLog::default();
        let mut processor = ProjectionProcessor::new(seeded_store().await);
        processor.register(Box::new(log.clone()));

        assert_eq!(processor.run_catch_up().await.unwrap(), 3);
        assert_eq!(
            *log.seen.read().await,
            vec!["UserQuizCreated", "ResultStarted", "ResultOpened"]
        );
    }

    #[tokio::test]
    async fn repeated_catch_up_only_delivers_new_events() {
        let store = seeded_store().await;
        let log = EventLog::default();
        let mut processor = ProjectionProcessor::new(store.clone());
        processor.register(Box::new(log.clone()));
        processor.run_catch_up().await.unwrap();

        assert_eq!(processor.run_catch_up().await.unwrap(), 0);

        AttemptService::new(store)
            .create_attempt(CreateAttempt::new(UserId::new(), QuizId::new(), CourseId::new()))
            .await
            .unwrap();
        assert_eq!(processor.run_catch_up().await.unwrap(), 1);
        assert_eq!(log.seen.read().await.len(), 4);
    }

    #[tokio::test]
    async fn late_registered_projection_is_brought_up_to_date() {
        let store = seeded_store().await;
        let early = EventLog::default();
        early.seen.write().await.extend(["a", "b", "c"].map(String::from));
        let late = AttemptHistoryView::new();

        let mut processor = ProjectionProcessor::new(store);
        processor.register(Box::new(early.clone()));
        processor.register(Box::new(late.clone()));

        assert_eq!(processor.run_catch_up().await.unwrap(), 3);
        assert_eq!(early.seen.read().await.len(), 3);
        assert_eq!(late.position().await.events_processed, 3);
        assert_eq!(late.result_count().await, 1);
    }

    #[tokio::test]
    async fn failing_projection_stops_catch_up_and_resumes_later() {
        let store = seeded_store().await;
        let mut log = EventLog {
            fail_on: Some("ResultOpened"),
            ..EventLog::default()
        };
        let mut processor = ProjectionProcessor::new(store.clone());
        processor.register(Box::new(log.clone()));

        assert!(processor.run_catch_up().await.is_err());
        assert_eq!(log.seen.read().await.len(), 2);

        log.fail_on = None;
        let mut processor = ProjectionProcessor::new(store);
        processor.register(Box::new(log.clone()));
        assert_eq!(processor.run_catch_up().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn rebuild_replays_from_scratch() {
        let log = EventLog::default();
        let mut processor = ProjectionProcessor::new(seeded_store().await);
        processor.register(Box::new(log.clone()));
        processor.run_catch_up().await.unwrap();

        assert_eq!(processor.rebuild_all().await.unwrap(), 3);
        assert_eq!(log.seen.read().await.len(), 3);
    }

    #[tokio::test]
    async fn empty_store_is_a_no_op() {
        let mut processor = ProjectionProcessor::new(InMemoryEventStore::new());
        processor.register(Box::new(EventLog::default()));

        assert_eq!(processor.run_catch_up().await.unwrap(), 0);
        assert_eq!(processor.projection_count(), 1);
    }
}
