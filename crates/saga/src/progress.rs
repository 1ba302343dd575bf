//! Best-effort course progress recalculation.
//!
//! Finalization never calls the course service itself. It drops a
//! [`ProgressDirty`] marker on the [`ProgressQueue`] and moves on; the
//! [`ProgressWorker`] picks markers up and retries behind a circuit breaker.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::{AggregateId, CourseId, UserId};
use tokio::sync::{mpsc, watch};

use crate::error::{Result, SagaError};
use crate::services::{CircuitBreaker, CourseProgressRecalculator, RetryPolicy};

/// A user's course progress is out of date.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressDirty {
    pub course_id: CourseId,
    pub user_id: UserId,
    pub user_quiz_id: AggregateId,
    pub marked_at: DateTime<Utc>,
}

impl ProgressDirty {
    pub fn new(course_id: CourseId, user_id: UserId, user_quiz_id: AggregateId) -> Self {
        Self {
            course_id,
            user_id,
            user_quiz_id,
            marked_at: Utc::now(),
        }
    }
}

/// Sending half of the progress queue.
#[derive(Debug, Clone)]
pub struct ProgressQueue {
    sender: mpsc::UnboundedSender<ProgressDirty>,
}

impl ProgressQueue {
    /// Creates a queue and the receiver a [`ProgressWorker`] consumes.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProgressDirty>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    pub fn enqueue(&self, marker: ProgressDirty) -> Result<()> {
        self.sender
            .send(marker)
            .map_err(|_| SagaError::ProgressService("progress queue closed".to_string()))
    }
}

/// Drains [`ProgressDirty`] markers into the recalculator.
pub struct ProgressWorker {
    receiver: mpsc::UnboundedReceiver<ProgressDirty>,
    recalculator: Arc<dyn CourseProgressRecalculator>,
    retry: RetryPolicy,
    breaker: CircuitBreaker,
}

impl ProgressWorker {
    pub fn new(
        receiver: mpsc::UnboundedReceiver<ProgressDirty>,
        recalculator: Arc<dyn CourseProgressRecalculator>,
    ) -> Self {
        Self {
            receiver,
            recalculator,
            retry: RetryPolicy::default(),
            breaker: CircuitBreaker::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_breaker(mut self, breaker: CircuitBreaker) -> Self {
        self.breaker = breaker;
        self
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Processes markers until shutdown or until every queue handle is gone.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!("Progress worker started");
        loop {
            tokio::select! {
                marker = self.receiver.recv() => match marker {
                    Some(marker) => {
                        self.process(&marker).await;
                    }
                    None => break,
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        tracing::info!("Progress worker stopped");
    }

    /// Processes every marker already queued. Returns how many were handled.
    pub async fn drain(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(marker) = self.receiver.try_recv() {
            self.process(&marker).await;
            handled += 1;
        }
        handled
    }

    /// Recalculates one user's progress. Returns false if it was given up.
    #[tracing::instrument(
        skip(self, marker),
        fields(course_id = %marker.course_id, user_id = %marker.user_id, user_quiz_id = %marker.user_quiz_id)
    )]
    pub async fn process(&self, marker: &ProgressDirty) -> bool {
        let recalculator = &self.recalculator;
        let breaker = &self.breaker;

        let outcome = self
            .retry
            .run(|| {
                breaker.call(|| recalculator.recalculate(marker.course_id, marker.user_id))
            })
            .await;

        match outcome {
            Ok(()) => {
                metrics::counter!("quiz_progress_recalculations_total", "outcome" => "ok")
                    .increment(1);
                tracing::debug!("Course progress recalculated");
                true
            }
            Err(e) => {
                metrics::counter!("quiz_progress_recalculations_total", "outcome" => "dropped")
                    .increment(1);
                tracing::error!(error = %e, "Course progress recalculation dropped");
                false
            }
        }
    }
}
