//! Recovery for submissions whose grade never came back.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::AggregateId;
use domain::{AbandonSubmission, AttemptService, MarkRepublished, QuizResult, ResultStatus};
use event_store::EventStore;
use messaging::{Publisher, PublisherExt};

use crate::error::Result;

/// Default number of times a stuck submission is republished.
pub const DEFAULT_MAX_REPUBLISH: u32 = 3;

/// What one reconciliation pass did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileReport {
    pub republished: Vec<AggregateId>,
    /// Results abandoned by this pass. They stay Pending but are not
    /// republished again.
    pub abandoned: Vec<AggregateId>,
    /// Candidates that were missing, no longer Pending, already abandoned,
    /// or published too recently.
    pub skipped: usize,
}

/// Republishes `QuizSubmitted` for results stuck in Pending.
pub struct PendingReconciler<S: EventStore, P> {
    attempts: Arc<AttemptService<S>>,
    publisher: P,
    max_republish: u32,
}

impl<S, P> PendingReconciler<S, P>
where
    S: EventStore + Clone,
    P: Publisher,
{
    pub fn new(attempts: Arc<AttemptService<S>>, publisher: P) -> Self {
        Self {
            attempts,
            publisher,
            max_republish: DEFAULT_MAX_REPUBLISH,
        }
    }

    pub fn with_max_republish(mut self, max_republish: u32) -> Self {
        self.max_republish = max_republish;
        self
    }

    /// Re-checks each candidate against the store and republishes those
    /// still Pending whose last publish was at or before `cutoff`.
    ///
    /// Candidates usually come from a read model, which may lag; the store
    /// is the authority on whether a result is still Pending.
    #[tracing::instrument(skip(self, candidates))]
    pub async fn reconcile(
        &self,
        candidates: impl IntoIterator<Item = AggregateId>,
        cutoff: DateTime<Utc>,
    ) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::default();

        for result_id in candidates {
            let Some(result) = self.attempts.get_result(result_id).await? else {
                report.skipped += 1;
                continue;
            };
            if !is_stuck(&result, cutoff) {
                report.skipped += 1;
                continue;
            }

            if result.republish_count() >= self.max_republish {
                let abandoned = self
                    .attempts
                    .abandon_submission(AbandonSubmission { result_id })
                    .await?;
                if abandoned.events.is_empty() {
                    report.skipped += 1;
                    continue;
                }

                tracing::error!(
                    %result_id,
                    republished = result.republish_count(),
                    "Submission abandoned after repeated republishes"
                );
                metrics::counter!("quiz_submissions_abandoned_total").increment(1);
                report.abandoned.push(result_id);
                continue;
            }

            let Some(submission) = result.to_submission() else {
                report.skipped += 1;
                continue;
            };

            self.publisher.publish(&submission).await?;
            self.attempts
                .mark_republished(MarkRepublished { result_id })
                .await?;

            metrics::counter!("quiz_submissions_republished_total").increment(1);
            tracing::info!(
                %result_id,
                attempt = result.republish_count() + 1,
                "Republished stuck submission"
            );
            report.republished.push(result_id);
        }

        Ok(report)
    }
}

fn is_stuck(result: &QuizResult, cutoff: DateTime<Utc>) -> bool {
    result.status() == ResultStatus::Pending
        && !result.is_abandoned()
        && result.last_published_at().is_some_and(|at| at <= cutoff)
}
