//! Background tasks of the saga: both consumers, the progress worker, and
//! the periodic reconciliation pass.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use event_store::EventStore;
use messaging::{InMemoryBroker, run_consumer};
use question_bank::{GradingEngine, QuestionBank};
use saga::{
    CourseProgressRecalculator, PendingReconciler, ProgressQueue, ProgressWorker,
    ResultFinalizationConsumer, SubmissionConsumer,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::routes::attempts::AppState;

/// How often stuck submissions are looked for, and how old they must be.
#[derive(Debug, Clone, Copy)]
pub struct ReconcileSchedule {
    pub interval: Duration,
    pub pending_timeout: Duration,
}

/// Spawns every background task. Each one stops when `shutdown` flips to
/// true; await the returned handles to let in-flight work finish.
pub fn spawn<S, B>(
    state: &Arc<AppState<S>>,
    bank: B,
    engine: GradingEngine,
    recalculator: Arc<dyn CourseProgressRecalculator>,
    schedule: ReconcileSchedule,
    shutdown: watch::Receiver<bool>,
) -> Vec<JoinHandle<()>>
where
    S: EventStore + Clone + 'static,
    B: QuestionBank + 'static,
{
    let broker = state.broker.clone();
    let (queue, receiver) = ProgressQueue::channel();

    let grading = Arc::new(SubmissionConsumer::new(bank, broker.clone(), engine));
    let finalization = Arc::new(ResultFinalizationConsumer::new(
        state.attempts.clone(),
        queue,
    ));
    let progress = ProgressWorker::new(receiver, recalculator)
        .with_breaker(state.progress_breaker.clone());

    vec![
        tokio::spawn(run_consumer(broker.clone(), grading, shutdown.clone())),
        tokio::spawn(run_consumer(broker, finalization, shutdown.clone())),
        tokio::spawn(progress.run(shutdown.clone())),
        tokio::spawn(reconcile_loop(state.clone(), schedule, shutdown)),
    ]
}

async fn reconcile_loop<S: EventStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    schedule: ReconcileSchedule,
    mut shutdown: watch::Receiver<bool>,
) {
    let reconciler = PendingReconciler::new(state.attempts.clone(), state.broker.clone());
    let mut ticker = tokio::time::interval(schedule.interval);
    // The first tick fires immediately; nothing can be stuck at startup.
    ticker.tick().await;

    tracing::info!(interval = ?schedule.interval, "Reconciler started");
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                reconcile_once(&state, &reconciler, schedule.pending_timeout).await;
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    tracing::info!("Reconciler stopped");
}

/// One pass: refresh the history view, then republish what is stuck.
pub async fn reconcile_once<S: EventStore + Clone + 'static>(
    state: &AppState<S>,
    reconciler: &PendingReconciler<S, InMemoryBroker>,
    pending_timeout: Duration,
) {
    if let Err(e) = state.projection_processor.run_catch_up().await {
        tracing::warn!(error = %e, "Catch-up before reconciliation failed");
        return;
    }

    let Some(cutoff) = chrono::Duration::from_std(pending_timeout)
        .ok()
        .and_then(|timeout| Utc::now().checked_sub_signed(timeout))
    else {
        return;
    };
    let candidates = state.history.pending_submitted_before(cutoff).await;
    if candidates.is_empty() {
        return;
    }

    match reconciler.reconcile(candidates, cutoff).await {
        Ok(report) => tracing::info!(
            republished = report.republished.len(),
            abandoned = report.abandoned.len(),
            skipped = report.skipped,
            "Reconciliation pass finished"
        ),
        Err(e) => tracing::warn!(error = %e, "Reconciliation pass failed"),
    }
}
