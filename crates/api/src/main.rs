//! API server entry point.

use std::error::Error;
use std::sync::Arc;

use api::config::Config;
use api::workers::{self, ReconcileSchedule};
use event_store::{EventStore, InMemoryEventStore, PostgresEventStore};
use messaging::InMemoryBroker;
use metrics_exporter_prometheus::PrometheusHandle;
use question_bank::{
    GradingEngine, GradingPolicy, InMemoryQuestionBank, PgQuestionBank, QuestionBank,
};
use saga::{CourseProgressRecalculator, HttpProgressRecalculator, LoggingProgressRecalculator};
use tokio::signal;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

type BoxError = Box<dyn Error + Send + Sync>;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let config = Config::from_env();

    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder()?;

    // 3. Pick the progress service
    let recalculator: Arc<dyn CourseProgressRecalculator> = match &config.progress_service_url {
        Some(url) => Arc::new(HttpProgressRecalculator::new(url.clone())),
        None => {
            tracing::warn!("PROGRESS_SERVICE_URL not set, progress recalculations are only logged");
            Arc::new(LoggingProgressRecalculator)
        }
    };

    // 4. Pick the stores and run
    match &config.database_url {
        Some(url) => {
            let store = PostgresEventStore::connect(url).await?;
            let bank = PgQuestionBank::new(store.pool().clone());
            tracing::info!("using PostgreSQL event store and question bank");
            serve(config, store, bank, recalculator, metrics_handle).await
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory stores");
            let bank = in_memory_bank(&config).await?;
            serve(config, InMemoryEventStore::new(), bank, recalculator, metrics_handle).await
        }
    }
}

async fn in_memory_bank(config: &Config) -> Result<InMemoryQuestionBank, BoxError> {
    match &config.question_bank_fixture {
        Some(path) => {
            let json = tokio::fs::read_to_string(path).await?;
            Ok(InMemoryQuestionBank::from_fixture_json(&json)?)
        }
        None => {
            tracing::warn!(
                "QUESTION_BANK_FIXTURE not set, the question bank is empty and every \
                 submission will fail grading with quiz not found"
            );
            Ok(InMemoryQuestionBank::new())
        }
    }
}

async fn serve<S, B>(
    config: Config,
    store: S,
    bank: B,
    recalculator: Arc<dyn CourseProgressRecalculator>,
    metrics_handle: PrometheusHandle,
) -> Result<(), BoxError>
where
    S: EventStore + Clone + 'static,
    B: QuestionBank + 'static,
{
    let broker =
        InMemoryBroker::new(config.max_deliveries).with_history_capacity(config.broker_history);
    let state = api::create_default_state(store, broker);

    // Replay existing events into the history view
    state.projection_processor.run_catch_up().await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let engine = GradingEngine::new(GradingPolicy::new(config.passing_percentage));
    let schedule = ReconcileSchedule {
        interval: config.reconcile_interval,
        pending_timeout: config.pending_timeout,
    };
    let tasks = workers::spawn(&state, bank, engine, recalculator, schedule, shutdown_rx);

    let app = api::create_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, passing_percentage = config.passing_percentage, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop the workers and let in-flight deliveries settle
    let _ = shutdown_tx.send(true);
    for task in tasks {
        if let Err(e) = task.await {
            tracing::error!(error = %e, "background task panicked");
        }
    }

    tracing::info!("server shut down gracefully");
    Ok(())
}
