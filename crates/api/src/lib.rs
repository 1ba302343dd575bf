//! HTTP front of the attempt owner.
//!
//! Exposes attempts, submissions, and results over REST, runs the saga's
//! background workers, and reports through tracing and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;
pub mod workers;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use domain::AttemptService;
use event_store::EventStore;
use messaging::InMemoryBroker;
use metrics_exporter_prometheus::PrometheusHandle;
use projections::{AttemptHistoryView, Projection, ProjectionProcessor};
use saga::{CircuitBreaker, SubmissionService};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::attempts::{self, AppState};
use routes::metrics::MetricsState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: EventStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(MetricsState {
            handle: metrics_handle,
            broker: state.broker.clone(),
        });

    Router::new()
        .route("/health", get(routes::health::check::<S>))
        .route("/attempts", post(attempts::create::<S>))
        .route("/attempts/{id}", get(attempts::get::<S>))
        .route("/attempts/{id}/retake", post(attempts::retake::<S>))
        .route(
            "/attempts/{id}/results",
            post(attempts::start_result::<S>).get(attempts::history::<S>),
        )
        .route("/attempts/{id}/submissions", post(attempts::submit::<S>))
        .route("/results/{id}", get(attempts::get_result::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Wires the attempt service, submission path, and history projection
/// over one store and one broker.
pub fn create_default_state<S: EventStore + Clone + 'static>(
    event_store: S,
    broker: InMemoryBroker,
) -> Arc<AppState<S>> {
    let attempts = Arc::new(AttemptService::new(event_store.clone()));
    let submissions = SubmissionService::new(attempts.clone(), broker.clone());

    let history = AttemptHistoryView::new();
    let mut processor = ProjectionProcessor::new(event_store);
    processor.register(Box::new(history.clone()) as Box<dyn Projection>);

    Arc::new(AppState {
        attempts,
        submissions,
        history,
        projection_processor: Arc::new(processor),
        broker,
        progress_breaker: CircuitBreaker::default(),
    })
}
