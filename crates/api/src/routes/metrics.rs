//! Prometheus metrics endpoint.

use axum::extract::State;
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use messaging::{InMemoryBroker, Message, QuizGraded, QuizSubmitted};
use metrics_exporter_prometheus::PrometheusHandle;

#[derive(Clone)]
pub struct MetricsState {
    pub handle: PrometheusHandle,
    pub broker: InMemoryBroker,
}

/// GET /metrics: refreshes the channel backlog gauges, then renders.
pub async fn get(State(state): State<MetricsState>) -> impl IntoResponse {
    for topic in [QuizSubmitted::TOPIC, QuizGraded::TOPIC] {
        metrics::gauge!("messages_pending", "topic" => topic).set(state.broker.pending(topic) as f64);
    }
    metrics::gauge!("messages_dead_letters").set(state.broker.dead_letter_count() as f64);

    (
        StatusCode::OK,
        [(CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        state.handle.render(),
    )
}
