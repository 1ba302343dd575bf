//! Health check endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use event_store::EventStore;
use messaging::{Message, QuizGraded, QuizSubmitted};
use saga::CircuitState;
use serde::Serialize;

use super::attempts::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub queued_submissions: usize,
    pub queued_grades: usize,
    pub dead_letters: u64,
    pub progress_circuit: &'static str,
}

/// GET /health: channel backlog and progress-service circuit state.
///
/// Reports `degraded` while the progress circuit is open; grading keeps
/// working in that state.
pub async fn check<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Json<HealthResponse> {
    let circuit = state.progress_breaker.state();
    let progress_circuit = match circuit {
        CircuitState::Closed => "closed",
        CircuitState::Open => "open",
        CircuitState::HalfOpen => "half-open",
    };

    Json(HealthResponse {
        status: if circuit == CircuitState::Open {
            "degraded"
        } else {
            "ok"
        },
        queued_submissions: state.broker.pending(QuizSubmitted::TOPIC),
        queued_grades: state.broker.pending(QuizGraded::TOPIC),
        dead_letters: state.broker.dead_letter_count(),
        progress_circuit,
    })
}
