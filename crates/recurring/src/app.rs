use axum::extract::State;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;

use todoflow_shared::sidecar::EventPublisher;
use todoflow_shared::{Envelope, EventStatus, IdempotencyGuard};

use crate::client::CommandClient;
use crate::handler;

#[derive(Clone)]
pub struct AppState {
    pub command: CommandClient,
    pub publisher: EventPublisher,
    pub idempotency: IdempotencyGuard,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/events/task-events", post(task_events))
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "recurring-service",
    }))
}

async fn task_events(State(state): State<AppState>, Json(envelope): Json<Envelope>) -> EventStatus {
    handler::handle_task_event(&state, envelope).await
}
