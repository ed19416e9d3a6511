use axum::extract::State;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use sqlx::SqlitePool;

use todoflow_shared::{Envelope, EventStatus, IdempotencyGuard};

use crate::{handler, routes};

#[derive(Clone)]
pub struct AppState {
    pub read_pool: SqlitePool,
    pub write_pool: SqlitePool,
    pub idempotency: IdempotencyGuard,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/audit", get(routes::query_audit_log))
        .route("/events/task-events", post(handle_topic))
        .route("/events/reminder-events", post(handle_topic))
        .route("/events/recurring-events", post(handle_topic))
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "audit-service",
    }))
}

/// All three topics funnel into the same immutable log.
async fn handle_topic(State(state): State<AppState>, Json(envelope): Json<Envelope>) -> EventStatus {
    handler::handle_event(&state, &envelope).await
}
