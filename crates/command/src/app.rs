use axum::routing::{get, patch, post};
use axum::Router;
use serde::Serialize;
use sqlx::SqlitePool;
use todoflow_shared::sidecar::{EventPublisher, JobsClient};
use todoflow_shared::IdempotencyGuard;

use crate::routes;

#[derive(Clone)]
pub struct AppState {
    pub read_pool: SqlitePool,
    pub write_pool: SqlitePool,
    pub publisher: EventPublisher,
    pub jobs: JobsClient,
    pub idempotency: IdempotencyGuard,
    pub jwt_secret: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/api/tasks", post(routes::tasks::create).get(routes::tasks::list))
        .route(
            "/api/tasks/{id}",
            get(routes::tasks::fetch)
                .put(routes::tasks::update)
                .delete(routes::tasks::remove),
        )
        .route("/api/tasks/{id}/complete", patch(routes::tasks::complete))
        .route(
            "/api/tasks/{id}/reminder",
            post(routes::reminders::attach).delete(routes::reminders::detach),
        )
        .route("/api/recurrence-rules", post(routes::recurrence_rules::create))
        .route(
            "/api/recurrence-rules/{id}",
            get(routes::recurrence_rules::fetch)
                .patch(routes::recurrence_rules::update)
                .delete(routes::recurrence_rules::remove),
        )
        .route("/events/reminder-events", post(routes::events::reminder_events))
        .with_state(state)
}

/// Publish after the surrounding transaction committed; the response does
/// not wait for the broker and a failed publish is logged, never retried.
pub(crate) fn spawn_publish<T>(publisher: EventPublisher, event_type: &'static str, data: T)
where
    T: Serialize + Send + Sync + 'static,
{
    tokio::spawn(async move {
        if let Err(err) = publisher.publish(event_type, &data).await {
            tracing::error!(event_type, error = %err, "event publish failed");
        }
    });
}
