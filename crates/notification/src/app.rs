use axum::extract::{Path, State};
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;

use todoflow_shared::events::{self, ReminderTriggered};
use todoflow_shared::sidecar::{EventPublisher, JobsClient};
use todoflow_shared::{Envelope, EventStatus, IdempotencyGuard};

use crate::handler;

#[derive(Clone)]
pub struct AppState {
    pub publisher: EventPublisher,
    pub jobs: JobsClient,
    pub idempotency: IdempotencyGuard,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/job/{job_name}", post(job_callback).put(job_callback))
        .route("/events/task-events", post(task_events))
        .route("/events/reminder-events", post(reminder_events))
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "notification-service",
    }))
}

/// Scheduler callback body: the job payload arrives wrapped under `data`,
/// but a bare payload is accepted too.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum JobCallbackBody {
    Wrapped { data: ReminderTriggered },
    Bare(ReminderTriggered),
}

impl JobCallbackBody {
    fn into_payload(self) -> ReminderTriggered {
        match self {
            JobCallbackBody::Wrapped { data } => data,
            JobCallbackBody::Bare(payload) => payload,
        }
    }
}

async fn job_callback(
    State(state): State<AppState>,
    Path(job_name): Path<String>,
    Json(body): Json<JobCallbackBody>,
) -> EventStatus {
    handler::handle_job_callback(&state, &job_name, body.into_payload()).await;
    EventStatus::Success
}

async fn task_events(State(state): State<AppState>, Json(envelope): Json<Envelope>) -> EventStatus {
    if envelope.event_type == events::TASK_DELETED {
        return handler::handle_task_deleted(&state, &envelope).await;
    }
    tracing::debug!(event_type = %envelope.event_type, "ignoring task event");
    EventStatus::Success
}

async fn reminder_events(
    State(state): State<AppState>,
    Json(envelope): Json<Envelope>,
) -> EventStatus {
    if envelope.event_type == events::REMINDER_SCHEDULED {
        return handler::handle_reminder_scheduled(&state, &envelope).await;
    }
    // triggered / delivered / failed originate here; nothing to observe.
    tracing::debug!(event_type = %envelope.event_type, "ignoring reminder event");
    EventStatus::Success
}
