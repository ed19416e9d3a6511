use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use todoflow_shared::events;

use crate::app::{spawn_publish, AppState};
use crate::auth::AuthUser;
use crate::error::CommandError;
use crate::model::{Reminder, Task};
use crate::repository;
use crate::routes::ReminderResponse;
use crate::validate;

#[derive(Debug, Deserialize)]
pub struct AttachReminderRequest {
    pub trigger_time: String,
}

/// `POST /api/tasks/{id}/reminder` — create a pending reminder, hand the
/// one-shot job to the scheduler, and announce `reminder.scheduled.v1`.
pub async fn attach(
    State(state): State<AppState>,
    user: AuthUser,
    Path(task_id): Path<i64>,
    Json(req): Json<AttachReminderRequest>,
) -> Result<(StatusCode, Json<ReminderResponse>), CommandError> {
    let trigger_time = validate::timestamp("trigger_time", &req.trigger_time)?;

    let task = repository::fetch_task(&state.read_pool, &user.user_id, task_id)
        .await?
        .ok_or(CommandError::NotFound)?;

    let reminder = schedule_reminder(&state, &task, trigger_time).await?;

    Ok((StatusCode::CREATED, Json(reminder.into())))
}

/// `DELETE /api/tasks/{id}/reminder` — cancel the scheduler job and drop the
/// pending reminder.
pub async fn detach(
    State(state): State<AppState>,
    user: AuthUser,
    Path(task_id): Path<i64>,
) -> Result<StatusCode, CommandError> {
    let reminder =
        repository::fetch_pending_reminder_for_task(&state.read_pool, &user.user_id, task_id)
            .await?
            .ok_or(CommandError::NotFound)?;

    if let Err(err) = state.jobs.cancel(&reminder.job_name).await {
        tracing::error!(job = %reminder.job_name, error = %err, "failed to cancel reminder job");
    }
    repository::delete_reminder(&state.write_pool, reminder.id).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Create-and-schedule used both by `attach` and by task creation with an
/// inline `reminder_time`. Returns the refreshed task.
pub(crate) async fn schedule_for_task(
    state: &AppState,
    task: &Task,
    trigger_time: DateTime<Utc>,
) -> Result<Task, CommandError> {
    schedule_reminder(state, task, trigger_time).await?;
    repository::fetch_task(&state.read_pool, &task.user_id, task.id)
        .await?
        .ok_or(CommandError::NotFound)
}

async fn schedule_reminder(
    state: &AppState,
    task: &Task,
    trigger_time: DateTime<Utc>,
) -> Result<Reminder, CommandError> {
    let reminder =
        repository::insert_reminder(&state.write_pool, task.id, &task.user_id, trigger_time)
            .await?;

    if let Err(err) = state
        .jobs
        .schedule(&reminder.job_name, trigger_time, &reminder.job_payload())
        .await
    {
        tracing::error!(job = %reminder.job_name, error = %err, "failed to schedule reminder job");
    }

    spawn_publish(
        state.publisher.clone(),
        events::REMINDER_SCHEDULED,
        events::ReminderScheduled {
            reminder_id: reminder.id.to_string(),
            task_id: task.id.to_string(),
            user_id: task.user_id.clone(),
            trigger_time: trigger_time.to_rfc3339(),
        },
    );

    Ok(reminder)
}
