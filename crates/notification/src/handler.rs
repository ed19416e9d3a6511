//! Reminder lifecycle handlers: scheduler job callbacks plus the two
//! subscriptions that keep timers honest when tasks disappear.

use todoflow_shared::events::{
    self, ReminderDelivered, ReminderFailed, ReminderScheduled, ReminderTriggered, TaskDeleted,
};
use todoflow_shared::{Envelope, EventStatus};

use crate::app::AppState;

/// Scheduler callback for a fired reminder job. Publishes
/// `reminder.triggered.v1` and follows up with the delivery outcome.
pub async fn handle_job_callback(state: &AppState, job_name: &str, payload: ReminderTriggered) {
    tracing::info!(
        job = job_name,
        reminder_id = %payload.reminder_id,
        task_id = %payload.task_id,
        user_id = %payload.user_id,
        "reminder job fired"
    );

    let triggered = state
        .publisher
        .publish(events::REMINDER_TRIGGERED, &payload)
        .await;

    match triggered {
        Ok(envelope) => {
            tracing::info!(event_id = %envelope.id, "reminder.triggered published");
            publish_delivered(state, &payload).await;
        }
        Err(err) => {
            tracing::error!(
                reminder_id = %payload.reminder_id,
                error = %err,
                "failed to publish reminder.triggered"
            );
            publish_failed(state, &payload, "failed to publish triggered event toward gateway")
                .await;
        }
    }
}

async fn publish_delivered(state: &AppState, payload: &ReminderTriggered) {
    let delivered = ReminderDelivered {
        reminder_id: payload.reminder_id.clone(),
        task_id: payload.task_id.clone(),
        user_id: payload.user_id.clone(),
        delivered_via: "websocket".to_owned(),
    };
    if let Err(err) = state
        .publisher
        .publish(events::REMINDER_DELIVERED, &delivered)
        .await
    {
        tracing::error!(
            reminder_id = %payload.reminder_id,
            error = %err,
            "failed to publish reminder.delivered"
        );
    }
}

async fn publish_failed(state: &AppState, payload: &ReminderTriggered, reason: &str) {
    let failed = ReminderFailed {
        reminder_id: payload.reminder_id.clone(),
        task_id: payload.task_id.clone(),
        user_id: payload.user_id.clone(),
        reason: reason.to_owned(),
    };
    if let Err(err) = state
        .publisher
        .publish(events::REMINDER_FAILED, &failed)
        .await
    {
        tracing::error!(
            reminder_id = %payload.reminder_id,
            error = %err,
            "failed to publish reminder.failed"
        );
    }
}

/// `task.deleted.v1`: cancel the task's reminder job so a deleted task never
/// triggers. The job may have fired or been cancelled by the command
/// service already; 404 counts as done.
pub async fn handle_task_deleted(state: &AppState, envelope: &Envelope) -> EventStatus {
    if state.idempotency.is_duplicate(&envelope.id).await {
        tracing::info!(event_id = %envelope.id, "duplicate event skipped");
        return EventStatus::Drop;
    }

    let data: TaskDeleted = match envelope.data_as() {
        Ok(data) => data,
        Err(err) => {
            tracing::error!(event_id = %envelope.id, error = %err, "malformed task.deleted payload");
            state.idempotency.mark_processed(&envelope.id).await;
            return EventStatus::Drop;
        }
    };

    let job_name = format!("reminder-{}", data.task_id);
    if let Err(err) = state.jobs.cancel(&job_name).await {
        if err.is_transient() {
            tracing::warn!(job = %job_name, error = %err, "scheduler unreachable, retrying");
            return EventStatus::Retry;
        }
        tracing::error!(job = %job_name, error = %err, "failed to cancel reminder job");
    }

    state.idempotency.mark_processed(&envelope.id).await;
    EventStatus::Success
}

/// `reminder.scheduled.v1`: the command service already owns the scheduling;
/// this consumer just records the observation.
pub async fn handle_reminder_scheduled(state: &AppState, envelope: &Envelope) -> EventStatus {
    if state.idempotency.is_duplicate(&envelope.id).await {
        tracing::info!(event_id = %envelope.id, "duplicate event skipped");
        return EventStatus::Drop;
    }

    match envelope.data_as::<ReminderScheduled>() {
        Ok(data) => {
            tracing::info!(
                reminder_id = %data.reminder_id,
                task_id = %data.task_id,
                user_id = %data.user_id,
                trigger_time = %data.trigger_time,
                "reminder scheduled"
            );
        }
        Err(err) => {
            tracing::error!(event_id = %envelope.id, error = %err, "malformed reminder.scheduled payload");
        }
    }

    state.idempotency.mark_processed(&envelope.id).await;
    EventStatus::Success
}
