//! `reminder-events` subscription: the command service is the single writer
//! of reminder rows, so delivery outcomes observed on the bus are folded
//! back into the database here.

use axum::extract::State;
use axum::response::Json;
use chrono::Utc;

use todoflow_shared::events::{self, ReminderDelivered, ReminderFailed};
use todoflow_shared::{Envelope, EventStatus};

use crate::app::AppState;
use crate::model::ReminderStatus;
use crate::repository;

pub async fn reminder_events(
    State(state): State<AppState>,
    Json(envelope): Json<Envelope>,
) -> EventStatus {
    let outcome = match envelope.event_type.as_str() {
        events::REMINDER_DELIVERED => envelope
            .data_as::<ReminderDelivered>()
            .map(|data| (data.reminder_id, ReminderStatus::Delivered)),
        events::REMINDER_FAILED => envelope
            .data_as::<ReminderFailed>()
            .map(|data| (data.reminder_id, ReminderStatus::Failed)),
        _ => {
            tracing::debug!(event_type = %envelope.event_type, "ignoring reminder event");
            return EventStatus::Success;
        }
    };

    let (reminder_id, status) = match outcome {
        Ok(outcome) => outcome,
        Err(err) => {
            tracing::error!(event_id = %envelope.id, error = %err, "malformed reminder payload");
            state.idempotency.mark_processed(&envelope.id).await;
            return EventStatus::Drop;
        }
    };

    if state.idempotency.is_duplicate(&envelope.id).await {
        tracing::info!(event_id = %envelope.id, "duplicate event skipped");
        return EventStatus::Drop;
    }

    let Ok(reminder_id) = reminder_id.parse::<i64>() else {
        tracing::error!(event_id = %envelope.id, reminder_id, "non-numeric reminder id");
        state.idempotency.mark_processed(&envelope.id).await;
        return EventStatus::Drop;
    };

    let delivered_at = match status {
        ReminderStatus::Delivered => Some(Utc::now()),
        _ => None,
    };

    match repository::mark_reminder_status(&state.write_pool, reminder_id, status, delivered_at)
        .await
    {
        Ok(updated) => {
            if !updated {
                tracing::debug!(reminder_id, "reminder already settled");
            }
            state.idempotency.mark_processed(&envelope.id).await;
            EventStatus::Success
        }
        Err(err) => {
            tracing::error!(reminder_id, error = %err, "failed to record delivery outcome");
            EventStatus::Retry
        }
    }
}
