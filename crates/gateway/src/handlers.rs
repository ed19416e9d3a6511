//! Bus-to-socket fan-out for task and reminder events.

use chrono::{SecondsFormat, Utc};

use todoflow_shared::events;
use todoflow_shared::Envelope;

use crate::connections::ConnectionManager;

/// The short form clients see in `task` frames.
fn task_event_kind(event_type: &str) -> Option<&'static str> {
    match event_type {
        events::TASK_CREATED => Some("created"),
        events::TASK_UPDATED => Some("updated"),
        events::TASK_COMPLETED => Some("completed"),
        events::TASK_DELETED => Some("deleted"),
        _ => None,
    }
}

/// Push a task change to the owner's live socket. Offline users are skipped;
/// the task database is the source of truth and clients re-fetch on connect.
pub async fn handle_task_event(manager: &ConnectionManager, envelope: &Envelope) {
    let Some(kind) = task_event_kind(&envelope.event_type) else {
        tracing::warn!(event_type = %envelope.event_type, "unknown task event type");
        return;
    };
    let Some(user_id) = envelope.actor_id() else {
        tracing::warn!(event_id = %envelope.id, "task event missing user_id");
        return;
    };
    let task_id = envelope.data.get("task_id").cloned();

    let frame = serde_json::json!({
        "type": "task",
        "event_type": kind,
        "task_id": task_id,
        "data": envelope.data,
    });

    if manager.send_to_user(&user_id, &frame).await {
        tracing::debug!(user_id, event_type = kind, "task update pushed");
    }
}

/// Push a fired reminder to the owner, or queue it for replay when the user
/// has no live socket on any instance.
pub async fn handle_reminder_event(manager: &ConnectionManager, envelope: &Envelope) {
    if envelope.event_type != events::REMINDER_TRIGGERED {
        tracing::debug!(event_type = %envelope.event_type, "ignoring reminder event");
        return;
    }
    let Some(user_id) = envelope.actor_id() else {
        tracing::warn!(event_id = %envelope.id, "reminder event missing user_id");
        return;
    };

    if manager.is_connected(&user_id).await {
        let frame = serde_json::json!({
            "type": "reminder",
            "source": "live",
            "data": envelope.data,
        });
        if manager.send_to_user(&user_id, &frame).await {
            tracing::info!(user_id, "reminder pushed live");
            return;
        }
    }

    let entry = serde_json::json!({
        "reminder_id": envelope.data.get("reminder_id"),
        "task_id": envelope.data.get("task_id"),
        "triggered_at": Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
    });
    manager.queue_reminder(&user_id, entry).await;
}
