use chrono::Utc;

use todoflow_shared::{Envelope, EventStatus};

use crate::app::AppState;
use crate::repository::{self, InsertOutcome};

/// Record one envelope from any topic: idempotency check, INSERT, mark
/// processed. Duplicate envelope ids — via the KV guard or the unique
/// index — are dropped without side effects.
pub async fn handle_event(state: &AppState, envelope: &Envelope) -> EventStatus {
    if state.idempotency.is_duplicate(&envelope.id).await {
        tracing::info!(event_id = %envelope.id, "duplicate event skipped");
        return EventStatus::Drop;
    }

    match repository::insert_entry(&state.write_pool, envelope, Utc::now()).await {
        Ok(InsertOutcome::Recorded) => {
            state.idempotency.mark_processed(&envelope.id).await;
            tracing::info!(
                event_type = %envelope.event_type,
                event_id = %envelope.id,
                source = %envelope.source,
                "audit logged"
            );
            EventStatus::Success
        }
        Ok(InsertOutcome::Duplicate) => {
            state.idempotency.mark_processed(&envelope.id).await;
            tracing::info!(event_id = %envelope.id, "event already recorded");
            EventStatus::Drop
        }
        Err(err) => {
            tracing::error!(event_id = %envelope.id, error = %err, "audit insert failed, retrying");
            EventStatus::Retry
        }
    }
}
