//! `task-events` consumer: generates the next occurrence when a task with an
//! active recurrence rule is completed.

use chrono::Utc;

use todoflow_shared::events::{self, RecurringGenerated, TaskCompleted};
use todoflow_shared::{Envelope, EventStatus};

use crate::app::AppState;
use crate::client::{CallError, CreateTaskBody, RulePatchBody};
use crate::schedule::{next_due_date, parse_due_date, Frequency};

pub async fn handle_task_event(state: &AppState, envelope: Envelope) -> EventStatus {
    if envelope.event_type != events::TASK_COMPLETED {
        tracing::debug!(event_type = %envelope.event_type, "ignoring non-completion event");
        return EventStatus::Success;
    }

    let data: TaskCompleted = match envelope.data_as() {
        Ok(data) => data,
        Err(err) => {
            tracing::error!(event_id = %envelope.id, error = %err, "malformed task.completed payload");
            state.idempotency.mark_processed(&envelope.id).await;
            return EventStatus::Drop;
        }
    };

    if !data.had_recurrence_rule {
        tracing::debug!(task_id = %data.task_id, "task has no recurrence rule, skipping");
        return EventStatus::Success;
    }
    let Some(rule_id) = data.recurrence_rule_id.clone() else {
        tracing::warn!(
            task_id = %data.task_id,
            "had_recurrence_rule set without recurrence_rule_id"
        );
        return EventStatus::Success;
    };

    if state.idempotency.is_duplicate(&envelope.id).await {
        tracing::info!(event_id = %envelope.id, "duplicate event skipped");
        return EventStatus::Drop;
    }

    match generate_occurrence(state, &envelope, &data, &rule_id).await {
        Ok(status) => status,
        Err(err) if err.is_transient() => {
            tracing::warn!(
                event_id = %envelope.id,
                rule_id,
                error = %err,
                "transient failure, requesting redelivery"
            );
            EventStatus::Retry
        }
        Err(err) => {
            tracing::error!(
                event_id = %envelope.id,
                rule_id,
                error = %err,
                "permanent failure, dropping event"
            );
            state.idempotency.mark_processed(&envelope.id).await;
            EventStatus::Success
        }
    }
}

async fn generate_occurrence(
    state: &AppState,
    envelope: &Envelope,
    data: &TaskCompleted,
    rule_id: &str,
) -> Result<EventStatus, CallError> {
    let rule = state.command.get_rule(&data.user_id, rule_id).await?;

    if !rule.is_active {
        tracing::info!(rule_id, "rule is inactive, skipping");
        state.idempotency.mark_processed(&envelope.id).await;
        return Ok(EventStatus::Success);
    }

    let count_reached = rule
        .end_after_count
        .is_some_and(|max| rule.occurrences_generated >= max);
    let date_passed = rule
        .end_by_date
        .as_deref()
        .and_then(|raw| chrono::DateTime::parse_from_rfc3339(raw).ok())
        .is_some_and(|end| Utc::now() >= end.with_timezone(&Utc));

    if count_reached || date_passed {
        tracing::info!(
            rule_id,
            occurrences = rule.occurrences_generated,
            "rule terminated, deactivating"
        );
        state
            .command
            .patch_rule(
                &data.user_id,
                rule_id,
                &RulePatchBody {
                    is_active: Some(false),
                    occurrences_generated: None,
                    base_due_date: None,
                },
            )
            .await?;
        state.idempotency.mark_processed(&envelope.id).await;
        return Ok(EventStatus::Success);
    }

    // Title, description and the recurrence baseline are inherited from the
    // completed task.
    let source = state.command.get_task(&data.user_id, &data.task_id).await?;

    let base = rule
        .base_due_date
        .as_deref()
        .or(source.due_date.as_deref())
        .and_then(parse_due_date)
        .unwrap_or_else(|| Utc::now().date_naive());
    let next_due = next_due_date(base, Frequency::parse(&rule.frequency));

    let new_task = state
        .command
        .create_task(
            &data.user_id,
            &CreateTaskBody {
                title: source.title.clone(),
                description: source.description.clone(),
                due_date: Some(next_due.to_string()),
                recurrence_rule_id: rule.id,
            },
        )
        .await?;

    let occurrence_number = rule.occurrences_generated + 1;
    state
        .command
        .patch_rule(
            &data.user_id,
            rule_id,
            &RulePatchBody {
                is_active: None,
                occurrences_generated: Some(occurrence_number),
                base_due_date: Some(next_due.to_string()),
            },
        )
        .await?;

    let generated = RecurringGenerated {
        original_task_id: data.task_id.clone(),
        new_task_id: new_task.id.to_string(),
        user_id: data.user_id.clone(),
        recurrence_rule_id: rule_id.to_owned(),
        occurrence_number,
    };
    if let Err(err) = state
        .publisher
        .publish(events::RECURRING_GENERATED, &generated)
        .await
    {
        tracing::error!(rule_id, error = %err, "failed to publish recurring.generated");
    }

    state.idempotency.mark_processed(&envelope.id).await;

    tracing::info!(
        rule_id,
        new_task_id = new_task.id,
        occurrence_number,
        next_due = %next_due,
        "recurring occurrence generated"
    );
    Ok(EventStatus::Success)
}
