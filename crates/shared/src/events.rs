//! Event catalog: the nine domain event types, their payloads, and the
//! type-to-topic mapping shared by every service.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const TASK_CREATED: &str = "com.todo.task.created.v1";
pub const TASK_UPDATED: &str = "com.todo.task.updated.v1";
pub const TASK_COMPLETED: &str = "com.todo.task.completed.v1";
pub const TASK_DELETED: &str = "com.todo.task.deleted.v1";
pub const REMINDER_SCHEDULED: &str = "com.todo.reminder.scheduled.v1";
pub const REMINDER_TRIGGERED: &str = "com.todo.reminder.triggered.v1";
pub const REMINDER_DELIVERED: &str = "com.todo.reminder.delivered.v1";
pub const REMINDER_FAILED: &str = "com.todo.reminder.failed.v1";
pub const RECURRING_GENERATED: &str = "com.todo.recurring.generated.v1";

pub const TASK_EVENTS_TOPIC: &str = "task-events";
pub const REMINDER_EVENTS_TOPIC: &str = "reminder-events";
pub const RECURRING_EVENTS_TOPIC: &str = "recurring-events";

/// Resolve the bus topic an event type is published to.
pub fn topic_for(event_type: &str) -> Option<&'static str> {
    if event_type.starts_with("com.todo.task.") {
        Some(TASK_EVENTS_TOPIC)
    } else if event_type.starts_with("com.todo.reminder.") {
        Some(REMINDER_EVENTS_TOPIC)
    } else if event_type.starts_with("com.todo.recurring.") {
        Some(RECURRING_EVENTS_TOPIC)
    } else {
        None
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskCreated {
    pub task_id: String,
    pub user_id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub reminder_time: Option<String>,
    #[serde(default)]
    pub recurrence_rule: Option<serde_json::Value>,
    #[serde(default = "default_priority")]
    pub priority: String,
    #[serde(default)]
    pub tags: Option<String>,
}

fn default_priority() -> String {
    "medium".to_owned()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskUpdated {
    pub task_id: String,
    pub user_id: String,
    pub changes: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskCompleted {
    pub task_id: String,
    pub user_id: String,
    #[serde(default)]
    pub had_recurrence_rule: bool,
    #[serde(default)]
    pub recurrence_rule_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDeleted {
    pub task_id: String,
    pub user_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderScheduled {
    pub reminder_id: String,
    pub task_id: String,
    pub user_id: String,
    pub trigger_time: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderTriggered {
    pub reminder_id: String,
    pub task_id: String,
    pub user_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderDelivered {
    pub reminder_id: String,
    pub task_id: String,
    pub user_id: String,
    pub delivered_via: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderFailed {
    pub reminder_id: String,
    pub task_id: String,
    pub user_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurringGenerated {
    pub original_task_id: String,
    pub new_task_id: String,
    pub user_id: String,
    pub recurrence_rule_id: String,
    pub occurrence_number: i64,
}
