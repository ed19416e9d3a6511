pub mod events;
pub mod recurrence_rules;
pub mod reminders;
pub mod tasks;

use axum::response::Json;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::model::{RecurrenceRule, Reminder, Task, TaskStatus};

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "command-service",
    }))
}

/// Task representation returned by every task endpoint.
#[derive(Debug, Serialize)]
pub struct TaskResponse {
    pub id: i64,
    pub user_id: String,
    pub title: String,
    pub description: Option<String>,
    pub completed: bool,
    pub status: TaskStatus,
    pub priority: String,
    pub tags: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub due_time: Option<String>,
    pub reminder_time: Option<DateTime<Utc>>,
    pub recurrence_rule_id: Option<i64>,
    pub recurrence: Option<RecurrenceInfo>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct RecurrenceInfo {
    pub frequency: String,
    pub end_after_count: Option<i64>,
    pub end_by_date: Option<DateTime<Utc>>,
    pub is_active: bool,
}

impl TaskResponse {
    pub fn from_task(task: Task, rule: Option<RecurrenceRule>) -> Self {
        Self {
            id: task.id,
            user_id: task.user_id,
            title: task.title,
            description: task.description,
            completed: task.status == TaskStatus::Completed,
            status: task.status,
            priority: task.priority,
            tags: task.tags,
            due_date: task.due_date,
            due_time: task.due_time,
            reminder_time: task.reminder_time,
            recurrence_rule_id: task.recurrence_rule_id,
            recurrence: rule.map(|rule| RecurrenceInfo {
                frequency: rule.frequency.as_str().to_owned(),
                end_after_count: rule.end_after_count,
                end_by_date: rule.end_by_date,
                is_active: rule.is_active,
            }),
            created_at: task.created_at,
            updated_at: task.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RuleResponse {
    pub id: i64,
    pub task_id: i64,
    pub frequency: String,
    pub end_after_count: Option<i64>,
    pub end_by_date: Option<DateTime<Utc>>,
    pub occurrences_generated: i64,
    pub is_active: bool,
    pub base_due_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

impl From<RecurrenceRule> for RuleResponse {
    fn from(rule: RecurrenceRule) -> Self {
        Self {
            id: rule.id,
            task_id: rule.task_id,
            frequency: rule.frequency.as_str().to_owned(),
            end_after_count: rule.end_after_count,
            end_by_date: rule.end_by_date,
            occurrences_generated: rule.occurrences_generated,
            is_active: rule.is_active,
            base_due_date: rule.base_due_date,
            created_at: rule.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReminderResponse {
    pub id: i64,
    pub task_id: i64,
    pub user_id: String,
    pub trigger_time: DateTime<Utc>,
    pub status: crate::model::ReminderStatus,
    pub job_name: String,
    pub created_at: DateTime<Utc>,
}

impl From<Reminder> for ReminderResponse {
    fn from(reminder: Reminder) -> Self {
        Self {
            id: reminder.id,
            task_id: reminder.task_id,
            user_id: reminder.user_id,
            trigger_time: reminder.trigger_time,
            status: reminder.status,
            job_name: reminder.job_name,
            created_at: reminder.created_at,
        }
    }
}
