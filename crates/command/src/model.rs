use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Task lifecycle state. `Deleted` is terminal; deleted rows are kept for
/// audit coherence but never listed or mutated again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Completed,
    Deleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ReminderStatus {
    Pending,
    Delivered,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct Task {
    pub id: i64,
    pub user_id: String,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: String,
    pub tags: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub due_time: Option<String>,
    pub reminder_time: Option<DateTime<Utc>>,
    pub recurrence_rule_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct RecurrenceRule {
    pub id: i64,
    pub task_id: i64,
    pub frequency: Frequency,
    pub end_after_count: Option<i64>,
    pub end_by_date: Option<DateTime<Utc>>,
    pub occurrences_generated: i64,
    pub is_active: bool,
    pub base_due_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct Reminder {
    pub id: i64,
    pub task_id: i64,
    pub user_id: String,
    pub trigger_time: DateTime<Utc>,
    pub status: ReminderStatus,
    pub job_name: String,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Reminder {
    /// Scheduler job payload delivered back to the notification service.
    pub fn job_payload(&self) -> serde_json::Value {
        serde_json::json!({
            "reminder_id": self.id.to_string(),
            "task_id": self.task_id.to_string(),
            "user_id": self.user_id,
        })
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct TaskCounts {
    pub total: i64,
    pub pending: i64,
    pub completed: i64,
}
