//! Persistence layer for tasks, recurrence rules and reminders.
//!
//! The command service is the single writer of these tables; every query
//! that touches user data is scoped by `user_id` so a foreign row behaves
//! exactly like a missing one.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::SqlitePool;

use crate::model::{
    Frequency, RecurrenceRule, Reminder, ReminderStatus, Task, TaskCounts, TaskStatus,
};

#[derive(Debug, Clone)]
pub struct NewTask {
    pub user_id: String,
    pub title: String,
    pub description: Option<String>,
    pub priority: String,
    pub tags: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub due_time: Option<String>,
    pub reminder_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewRule {
    pub frequency: Frequency,
    pub end_after_count: Option<i64>,
    pub end_by_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct RulePatch {
    pub frequency: Option<Frequency>,
    pub end_after_count: Option<i64>,
    pub end_by_date: Option<DateTime<Utc>>,
    pub is_active: Option<bool>,
    pub occurrences_generated: Option<i64>,
    pub base_due_date: Option<NaiveDate>,
}

/// Insert a task, optionally creating and linking its recurrence rule in the
/// same transaction. Returns the task plus the rule, when one was created.
pub async fn insert_task(
    pool: &SqlitePool,
    new_task: &NewTask,
    rule: Option<&NewRule>,
    existing_rule_id: Option<i64>,
) -> Result<(Task, Option<RecurrenceRule>), sqlx::Error> {
    let now = Utc::now();
    let mut tx = pool.begin().await?;

    let task_id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO tasks (user_id, title, description, status, priority, tags,
                           due_date, due_time, reminder_time, recurrence_rule_id,
                           created_at, updated_at)
        VALUES (?, ?, ?, 'pending', ?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(&new_task.user_id)
    .bind(&new_task.title)
    .bind(&new_task.description)
    .bind(&new_task.priority)
    .bind(&new_task.tags)
    .bind(new_task.due_date)
    .bind(&new_task.due_time)
    .bind(new_task.reminder_time)
    .bind(existing_rule_id)
    .bind(now)
    .bind(now)
    .fetch_one(&mut *tx)
    .await?;

    let created_rule = match rule {
        Some(rule) => {
            let rule_id: i64 = sqlx::query_scalar(
                r#"
                INSERT INTO recurrence_rules (task_id, frequency, end_after_count,
                                              end_by_date, occurrences_generated,
                                              is_active, base_due_date, created_at)
                VALUES (?, ?, ?, ?, 0, 1, ?, ?)
                RETURNING id
                "#,
            )
            .bind(task_id)
            .bind(rule.frequency)
            .bind(rule.end_after_count)
            .bind(rule.end_by_date)
            .bind(new_task.due_date)
            .bind(now)
            .fetch_one(&mut *tx)
            .await?;

            sqlx::query("UPDATE tasks SET recurrence_rule_id = ? WHERE id = ?")
                .bind(rule_id)
                .bind(task_id)
                .execute(&mut *tx)
                .await?;

            Some(rule_id)
        }
        None => None,
    };

    tx.commit().await?;

    let task = fetch_task_any_status(pool, task_id)
        .await?
        .ok_or(sqlx::Error::RowNotFound)?;
    let rule = match created_rule {
        Some(rule_id) => fetch_rule(pool, rule_id).await?,
        None => None,
    };
    Ok((task, rule))
}

async fn fetch_task_any_status(pool: &SqlitePool, task_id: i64) -> Result<Option<Task>, sqlx::Error> {
    sqlx::query_as::<_, Task>("SELECT * FROM tasks WHERE id = ?")
        .bind(task_id)
        .fetch_optional(pool)
        .await
}

/// Owner-scoped lookup; deleted tasks are invisible.
pub async fn fetch_task(
    pool: &SqlitePool,
    user_id: &str,
    task_id: i64,
) -> Result<Option<Task>, sqlx::Error> {
    sqlx::query_as::<_, Task>(
        "SELECT * FROM tasks WHERE id = ? AND user_id = ? AND status != 'deleted'",
    )
    .bind(task_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

pub async fn list_tasks(
    pool: &SqlitePool,
    user_id: &str,
    status: Option<TaskStatus>,
) -> Result<Vec<Task>, sqlx::Error> {
    match status {
        Some(status) => {
            sqlx::query_as::<_, Task>(
                r#"
                SELECT * FROM tasks
                WHERE user_id = ? AND status = ?
                ORDER BY updated_at DESC
                "#,
            )
            .bind(user_id)
            .bind(status)
            .fetch_all(pool)
            .await
        }
        None => {
            sqlx::query_as::<_, Task>(
                r#"
                SELECT * FROM tasks
                WHERE user_id = ? AND status != 'deleted'
                ORDER BY updated_at DESC
                "#,
            )
            .bind(user_id)
            .fetch_all(pool)
            .await
        }
    }
}

pub async fn task_counts(pool: &SqlitePool, user_id: &str) -> Result<TaskCounts, sqlx::Error> {
    let (total, completed): (i64, i64) = sqlx::query_as(
        r#"
        SELECT COUNT(*),
               COALESCE(SUM(CASE WHEN status = 'completed' THEN 1 ELSE 0 END), 0)
        FROM tasks
        WHERE user_id = ? AND status != 'deleted'
        "#,
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    Ok(TaskCounts {
        total,
        pending: total - completed,
        completed,
    })
}

#[derive(Debug, Clone)]
pub struct TaskFields {
    pub title: String,
    pub description: Option<String>,
    pub priority: Option<String>,
    pub tags: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub due_time: Option<String>,
}

/// Apply a PUT-style update. `None` fields keep their current value.
pub async fn update_task(
    pool: &SqlitePool,
    user_id: &str,
    task_id: i64,
    fields: &TaskFields,
) -> Result<Option<Task>, sqlx::Error> {
    let Some(current) = fetch_task(pool, user_id, task_id).await? else {
        return Ok(None);
    };

    let now = Utc::now();
    sqlx::query(
        r#"
        UPDATE tasks
        SET title = ?, description = ?, priority = ?, tags = ?,
            due_date = ?, due_time = ?, updated_at = ?
        WHERE id = ? AND user_id = ? AND status != 'deleted'
        "#,
    )
    .bind(&fields.title)
    .bind(fields.description.as_ref().or(current.description.as_ref()))
    .bind(fields.priority.as_deref().unwrap_or(&current.priority))
    .bind(fields.tags.as_ref().or(current.tags.as_ref()))
    .bind(fields.due_date.or(current.due_date))
    .bind(fields.due_time.as_ref().or(current.due_time.as_ref()))
    .bind(now)
    .bind(task_id)
    .bind(user_id)
    .execute(pool)
    .await?;

    fetch_task(pool, user_id, task_id).await
}

/// Toggle completion. Deleted tasks stay untouchable.
pub async fn set_completion(
    pool: &SqlitePool,
    user_id: &str,
    task_id: i64,
    completed: bool,
) -> Result<Option<Task>, sqlx::Error> {
    let status = if completed {
        TaskStatus::Completed
    } else {
        TaskStatus::Pending
    };
    let result = sqlx::query(
        "UPDATE tasks SET status = ?, updated_at = ? WHERE id = ? AND user_id = ? AND status != 'deleted'",
    )
    .bind(status)
    .bind(Utc::now())
    .bind(task_id)
    .bind(user_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }
    fetch_task(pool, user_id, task_id).await
}

/// Soft-delete the task and cascade its pending reminders to `failed`.
/// Returns the deleted task and the reminders whose jobs must be cancelled.
pub async fn soft_delete_task(
    pool: &SqlitePool,
    user_id: &str,
    task_id: i64,
) -> Result<Option<(Task, Vec<Reminder>)>, sqlx::Error> {
    let Some(task) = fetch_task(pool, user_id, task_id).await? else {
        return Ok(None);
    };

    let pending = pending_reminders(pool, task_id).await?;
    let now = Utc::now();

    let mut tx = pool.begin().await?;
    sqlx::query("UPDATE tasks SET status = 'deleted', updated_at = ? WHERE id = ?")
        .bind(now)
        .bind(task_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("UPDATE reminders SET status = 'failed' WHERE task_id = ? AND status = 'pending'")
        .bind(task_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    Ok(Some((task, pending)))
}

// --- recurrence rules ---

pub async fn fetch_rule(
    pool: &SqlitePool,
    rule_id: i64,
) -> Result<Option<RecurrenceRule>, sqlx::Error> {
    sqlx::query_as::<_, RecurrenceRule>("SELECT * FROM recurrence_rules WHERE id = ?")
        .bind(rule_id)
        .fetch_optional(pool)
        .await
}

/// Rule lookup scoped through the owning task's owner.
pub async fn fetch_rule_for_owner(
    pool: &SqlitePool,
    user_id: &str,
    rule_id: i64,
) -> Result<Option<RecurrenceRule>, sqlx::Error> {
    sqlx::query_as::<_, RecurrenceRule>(
        r#"
        SELECT r.* FROM recurrence_rules r
        JOIN tasks t ON t.id = r.task_id
        WHERE r.id = ? AND t.user_id = ?
        "#,
    )
    .bind(rule_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

/// Create a rule for a task the caller owns and link it back to the task.
pub async fn insert_rule(
    pool: &SqlitePool,
    user_id: &str,
    task_id: i64,
    rule: &NewRule,
) -> Result<Option<RecurrenceRule>, sqlx::Error> {
    let Some(task) = fetch_task(pool, user_id, task_id).await? else {
        return Ok(None);
    };

    let now = Utc::now();
    let mut tx = pool.begin().await?;
    let rule_id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO recurrence_rules (task_id, frequency, end_after_count, end_by_date,
                                      occurrences_generated, is_active, base_due_date, created_at)
        VALUES (?, ?, ?, ?, 0, 1, ?, ?)
        RETURNING id
        "#,
    )
    .bind(task_id)
    .bind(rule.frequency)
    .bind(rule.end_after_count)
    .bind(rule.end_by_date)
    .bind(task.due_date)
    .bind(now)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query("UPDATE tasks SET recurrence_rule_id = ?, updated_at = ? WHERE id = ?")
        .bind(rule_id)
        .bind(now)
        .bind(task_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    fetch_rule(pool, rule_id).await
}

pub async fn update_rule(
    pool: &SqlitePool,
    user_id: &str,
    rule_id: i64,
    patch: &RulePatch,
) -> Result<Option<RecurrenceRule>, sqlx::Error> {
    let Some(current) = fetch_rule_for_owner(pool, user_id, rule_id).await? else {
        return Ok(None);
    };

    sqlx::query(
        r#"
        UPDATE recurrence_rules
        SET frequency = ?, end_after_count = ?, end_by_date = ?,
            is_active = ?, occurrences_generated = ?, base_due_date = ?
        WHERE id = ?
        "#,
    )
    .bind(patch.frequency.unwrap_or(current.frequency))
    .bind(patch.end_after_count.or(current.end_after_count))
    .bind(patch.end_by_date.or(current.end_by_date))
    .bind(patch.is_active.unwrap_or(current.is_active))
    .bind(
        patch
            .occurrences_generated
            .unwrap_or(current.occurrences_generated),
    )
    .bind(patch.base_due_date.or(current.base_due_date))
    .bind(rule_id)
    .execute(pool)
    .await?;

    fetch_rule(pool, rule_id).await
}

/// Delete a rule and unlink it from its task. Successor tasks keep their
/// nullable back-reference via ON DELETE SET NULL.
pub async fn delete_rule(
    pool: &SqlitePool,
    user_id: &str,
    rule_id: i64,
) -> Result<bool, sqlx::Error> {
    let Some(rule) = fetch_rule_for_owner(pool, user_id, rule_id).await? else {
        return Ok(false);
    };

    let mut tx = pool.begin().await?;
    sqlx::query(
        "UPDATE tasks SET recurrence_rule_id = NULL, updated_at = ? WHERE recurrence_rule_id = ?",
    )
    .bind(Utc::now())
    .bind(rule.id)
    .execute(&mut *tx)
    .await?;
    sqlx::query("DELETE FROM recurrence_rules WHERE id = ?")
        .bind(rule.id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    Ok(true)
}

// --- reminders ---

/// Insert a pending reminder and stamp its unique scheduler job name
/// (`reminder-{id}`) once the row id is known.
pub async fn insert_reminder(
    pool: &SqlitePool,
    task_id: i64,
    user_id: &str,
    trigger_time: DateTime<Utc>,
) -> Result<Reminder, sqlx::Error> {
    let now = Utc::now();
    let mut tx = pool.begin().await?;

    let reminder_id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO reminders (task_id, user_id, trigger_time, status, job_name, created_at)
        VALUES (?, ?, ?, 'pending', NULL, ?)
        RETURNING id
        "#,
    )
    .bind(task_id)
    .bind(user_id)
    .bind(trigger_time)
    .bind(now)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query("UPDATE reminders SET job_name = ? WHERE id = ?")
        .bind(format!("reminder-{reminder_id}"))
        .bind(reminder_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("UPDATE tasks SET reminder_time = ?, updated_at = ? WHERE id = ?")
        .bind(trigger_time)
        .bind(now)
        .bind(task_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    sqlx::query_as::<_, Reminder>("SELECT * FROM reminders WHERE id = ?")
        .bind(reminder_id)
        .fetch_one(pool)
        .await
}

pub async fn pending_reminders(
    pool: &SqlitePool,
    task_id: i64,
) -> Result<Vec<Reminder>, sqlx::Error> {
    sqlx::query_as::<_, Reminder>(
        "SELECT * FROM reminders WHERE task_id = ? AND status = 'pending' ORDER BY id",
    )
    .bind(task_id)
    .fetch_all(pool)
    .await
}

pub async fn fetch_pending_reminder_for_task(
    pool: &SqlitePool,
    user_id: &str,
    task_id: i64,
) -> Result<Option<Reminder>, sqlx::Error> {
    sqlx::query_as::<_, Reminder>(
        r#"
        SELECT r.* FROM reminders r
        JOIN tasks t ON t.id = r.task_id
        WHERE r.task_id = ? AND t.user_id = ? AND r.status = 'pending'
        ORDER BY r.id DESC
        "#,
    )
    .bind(task_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

pub async fn delete_reminder(pool: &SqlitePool, reminder_id: i64) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    sqlx::query(
        "UPDATE tasks SET reminder_time = NULL, updated_at = ? WHERE id = (SELECT task_id FROM reminders WHERE id = ?)",
    )
    .bind(Utc::now())
    .bind(reminder_id)
    .execute(&mut *tx)
    .await?;
    sqlx::query("DELETE FROM reminders WHERE id = ?")
        .bind(reminder_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(())
}

/// Record the delivery outcome. Transitions are one-way from `pending`, so
/// replays and out-of-order outcomes cannot resurrect a settled reminder.
pub async fn mark_reminder_status(
    pool: &SqlitePool,
    reminder_id: i64,
    status: ReminderStatus,
    delivered_at: Option<DateTime<Utc>>,
) -> Result<bool, sqlx::Error> {
    let result =
        sqlx::query("UPDATE reminders SET status = ?, delivered_at = ? WHERE id = ? AND status = 'pending'")
            .bind(status)
            .bind(delivered_at)
            .bind(reminder_id)
            .execute(pool)
            .await?;
    Ok(result.rows_affected() > 0)
}
