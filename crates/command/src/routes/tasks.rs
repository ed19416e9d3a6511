use std::collections::BTreeMap;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use validator::Validate;

use todoflow_shared::events;

use crate::app::{spawn_publish, AppState};
use crate::auth::AuthUser;
use crate::error::CommandError;
use crate::model::{TaskCounts, TaskStatus};
use crate::repository::{self, NewRule, NewTask, TaskFields};
use crate::routes::{reminders, TaskResponse};
use crate::validate;

#[derive(Debug, Deserialize, Validate)]
pub struct RecurrenceInput {
    pub frequency: String,
    #[validate(range(min = 1, message = "must be at least 1"))]
    pub end_after_count: Option<i64>,
    pub end_by_date: Option<String>,
}

impl RecurrenceInput {
    fn to_new_rule(&self) -> Result<NewRule, CommandError> {
        self.validate()
            .map_err(|err| CommandError::Validation(err.to_string()))?;
        Ok(NewRule {
            frequency: validate::frequency(&self.frequency)?,
            end_after_count: self.end_after_count,
            end_by_date: self.end_by_date.as_deref().map(parse_end_by).transpose()?,
        })
    }
}

/// `end_by_date` accepts a bare date (taken as end of that day, UTC) or a
/// full RFC 3339 timestamp.
fn parse_end_by(raw: &str) -> Result<DateTime<Utc>, CommandError> {
    if let Ok(date) = validate::due_date(raw) {
        let end_of_day = date.and_hms_opt(23, 59, 59).unwrap_or_default();
        return Ok(DateTime::from_naive_utc_and_offset(end_of_day, Utc));
    }
    validate::timestamp("end_by_date", raw)
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTaskRequest {
    #[validate(length(max = 500, message = "must be at most 500 characters"))]
    pub title: String,
    #[validate(length(max = 5000, message = "must be at most 5000 characters"))]
    pub description: Option<String>,
    pub due_date: Option<String>,
    pub due_time: Option<String>,
    pub priority: Option<String>,
    pub tags: Option<String>,
    pub recurrence: Option<RecurrenceInput>,
    /// Link the new task to an existing rule instead of creating one; this
    /// is how generated occurrences keep referencing their source rule.
    pub recurrence_rule_id: Option<i64>,
    pub reminder_time: Option<DateTime<Utc>>,
}

pub async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CreateTaskRequest>,
) -> Result<impl IntoResponse, CommandError> {
    req.validate()
        .map_err(|err| CommandError::Validation(err.to_string()))?;

    let new_task = NewTask {
        user_id: user.user_id.clone(),
        title: validate::title(&req.title)?,
        description: validate::description(req.description.as_deref())?,
        priority: req.priority.clone().unwrap_or_else(|| "medium".to_owned()),
        tags: req.tags.clone(),
        due_date: req.due_date.as_deref().map(validate::due_date).transpose()?,
        due_time: req.due_time.as_deref().map(validate::due_time).transpose()?,
        reminder_time: None,
    };
    let new_rule = req.recurrence.as_ref().map(RecurrenceInput::to_new_rule).transpose()?;

    // A foreign rule id reads as missing, same as every other ownership check.
    let existing_rule_id = match req.recurrence_rule_id {
        Some(rule_id) => Some(
            repository::fetch_rule_for_owner(&state.read_pool, &user.user_id, rule_id)
                .await?
                .ok_or(CommandError::NotFound)?
                .id,
        ),
        None => None,
    };

    let (task, rule) =
        repository::insert_task(&state.write_pool, &new_task, new_rule.as_ref(), existing_rule_id)
            .await?;

    let task = match req.reminder_time {
        Some(trigger_time) => reminders::schedule_for_task(&state, &task, trigger_time).await?,
        None => task,
    };

    spawn_publish(
        state.publisher.clone(),
        events::TASK_CREATED,
        events::TaskCreated {
            task_id: task.id.to_string(),
            user_id: task.user_id.clone(),
            title: task.title.clone(),
            description: task.description.clone(),
            due_date: task.due_date.map(|d| d.to_string()),
            reminder_time: task.reminder_time.map(|t| t.to_rfc3339()),
            recurrence_rule: rule.as_ref().map(|rule| {
                serde_json::json!({
                    "frequency": rule.frequency.as_str(),
                    "end_after_count": rule.end_after_count,
                    "end_by_date": rule.end_by_date,
                })
            }),
            priority: task.priority.clone(),
            tags: task.tags.clone(),
        },
    );

    Ok((
        StatusCode::CREATED,
        Json(TaskResponse::from_task(task, rule)),
    ))
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub status: Option<String>,
}

#[derive(Debug, serde::Serialize)]
pub struct TaskListResponse {
    pub tasks: Vec<TaskResponse>,
    pub counts: TaskCounts,
}

pub async fn list(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<ListParams>,
) -> Result<Json<TaskListResponse>, CommandError> {
    let status = match params.status.as_deref() {
        None | Some("all") => None,
        Some("pending") => Some(TaskStatus::Pending),
        Some("completed") => Some(TaskStatus::Completed),
        Some(other) => {
            return Err(CommandError::Validation(format!(
                "status must be all, pending or completed (got '{other}')"
            )))
        }
    };

    let tasks = repository::list_tasks(&state.read_pool, &user.user_id, status).await?;
    let counts = repository::task_counts(&state.read_pool, &user.user_id).await?;

    let mut responses = Vec::with_capacity(tasks.len());
    for task in tasks {
        let rule = match task.recurrence_rule_id {
            Some(rule_id) => repository::fetch_rule(&state.read_pool, rule_id).await?,
            None => None,
        };
        responses.push(TaskResponse::from_task(task, rule));
    }

    Ok(Json(TaskListResponse {
        tasks: responses,
        counts,
    }))
}

pub async fn fetch(
    State(state): State<AppState>,
    user: AuthUser,
    Path(task_id): Path<i64>,
) -> Result<Json<TaskResponse>, CommandError> {
    let task = repository::fetch_task(&state.read_pool, &user.user_id, task_id)
        .await?
        .ok_or(CommandError::NotFound)?;
    let rule = match task.recurrence_rule_id {
        Some(rule_id) => repository::fetch_rule(&state.read_pool, rule_id).await?,
        None => None,
    };
    Ok(Json(TaskResponse::from_task(task, rule)))
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateTaskRequest {
    #[validate(length(max = 500, message = "must be at most 500 characters"))]
    pub title: String,
    #[validate(length(max = 5000, message = "must be at most 5000 characters"))]
    pub description: Option<String>,
    pub priority: Option<String>,
    pub tags: Option<String>,
    pub due_date: Option<String>,
    pub due_time: Option<String>,
    pub recurrence: Option<RecurrenceInput>,
}

pub async fn update(
    State(state): State<AppState>,
    user: AuthUser,
    Path(task_id): Path<i64>,
    Json(req): Json<UpdateTaskRequest>,
) -> Result<Json<TaskResponse>, CommandError> {
    req.validate()
        .map_err(|err| CommandError::Validation(err.to_string()))?;

    let fields = TaskFields {
        title: validate::title(&req.title)?,
        description: validate::description(req.description.as_deref())?,
        priority: req.priority.clone(),
        tags: req.tags.clone(),
        due_date: req.due_date.as_deref().map(validate::due_date).transpose()?,
        due_time: req.due_time.as_deref().map(validate::due_time).transpose()?,
    };
    // Everything, including the recurrence descriptor, validates before the
    // first write.
    let rule_input = req.recurrence.as_ref().map(RecurrenceInput::to_new_rule).transpose()?;

    let task = repository::update_task(&state.write_pool, &user.user_id, task_id, &fields)
        .await?
        .ok_or(CommandError::NotFound)?;

    // Upsert the recurrence rule when the request carries a descriptor.
    let rule = match (rule_input, task.recurrence_rule_id) {
        (Some(new_rule), Some(rule_id)) => {
            repository::update_rule(
                &state.write_pool,
                &user.user_id,
                rule_id,
                &crate::repository::RulePatch {
                    frequency: Some(new_rule.frequency),
                    end_after_count: new_rule.end_after_count,
                    end_by_date: new_rule.end_by_date,
                    ..Default::default()
                },
            )
            .await?
        }
        (Some(new_rule), None) => {
            repository::insert_rule(&state.write_pool, &user.user_id, task.id, &new_rule).await?
        }
        (None, Some(rule_id)) => repository::fetch_rule(&state.read_pool, rule_id).await?,
        (None, None) => None,
    };

    // Re-read so the response reflects a freshly linked rule id.
    let task = repository::fetch_task(&state.read_pool, &user.user_id, task_id)
        .await?
        .ok_or(CommandError::NotFound)?;

    let mut changes: BTreeMap<String, serde_json::Value> = BTreeMap::new();
    changes.insert("title".to_owned(), serde_json::json!(fields.title));
    if let Some(description) = &fields.description {
        changes.insert("description".to_owned(), serde_json::json!(description));
    }
    if let Some(priority) = &fields.priority {
        changes.insert("priority".to_owned(), serde_json::json!(priority));
    }
    if let Some(tags) = &fields.tags {
        changes.insert("tags".to_owned(), serde_json::json!(tags));
    }
    if let Some(due_date) = &fields.due_date {
        changes.insert("due_date".to_owned(), serde_json::json!(due_date.to_string()));
    }
    if let Some(due_time) = &fields.due_time {
        changes.insert("due_time".to_owned(), serde_json::json!(due_time));
    }

    spawn_publish(
        state.publisher.clone(),
        events::TASK_UPDATED,
        events::TaskUpdated {
            task_id: task.id.to_string(),
            user_id: user.user_id.clone(),
            changes,
        },
    );

    Ok(Json(TaskResponse::from_task(task, rule)))
}

#[derive(Debug, Deserialize)]
pub struct CompletionRequest {
    pub completed: bool,
}

pub async fn complete(
    State(state): State<AppState>,
    user: AuthUser,
    Path(task_id): Path<i64>,
    Json(req): Json<CompletionRequest>,
) -> Result<Json<TaskResponse>, CommandError> {
    let task =
        repository::set_completion(&state.write_pool, &user.user_id, task_id, req.completed)
            .await?
            .ok_or(CommandError::NotFound)?;

    if req.completed {
        spawn_publish(
            state.publisher.clone(),
            events::TASK_COMPLETED,
            events::TaskCompleted {
                task_id: task.id.to_string(),
                user_id: user.user_id.clone(),
                had_recurrence_rule: task.recurrence_rule_id.is_some(),
                recurrence_rule_id: task.recurrence_rule_id.map(|id| id.to_string()),
            },
        );
    } else {
        let mut changes = BTreeMap::new();
        changes.insert("completed".to_owned(), serde_json::json!(false));
        spawn_publish(
            state.publisher.clone(),
            events::TASK_UPDATED,
            events::TaskUpdated {
                task_id: task.id.to_string(),
                user_id: user.user_id.clone(),
                changes,
            },
        );
    }

    let rule = match task.recurrence_rule_id {
        Some(rule_id) => repository::fetch_rule(&state.read_pool, rule_id).await?,
        None => None,
    };
    Ok(Json(TaskResponse::from_task(task, rule)))
}

pub async fn remove(
    State(state): State<AppState>,
    user: AuthUser,
    Path(task_id): Path<i64>,
) -> Result<StatusCode, CommandError> {
    let (task, cancelled) =
        repository::soft_delete_task(&state.write_pool, &user.user_id, task_id)
            .await?
            .ok_or(CommandError::NotFound)?;

    // The jobs may have fired already; cancellation treats 404 as success
    // and anything else is logged without failing the delete.
    for reminder in &cancelled {
        if let Err(err) = state.jobs.cancel(&reminder.job_name).await {
            tracing::error!(job = %reminder.job_name, error = %err, "failed to cancel reminder job");
        }
    }

    spawn_publish(
        state.publisher.clone(),
        events::TASK_DELETED,
        events::TaskDeleted {
            task_id: task.id.to_string(),
            user_id: user.user_id.clone(),
        },
    );

    Ok(StatusCode::NO_CONTENT)
}
