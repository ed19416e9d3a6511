//! Recurrence rule CRUD.
//!
//! The recurring service drives the PATCH surface over the invocation
//! channel (deactivation, occurrence accounting, base due date advance),
//! so it accepts the bookkeeping fields alongside the user-editable ones.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::Deserialize;
use validator::Validate;

use crate::app::AppState;
use crate::auth::AuthUser;
use crate::error::CommandError;
use crate::repository::{self, RulePatch};
use crate::routes::RuleResponse;
use crate::validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateRuleRequest {
    pub task_id: i64,
    pub frequency: String,
    #[validate(range(min = 1, message = "must be at least 1"))]
    pub end_after_count: Option<i64>,
    pub end_by_date: Option<String>,
}

pub async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CreateRuleRequest>,
) -> Result<(StatusCode, Json<RuleResponse>), CommandError> {
    req.validate()
        .map_err(|err| CommandError::Validation(err.to_string()))?;

    let new_rule = repository::NewRule {
        frequency: validate::frequency(&req.frequency)?,
        end_after_count: req.end_after_count,
        end_by_date: req
            .end_by_date
            .as_deref()
            .map(|raw| validate::timestamp("end_by_date", raw))
            .transpose()?,
    };

    let rule = repository::insert_rule(&state.write_pool, &user.user_id, req.task_id, &new_rule)
        .await?
        .ok_or(CommandError::NotFound)?;

    Ok((StatusCode::CREATED, Json(rule.into())))
}

pub async fn fetch(
    State(state): State<AppState>,
    user: AuthUser,
    Path(rule_id): Path<i64>,
) -> Result<Json<RuleResponse>, CommandError> {
    let rule = repository::fetch_rule_for_owner(&state.read_pool, &user.user_id, rule_id)
        .await?
        .ok_or(CommandError::NotFound)?;
    Ok(Json(rule.into()))
}

#[derive(Debug, Deserialize, Validate)]
pub struct PatchRuleRequest {
    pub frequency: Option<String>,
    #[validate(range(min = 1, message = "must be at least 1"))]
    pub end_after_count: Option<i64>,
    pub end_by_date: Option<String>,
    pub is_active: Option<bool>,
    #[validate(range(min = 0, message = "must not be negative"))]
    pub occurrences_generated: Option<i64>,
    pub base_due_date: Option<String>,
}

pub async fn update(
    State(state): State<AppState>,
    user: AuthUser,
    Path(rule_id): Path<i64>,
    Json(req): Json<PatchRuleRequest>,
) -> Result<Json<RuleResponse>, CommandError> {
    req.validate()
        .map_err(|err| CommandError::Validation(err.to_string()))?;

    let patch = RulePatch {
        frequency: req.frequency.as_deref().map(validate::frequency).transpose()?,
        end_after_count: req.end_after_count,
        end_by_date: req
            .end_by_date
            .as_deref()
            .map(|raw| validate::timestamp("end_by_date", raw))
            .transpose()?,
        is_active: req.is_active,
        occurrences_generated: req.occurrences_generated,
        base_due_date: req
            .base_due_date
            .as_deref()
            .map(validate::due_date)
            .transpose()?,
    };

    let rule = repository::update_rule(&state.write_pool, &user.user_id, rule_id, &patch)
        .await?
        .ok_or(CommandError::NotFound)?;

    Ok(Json(rule.into()))
}

pub async fn remove(
    State(state): State<AppState>,
    user: AuthUser,
    Path(rule_id): Path<i64>,
) -> Result<StatusCode, CommandError> {
    if !repository::delete_rule(&state.write_pool, &user.user_id, rule_id).await? {
        return Err(CommandError::NotFound);
    }
    Ok(StatusCode::NO_CONTENT)
}
