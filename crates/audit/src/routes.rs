use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::app::AppState;
use crate::model::{AuditEntry, AuditFilter};
use crate::repository;

const MAX_PAGE_SIZE: i64 = 200;
const DEFAULT_PAGE_SIZE: i64 = 50;

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    pub event_type: Option<String>,
    pub user_id: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct AuditEntryResponse {
    pub id: i64,
    pub event_type: String,
    pub event_id: String,
    pub source: String,
    pub actor_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub received_at: DateTime<Utc>,
}

impl From<AuditEntry> for AuditEntryResponse {
    fn from(entry: AuditEntry) -> Self {
        Self {
            id: entry.id,
            event_type: entry.event_type,
            event_id: entry.event_id,
            source: entry.source,
            actor_id: entry.actor_id,
            timestamp: entry.event_time,
            received_at: entry.received_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuditQueryResponse {
    pub entries: Vec<AuditEntryResponse>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
}

/// `GET /audit?event_type=&user_id=&from=&to=&page=&page_size=`
pub async fn query_audit_log(
    State(state): State<AppState>,
    Query(params): Query<AuditQuery>,
) -> Result<Json<AuditQueryResponse>, Response> {
    let page = params.page.unwrap_or(1).max(1);
    let page_size = params
        .page_size
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);

    // Unparseable time bounds are ignored rather than rejected, so a sloppy
    // dashboard query still returns data.
    let filter = AuditFilter {
        event_type: params.event_type,
        actor_id: params.user_id,
        from: params.from.as_deref().and_then(parse_time),
        to: params.to.as_deref().and_then(parse_time),
    };

    let (entries, total) = repository::query_entries(&state.read_pool, &filter, page, page_size)
        .await
        .map_err(|err| {
            tracing::error!(error = %err, "audit query failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({
                    "error": "InternalError",
                    "message": "An unexpected error occurred. Please try again later.",
                })),
            )
                .into_response()
        })?;

    Ok(Json(AuditQueryResponse {
        entries: entries.into_iter().map(Into::into).collect(),
        total,
        page,
        page_size,
    }))
}

fn parse_time(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| DateTime::from_naive_utc_and_offset(naive, Utc))
}
