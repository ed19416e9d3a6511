use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// One immutable audit row per unique envelope id. The storage layer
/// rejects UPDATE and DELETE outright.
#[derive(Debug, Clone, FromRow)]
pub struct AuditEntry {
    pub id: i64,
    pub event_type: String,
    pub event_id: String,
    pub source: String,
    pub actor_id: Option<String>,
    pub payload: serde_json::Value,
    pub event_time: DateTime<Utc>,
    pub received_at: DateTime<Utc>,
}

/// Query-surface filters; everything is optional and combines with AND.
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub event_type: Option<String>,
    pub actor_id: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}
