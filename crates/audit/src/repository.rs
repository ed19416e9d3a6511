use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use todoflow_shared::Envelope;

use crate::model::{AuditEntry, AuditFilter};

/// Whether an insert actually recorded a new event or hit the unique
/// constraint on `event_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Recorded,
    Duplicate,
}

/// INSERT one row for an envelope. The `event_id` unique index backs up the
/// idempotency guard: losing a KV key can never produce a second row.
pub async fn insert_entry(
    pool: &SqlitePool,
    envelope: &Envelope,
    received_at: DateTime<Utc>,
) -> Result<InsertOutcome, sqlx::Error> {
    let event_time = DateTime::parse_from_rfc3339(&envelope.time)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(received_at);
    let payload = serde_json::to_value(envelope).unwrap_or_default();

    let result = sqlx::query(
        r#"
        INSERT INTO audit_entries (event_type, event_id, source, actor_id, payload,
                                   event_time, received_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&envelope.event_type)
    .bind(&envelope.id)
    .bind(&envelope.source)
    .bind(envelope.actor_id())
    .bind(payload)
    .bind(event_time)
    .bind(received_at)
    .execute(pool)
    .await;

    match result {
        Ok(_) => Ok(InsertOutcome::Recorded),
        Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
            Ok(InsertOutcome::Duplicate)
        }
        Err(err) => Err(err),
    }
}

/// Filtered page of entries, newest event time first, plus the total count
/// for the same filter.
pub async fn query_entries(
    pool: &SqlitePool,
    filter: &AuditFilter,
    page: i64,
    page_size: i64,
) -> Result<(Vec<AuditEntry>, i64), sqlx::Error> {
    let offset = (page - 1) * page_size;

    let entries = sqlx::query_as::<_, AuditEntry>(
        r#"
        SELECT * FROM audit_entries
        WHERE (?1 IS NULL OR event_type = ?1)
          AND (?2 IS NULL OR actor_id = ?2)
          AND (?3 IS NULL OR event_time >= ?3)
          AND (?4 IS NULL OR event_time <= ?4)
        ORDER BY event_time DESC
        LIMIT ?5 OFFSET ?6
        "#,
    )
    .bind(&filter.event_type)
    .bind(&filter.actor_id)
    .bind(filter.from)
    .bind(filter.to)
    .bind(page_size)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let total: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM audit_entries
        WHERE (?1 IS NULL OR event_type = ?1)
          AND (?2 IS NULL OR actor_id = ?2)
          AND (?3 IS NULL OR event_time >= ?3)
          AND (?4 IS NULL OR event_time <= ?4)
        "#,
    )
    .bind(&filter.event_type)
    .bind(&filter.actor_id)
    .bind(filter.from)
    .bind(filter.to)
    .fetch_one(pool)
    .await?;

    Ok((entries, total))
}
