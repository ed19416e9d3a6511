use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use tower::ServiceExt;

use todoflow_audit::{router, AppState};
use todoflow_shared::sidecar::StateClient;
use todoflow_shared::IdempotencyGuard;

struct TestApp {
    router: axum::Router,
    pool: SqlitePool,
    _sidecar: mockito::ServerGuard,
}

async fn setup() -> TestApp {
    let sidecar = mockito::Server::new_async().await;

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory database");
    sqlx::migrate!("../../migrations/audit")
        .run(&pool)
        .await
        .expect("migrations");

    let state = AppState {
        read_pool: pool.clone(),
        write_pool: pool.clone(),
        idempotency: IdempotencyGuard::new(
            StateClient::new(reqwest::Client::new(), &sidecar.url(), "todo-statestore"),
            "audit-service",
        ),
    };

    TestApp {
        router: router(state),
        pool,
        _sidecar: sidecar,
    }
}

fn envelope(event_id: &str, event_type: &str, time: &str, data: Value) -> Value {
    json!({
        "specversion": "1.0",
        "type": event_type,
        "source": "command-service",
        "id": event_id,
        "time": time,
        "datacontenttype": "application/json",
        "data": data,
    })
}

impl TestApp {
    async fn deliver(&self, topic: &str, envelope: Value) -> String {
        let response = self
            .router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/events/{topic}"))
                    .header("content-type", "application/json")
                    .body(Body::from(envelope.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice::<Value>(&bytes).unwrap()["status"]
            .as_str()
            .unwrap()
            .to_owned()
    }

    async fn query(&self, uri: &str) -> Value {
        let response = self
            .router
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }
}

#[tokio::test]
async fn every_topic_lands_one_row_with_actor_and_payload() {
    let app = setup().await;

    let status = app
        .deliver(
            "task-events",
            envelope(
                "e-1",
                "com.todo.task.created.v1",
                "2026-03-01T12:00:00Z",
                json!({"task_id": "1", "user_id": "u1", "title": "t"}),
            ),
        )
        .await;
    assert_eq!(status, "SUCCESS");

    app.deliver(
        "reminder-events",
        envelope(
            "e-2",
            "com.todo.reminder.triggered.v1",
            "2026-03-01T12:05:00Z",
            json!({"reminder_id": "9", "task_id": "1", "user_id": "u1"}),
        ),
    )
    .await;
    app.deliver(
        "recurring-events",
        envelope(
            "e-3",
            "com.todo.recurring.generated.v1",
            "2026-03-01T12:06:00Z",
            json!({"original_task_id": "1", "new_task_id": "2", "user_id": "u1",
                   "recurrence_rule_id": "4", "occurrence_number": 1}),
        ),
    )
    .await;

    let (event_type, actor_id, payload): (String, Option<String>, Value) = sqlx::query_as(
        "SELECT event_type, actor_id, payload FROM audit_entries WHERE event_id = 'e-1'",
    )
    .fetch_one(&app.pool)
    .await
    .unwrap();
    assert_eq!(event_type, "com.todo.task.created.v1");
    assert_eq!(actor_id.as_deref(), Some("u1"));
    assert_eq!(payload["data"]["title"], "t");

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM audit_entries")
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert_eq!(total, 3);
}

#[tokio::test]
async fn redelivered_envelopes_never_create_a_second_row() {
    let app = setup().await;
    let event = envelope(
        "e-dup",
        "com.todo.task.completed.v1",
        "2026-03-01T12:00:00Z",
        json!({"task_id": "1", "user_id": "u1"}),
    );

    assert_eq!(app.deliver("task-events", event.clone()).await, "SUCCESS");
    // The KV guard misses (mock sidecar answers 501), so this exercises the
    // unique-index backstop.
    assert_eq!(app.deliver("task-events", event.clone()).await, "DROP");
    assert_eq!(app.deliver("task-events", event).await, "DROP");

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM audit_entries")
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert_eq!(total, 1);
}

#[tokio::test]
async fn audit_rows_are_immutable_at_the_storage_layer() {
    let app = setup().await;
    app.deliver(
        "task-events",
        envelope(
            "e-1",
            "com.todo.task.created.v1",
            "2026-03-01T12:00:00Z",
            json!({"task_id": "1", "user_id": "u1"}),
        ),
    )
    .await;

    let update = sqlx::query("UPDATE audit_entries SET source = 'tampered' WHERE event_id = 'e-1'")
        .execute(&app.pool)
        .await;
    assert!(update.is_err());

    let delete = sqlx::query("DELETE FROM audit_entries WHERE event_id = 'e-1'")
        .execute(&app.pool)
        .await;
    assert!(delete.is_err());
}

#[tokio::test]
async fn query_filters_sort_and_paginate() {
    let app = setup().await;
    for i in 1..=5 {
        app.deliver(
            "task-events",
            envelope(
                &format!("e-{i}"),
                if i % 2 == 0 {
                    "com.todo.task.updated.v1"
                } else {
                    "com.todo.task.created.v1"
                },
                &format!("2026-03-01T12:00:0{i}Z"),
                json!({"task_id": i.to_string(), "user_id": if i <= 3 { "u1" } else { "u2" }}),
            ),
        )
        .await;
    }

    // Newest event time first.
    let all = app.query("/audit").await;
    assert_eq!(all["total"], 5);
    assert_eq!(all["entries"][0]["event_id"], "e-5");
    assert_eq!(all["entries"][4]["event_id"], "e-1");

    let created = app.query("/audit?event_type=com.todo.task.created.v1").await;
    assert_eq!(created["total"], 3);

    let u2 = app.query("/audit?user_id=u2").await;
    assert_eq!(u2["total"], 2);
    assert_eq!(u2["entries"][0]["actor_id"], "u2");

    let paged = app.query("/audit?page=2&page_size=2").await;
    assert_eq!(paged["total"], 5);
    assert_eq!(paged["page"], 2);
    assert_eq!(paged["entries"].as_array().unwrap().len(), 2);
    assert_eq!(paged["entries"][0]["event_id"], "e-3");

    // Page size is clamped to the documented maximum.
    let clamped = app.query("/audit?page_size=1000").await;
    assert_eq!(clamped["page_size"], 200);

    let windowed = app
        .query("/audit?from=2026-03-01T12:00:02Z&to=2026-03-01T12:00:04Z")
        .await;
    assert_eq!(windowed["total"], 3);
}
