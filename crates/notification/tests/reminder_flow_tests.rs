use axum::body::Body;
use axum::http::Request;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use todoflow_notification::{router, AppState};
use todoflow_shared::sidecar::{EventPublisher, JobsClient, StateClient};
use todoflow_shared::IdempotencyGuard;

fn state_for(server: &mockito::Server) -> AppState {
    let http = reqwest::Client::new();
    AppState {
        publisher: EventPublisher::new(http.clone(), &server.url(), "todo-pubsub", "notification-service"),
        jobs: JobsClient::new(http.clone(), &server.url()),
        idempotency: IdempotencyGuard::new(
            StateClient::new(http, &server.url(), "todo-statestore"),
            "notification-service",
        ),
    }
}

async fn deliver(server: &mockito::Server, uri: &str, body: Value) -> String {
    let response = router(state_for(server))
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice::<Value>(&bytes).unwrap()["status"]
        .as_str()
        .unwrap()
        .to_owned()
}

#[tokio::test]
async fn job_callback_publishes_triggered_then_delivered() {
    let mut server = mockito::Server::new_async().await;

    let triggered = server
        .mock("POST", "/v1.0/publish/todo-pubsub/reminder-events")
        .match_body(mockito::Matcher::PartialJson(json!({
            "type": "com.todo.reminder.triggered.v1",
            "source": "notification-service",
            "data": {"reminder_id": "12", "task_id": "3", "user_id": "u1"}
        })))
        .with_status(204)
        .create_async()
        .await;

    let delivered = server
        .mock("POST", "/v1.0/publish/todo-pubsub/reminder-events")
        .match_body(mockito::Matcher::PartialJson(json!({
            "type": "com.todo.reminder.delivered.v1",
            "data": {"reminder_id": "12", "delivered_via": "websocket"}
        })))
        .with_status(204)
        .create_async()
        .await;

    // Scheduler wraps the job payload under `data`.
    let status = deliver(
        &server,
        "/job/reminder-12",
        json!({"data": {"reminder_id": "12", "task_id": "3", "user_id": "u1"}}),
    )
    .await;
    assert_eq!(status, "SUCCESS");

    triggered.assert_async().await;
    delivered.assert_async().await;
}

#[tokio::test]
async fn failed_triggered_publish_reports_reminder_failed() {
    let mut server = mockito::Server::new_async().await;

    // First publish (triggered) blows up; the failure event must still go out.
    server
        .mock("POST", "/v1.0/publish/todo-pubsub/reminder-events")
        .match_body(mockito::Matcher::PartialJson(
            json!({"type": "com.todo.reminder.triggered.v1"}),
        ))
        .with_status(500)
        .create_async()
        .await;

    let failed = server
        .mock("POST", "/v1.0/publish/todo-pubsub/reminder-events")
        .match_body(mockito::Matcher::PartialJson(json!({
            "type": "com.todo.reminder.failed.v1",
            "data": {"reminder_id": "12"}
        })))
        .with_status(204)
        .create_async()
        .await;

    let status = deliver(
        &server,
        "/job/reminder-12",
        json!({"data": {"reminder_id": "12", "task_id": "3", "user_id": "u1"}}),
    )
    .await;
    assert_eq!(status, "SUCCESS");
    failed.assert_async().await;
}

fn deleted_envelope(event_id: &str) -> Value {
    json!({
        "specversion": "1.0",
        "type": "com.todo.task.deleted.v1",
        "source": "command-service",
        "id": event_id,
        "time": "2026-03-01T12:00:00Z",
        "datacontenttype": "application/json",
        "data": {"task_id": "3", "user_id": "u1"},
    })
}

#[tokio::test]
async fn task_deleted_cancels_the_reminder_job() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock(
            "GET",
            "/v1.0/state/todo-statestore/idempotency:notification-service:e-del",
        )
        .with_status(204)
        .create_async()
        .await;
    let marked = server
        .mock("POST", "/v1.0/state/todo-statestore")
        .with_status(204)
        .create_async()
        .await;

    // The job may already be gone; 404 still counts as cancelled.
    let cancel = server
        .mock("DELETE", "/v1.0-alpha1/jobs/reminder-3")
        .with_status(404)
        .create_async()
        .await;

    let status = deliver(&server, "/events/task-events", deleted_envelope("e-del")).await;
    assert_eq!(status, "SUCCESS");
    cancel.assert_async().await;
    marked.assert_async().await;
}

#[tokio::test]
async fn duplicate_task_deleted_is_dropped_without_cancelling() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock(
            "GET",
            "/v1.0/state/todo-statestore/idempotency:notification-service:e-dup",
        )
        .with_status(200)
        .with_body(r#"{"processed_at":"2026-03-01T00:00:00Z"}"#)
        .create_async()
        .await;

    let cancel = server
        .mock("DELETE", "/v1.0-alpha1/jobs/reminder-3")
        .expect(0)
        .create_async()
        .await;

    let status = deliver(&server, "/events/task-events", deleted_envelope("e-dup")).await;
    assert_eq!(status, "DROP");
    cancel.assert_async().await;
}

#[tokio::test]
async fn non_deletion_task_events_are_ignored() {
    let server = mockito::Server::new_async().await;
    let envelope = json!({
        "specversion": "1.0",
        "type": "com.todo.task.completed.v1",
        "source": "command-service",
        "id": "e-other",
        "time": "2026-03-01T12:00:00Z",
        "datacontenttype": "application/json",
        "data": {"task_id": "3", "user_id": "u1"},
    });
    assert_eq!(deliver(&server, "/events/task-events", envelope).await, "SUCCESS");
}

#[tokio::test]
async fn reminder_scheduled_is_observed_and_marked_processed() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock(
            "GET",
            "/v1.0/state/todo-statestore/idempotency:notification-service:e-sched",
        )
        .with_status(204)
        .create_async()
        .await;
    let marked = server
        .mock("POST", "/v1.0/state/todo-statestore")
        .with_status(204)
        .create_async()
        .await;

    let envelope = json!({
        "specversion": "1.0",
        "type": "com.todo.reminder.scheduled.v1",
        "source": "command-service",
        "id": "e-sched",
        "time": "2026-03-01T12:00:00Z",
        "datacontenttype": "application/json",
        "data": {
            "reminder_id": "12",
            "task_id": "3",
            "user_id": "u1",
            "trigger_time": "2026-03-01T13:00:00Z"
        },
    });
    assert_eq!(deliver(&server, "/events/reminder-events", envelope).await, "SUCCESS");
    marked.assert_async().await;
}
