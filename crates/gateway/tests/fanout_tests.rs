use std::sync::Arc;

use axum::body::Body;
use axum::extract::ws::Message;
use axum::http::Request;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tower::ServiceExt;

use todoflow_gateway::{router, AppState, ConnectionManager};
use todoflow_shared::sidecar::StateClient;
use todoflow_shared::Envelope;

fn manager_for(server: &mockito::Server) -> ConnectionManager {
    let state = StateClient::new(reqwest::Client::new(), &server.url(), "todo-statestore");
    ConnectionManager::new(state, "gateway-test-1")
}

fn envelope(event_type: &str, data: Value) -> Envelope {
    serde_json::from_value(json!({
        "specversion": "1.0",
        "type": event_type,
        "source": "command-service",
        "id": "e-1",
        "time": "2026-03-01T12:00:00Z",
        "datacontenttype": "application/json",
        "data": data,
    }))
    .unwrap()
}

fn frame_json(message: Message) -> Value {
    match message {
        Message::Text(text) => serde_json::from_str(text.as_str()).unwrap(),
        other => panic!("expected text frame, got {other:?}"),
    }
}

#[tokio::test]
async fn connect_registers_presence_in_shared_state() {
    let mut server = mockito::Server::new_async().await;
    let presence = server
        .mock("POST", "/v1.0/state/todo-statestore")
        .match_body(mockito::Matcher::PartialJson(json!([{
            "key": "ws-connections:u1",
            "value": {"instance": "gateway-test-1"}
        }])))
        .with_status(204)
        .create_async()
        .await;

    let manager = manager_for(&server);
    let (sender, _receiver) = mpsc::unbounded_channel();
    manager.register("u1", sender).await;

    presence.assert_async().await;
    assert!(manager.is_connected("u1").await);
}

#[tokio::test]
async fn disconnect_clears_presence() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/v1.0/state/todo-statestore")
        .with_status(204)
        .create_async()
        .await;
    let cleared = server
        .mock("DELETE", "/v1.0/state/todo-statestore/ws-connections:u1")
        .with_status(204)
        .create_async()
        .await;

    let manager = manager_for(&server);
    let (sender, _receiver) = mpsc::unbounded_channel();
    manager.register("u1", sender).await;
    manager.unregister("u1").await;

    cleared.assert_async().await;
    assert!(!manager.is_connected("u1").await);
}

#[tokio::test]
async fn task_events_become_task_frames_for_the_owner() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/v1.0/state/todo-statestore")
        .with_status(204)
        .create_async()
        .await;

    let manager = manager_for(&server);
    let (sender, mut receiver) = mpsc::unbounded_channel();
    manager.register("u1", sender).await;

    let envelope = envelope(
        "com.todo.task.completed.v1",
        json!({"task_id": "7", "user_id": "u1", "had_recurrence_rule": false}),
    );
    todoflow_gateway::handlers::handle_task_event(&manager, &envelope).await;

    let frame = frame_json(receiver.recv().await.unwrap());
    assert_eq!(frame["type"], "task");
    assert_eq!(frame["event_type"], "completed");
    assert_eq!(frame["task_id"], "7");
    assert_eq!(frame["data"]["user_id"], "u1");
}

#[tokio::test]
async fn live_reminders_are_pushed_to_connected_users() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/v1.0/state/todo-statestore")
        .with_status(204)
        .create_async()
        .await;

    let manager = manager_for(&server);
    let (sender, mut receiver) = mpsc::unbounded_channel();
    manager.register("u1", sender).await;

    let envelope = envelope(
        "com.todo.reminder.triggered.v1",
        json!({"reminder_id": "12", "task_id": "7", "user_id": "u1"}),
    );
    todoflow_gateway::handlers::handle_reminder_event(&manager, &envelope).await;

    let frame = frame_json(receiver.recv().await.unwrap());
    assert_eq!(frame["type"], "reminder");
    assert_eq!(frame["source"], "live");
    assert_eq!(frame["data"]["reminder_id"], "12");
}

#[tokio::test]
async fn offline_reminders_are_queued_in_shared_state() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/v1.0/state/todo-statestore/reminder-queue:u2")
        .with_status(204)
        .create_async()
        .await;
    let queued = server
        .mock("POST", "/v1.0/state/todo-statestore")
        .match_body(mockito::Matcher::PartialJson(json!([{
            "key": "reminder-queue:u2",
            "value": [{"reminder_id": "12", "task_id": "7"}]
        }])))
        .with_status(204)
        .create_async()
        .await;

    let manager = manager_for(&server);
    let envelope = envelope(
        "com.todo.reminder.triggered.v1",
        json!({"reminder_id": "12", "task_id": "7", "user_id": "u2"}),
    );
    todoflow_gateway::handlers::handle_reminder_event(&manager, &envelope).await;

    queued.assert_async().await;
}

#[tokio::test]
async fn reconnect_replays_queued_reminders_in_order_then_clears_the_queue() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/v1.0/state/todo-statestore")
        .with_status(204)
        .create_async()
        .await;
    server
        .mock("GET", "/v1.0/state/todo-statestore/reminder-queue:u1")
        .with_status(200)
        .with_body(
            json!([
                {"reminder_id": "1", "task_id": "7", "triggered_at": "2026-03-01T12:00:05Z"},
                {"reminder_id": "2", "task_id": "8", "triggered_at": "2026-03-01T12:00:06Z"}
            ])
            .to_string(),
        )
        .create_async()
        .await;
    let cleared = server
        .mock("DELETE", "/v1.0/state/todo-statestore/reminder-queue:u1")
        .with_status(204)
        .create_async()
        .await;

    let manager = manager_for(&server);
    let (sender, mut receiver) = mpsc::unbounded_channel();
    manager.register("u1", sender).await;
    manager.replay_missed_events("u1").await;

    let first = frame_json(receiver.recv().await.unwrap());
    assert_eq!(first["type"], "reminder");
    assert_eq!(first["source"], "replay");
    assert_eq!(first["data"]["reminder_id"], "1");

    let second = frame_json(receiver.recv().await.unwrap());
    assert_eq!(second["data"]["reminder_id"], "2");

    cleared.assert_async().await;
}

#[tokio::test]
async fn bus_intake_routes_acknowledge_with_success() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/v1.0/state/todo-statestore")
        .with_status(204)
        .create_async()
        .await;

    let manager = Arc::new(manager_for(&server));
    let (sender, mut receiver) = mpsc::unbounded_channel();
    manager.register("u1", sender).await;

    let body = json!({
        "specversion": "1.0",
        "type": "com.todo.task.updated.v1",
        "source": "command-service",
        "id": "e-intake",
        "time": "2026-03-01T12:00:00Z",
        "datacontenttype": "application/json",
        "data": {"task_id": "7", "user_id": "u1", "changes": {"title": "renamed"}},
    });
    let response = router(AppState { manager })
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/events/task-events")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), axum::http::StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let status: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(status["status"], "SUCCESS");

    let frame = frame_json(receiver.recv().await.unwrap());
    assert_eq!(frame["event_type"], "updated");
}

#[tokio::test]
async fn send_to_dropped_socket_unregisters_the_user() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/v1.0/state/todo-statestore")
        .with_status(204)
        .create_async()
        .await;
    server
        .mock("DELETE", "/v1.0/state/todo-statestore/ws-connections:u1")
        .with_status(204)
        .create_async()
        .await;

    let manager = manager_for(&server);
    let (sender, receiver) = mpsc::unbounded_channel();
    manager.register("u1", sender).await;
    drop(receiver);

    assert!(!manager.send_to_user("u1", &json!({"type": "task"})).await);
    assert!(!manager.is_connected("u1").await);
}
