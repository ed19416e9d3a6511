use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::{Json, Response};
use axum::routing::{any, get, post};
use axum::Router;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;

use todoflow_shared::{Envelope, EventStatus};

use crate::connections::ConnectionManager;
use crate::{handlers, MISSING_USER_ID_CLOSE_CODE};

#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<ConnectionManager>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ws", any(ws_upgrade))
        .route("/events/task-events", post(task_events))
        .route("/events/reminder-events", post(reminder_events))
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "websocket-gateway",
    }))
}

#[derive(Debug, Deserialize)]
struct WsParams {
    user_id: Option<String>,
}

async fn ws_upgrade(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, params.user_id, state.manager))
}

async fn handle_socket(mut socket: WebSocket, user_id: Option<String>, manager: Arc<ConnectionManager>) {
    let Some(user_id) = user_id.filter(|id| !id.is_empty()) else {
        let frame = CloseFrame {
            code: MISSING_USER_ID_CLOSE_CODE,
            reason: "user_id query parameter required".into(),
        };
        let _ = socket.send(Message::Close(Some(frame))).await;
        return;
    };

    let (mut sink, mut stream) = socket.split();
    let (sender, mut outbound) = mpsc::unbounded_channel::<Message>();

    // One writer task per socket; everything else goes through the channel.
    let writer = tokio::spawn(async move {
        while let Some(message) = outbound.recv().await {
            if sink.send(message).await.is_err() {
                break;
            }
        }
    });

    manager.register(&user_id, sender).await;
    manager.replay_missed_events(&user_id).await;

    // The protocol is server-push-dominant; inbound frames are keep-alives
    // and acks, logged for observability only.
    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Text(text)) => {
                tracing::debug!(user_id = %user_id, message = %text, "client message");
            }
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => {}
        }
    }

    manager.unregister(&user_id).await;
    writer.abort();
}

async fn task_events(State(state): State<AppState>, Json(envelope): Json<Envelope>) -> EventStatus {
    tracing::info!(event_type = %envelope.event_type, event_id = %envelope.id, "task event received");
    handlers::handle_task_event(&state.manager, &envelope).await;
    EventStatus::Success
}

async fn reminder_events(
    State(state): State<AppState>,
    Json(envelope): Json<Envelope>,
) -> EventStatus {
    tracing::info!(event_type = %envelope.event_type, event_id = %envelope.id, "reminder event received");
    handlers::handle_reminder_event(&state.manager, &envelope).await;
    EventStatus::Success
}
