//! Per-instance socket registry plus the shared-KV presence and offline
//! queue that let multiple gateway instances coexist.

use std::collections::HashMap;
use std::time::Duration;

use axum::extract::ws::Message;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, RwLock};

use todoflow_shared::sidecar::StateClient;

const QUEUE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

fn presence_key(user_id: &str) -> String {
    format!("ws-connections:{user_id}")
}

fn queue_key(user_id: &str) -> String {
    format!("reminder-queue:{user_id}")
}

#[derive(Serialize)]
struct Presence {
    instance: String,
    connected_at: String,
}

pub struct ConnectionManager {
    connections: RwLock<HashMap<String, mpsc::UnboundedSender<Message>>>,
    state: StateClient,
    instance: String,
}

impl ConnectionManager {
    pub fn new(state: StateClient, instance: &str) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            state,
            instance: instance.to_owned(),
        }
    }

    /// Track the socket locally and register presence in the shared KV.
    pub async fn register(&self, user_id: &str, sender: mpsc::UnboundedSender<Message>) {
        self.connections
            .write()
            .await
            .insert(user_id.to_owned(), sender);
        tracing::info!(user_id, "websocket connected");

        let presence = Presence {
            instance: self.instance.clone(),
            connected_at: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
        };
        if let Err(err) = self
            .state
            .set(&presence_key(user_id), &presence, None)
            .await
        {
            tracing::error!(user_id, error = %err, "failed to register presence");
        }
    }

    /// Drop the socket and clear presence; missing entries are fine.
    pub async fn unregister(&self, user_id: &str) {
        self.connections.write().await.remove(user_id);
        tracing::info!(user_id, "websocket disconnected");

        if let Err(err) = self.state.delete(&presence_key(user_id)).await {
            tracing::error!(user_id, error = %err, "failed to clear presence");
        }
    }

    pub async fn is_connected(&self, user_id: &str) -> bool {
        self.connections.read().await.contains_key(user_id)
    }

    /// Push a JSON frame to the user's live socket. A send failure means
    /// the receiver side is gone, so the connection is cleaned up.
    pub async fn send_to_user<T: Serialize>(&self, user_id: &str, frame: &T) -> bool {
        let text = match serde_json::to_string(frame) {
            Ok(text) => text,
            Err(err) => {
                tracing::error!(user_id, error = %err, "failed to serialize frame");
                return false;
            }
        };

        let sender = self.connections.read().await.get(user_id).cloned();
        match sender {
            Some(sender) => {
                if sender.send(Message::Text(text.into())).is_ok() {
                    true
                } else {
                    tracing::warn!(user_id, "socket gone mid-send, unregistering");
                    self.unregister(user_id).await;
                    false
                }
            }
            None => {
                tracing::debug!(user_id, "user not connected on this instance");
                false
            }
        }
    }

    /// Replay reminders that fired while the user was offline, oldest first,
    /// then clear the queue. The queue survives a partial replay so nothing
    /// is lost if the socket dies mid-drain.
    pub async fn replay_missed_events(&self, user_id: &str) {
        let key = queue_key(user_id);
        let queued: Vec<serde_json::Value> = match self.state.get(&key).await {
            Ok(Some(queued)) => queued,
            Ok(None) => {
                tracing::debug!(user_id, "no missed events");
                return;
            }
            Err(err) => {
                tracing::error!(user_id, error = %err, "failed to read reminder queue");
                return;
            }
        };

        tracing::info!(user_id, count = queued.len(), "replaying missed reminders");
        for event in &queued {
            let frame = serde_json::json!({
                "type": "reminder",
                "source": "replay",
                "data": event,
            });
            if !self.send_to_user(user_id, &frame).await {
                return;
            }
        }

        if let Err(err) = self.state.delete(&key).await {
            tracing::error!(user_id, error = %err, "failed to clear reminder queue");
        }
    }

    /// Append a reminder to the user's offline queue (read-modify-write;
    /// writes are per-key, which is all the store guarantees).
    pub async fn queue_reminder(&self, user_id: &str, entry: serde_json::Value) {
        let key = queue_key(user_id);
        let mut queue: Vec<serde_json::Value> = match self.state.get(&key).await {
            Ok(Some(queue)) => queue,
            Ok(None) => Vec::new(),
            Err(err) => {
                tracing::error!(user_id, error = %err, "failed to read reminder queue");
                Vec::new()
            }
        };
        queue.push(entry);

        match self.state.set(&key, &queue, Some(QUEUE_TTL)).await {
            Ok(()) => {
                tracing::info!(user_id, queue_len = queue.len(), "queued reminder for offline user")
            }
            Err(err) => tracing::error!(user_id, error = %err, "failed to queue reminder"),
        }
    }
}
