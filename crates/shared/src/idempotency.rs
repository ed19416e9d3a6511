use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::sidecar::StateClient;

const IDEMPOTENCY_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Serialize, Deserialize)]
struct ProcessedMark {
    processed_at: String,
}

/// Per-service duplicate-delivery guard backed by the shared state store.
///
/// Key pattern `idempotency:{service}:{event_id}`, 24 h TTL. A read failure
/// counts as a miss so an unavailable store degrades to at-least-once
/// processing instead of dropping events.
#[derive(Clone)]
pub struct IdempotencyGuard {
    state: StateClient,
    service: String,
}

impl IdempotencyGuard {
    pub fn new(state: StateClient, service: &str) -> Self {
        Self {
            state,
            service: service.to_owned(),
        }
    }

    fn key(&self, event_id: &str) -> String {
        format!("idempotency:{}:{}", self.service, event_id)
    }

    pub async fn is_duplicate(&self, event_id: &str) -> bool {
        let key = self.key(event_id);
        match self.state.get::<ProcessedMark>(&key).await {
            Ok(mark) => mark.is_some(),
            Err(err) => {
                tracing::warn!(key, error = %err, "idempotency check failed, treating as miss");
                false
            }
        }
    }

    pub async fn mark_processed(&self, event_id: &str) {
        let key = self.key(event_id);
        let mark = ProcessedMark {
            processed_at: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
        };
        if let Err(err) = self.state.set(&key, &mark, Some(IDEMPOTENCY_TTL)).await {
            tracing::error!(key, error = %err, "failed to mark event processed");
        }
    }
}
