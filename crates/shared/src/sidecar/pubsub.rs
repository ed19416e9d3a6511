use serde::Serialize;

use crate::error::SidecarError;
use crate::events::topic_for;
use crate::Envelope;

/// Publishes CloudEvents to the broker through the sidecar pub/sub API:
/// `POST {base}/v1.0/publish/{pubsub}/{topic}`.
#[derive(Clone)]
pub struct EventPublisher {
    http: reqwest::Client,
    base_url: String,
    pubsub: String,
    source: String,
}

impl EventPublisher {
    pub fn new(http: reqwest::Client, base_url: &str, pubsub: &str, source: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_owned(),
            pubsub: pubsub.to_owned(),
            source: source.to_owned(),
        }
    }

    /// The service name stamped into the `source` attribute.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Wrap `data` in a fresh envelope and publish it to the topic mapped
    /// from `event_type`. Returns the envelope so callers can log its id.
    pub async fn publish<T: Serialize>(
        &self,
        event_type: &str,
        data: &T,
    ) -> Result<Envelope, SidecarError> {
        let envelope = Envelope::new(event_type, &self.source, data)?;
        self.publish_envelope(&envelope).await?;
        Ok(envelope)
    }

    pub async fn publish_envelope(&self, envelope: &Envelope) -> Result<(), SidecarError> {
        let topic = topic_for(&envelope.event_type)
            .ok_or_else(|| SidecarError::UnknownEventType(envelope.event_type.clone()))?;
        let url = format!("{}/v1.0/publish/{}/{}", self.base_url, self.pubsub, topic);

        let response = self
            .http
            .post(&url)
            .header("content-type", "application/cloudevents+json")
            .json(envelope)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SidecarError::from_response(response).await);
        }

        tracing::info!(
            event_type = %envelope.event_type,
            event_id = %envelope.id,
            topic,
            "published event"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn publish_posts_envelope_to_mapped_topic() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1.0/publish/todo-pubsub/task-events")
            .match_header("content-type", "application/cloudevents+json")
            .with_status(204)
            .create_async()
            .await;

        let publisher = EventPublisher::new(
            reqwest::Client::new(),
            &server.url(),
            "todo-pubsub",
            "command-service",
        );

        let envelope = publisher
            .publish(
                crate::events::TASK_CREATED,
                &json!({"task_id": "1", "user_id": "u1"}),
            )
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(envelope.source, "command-service");
        assert_eq!(envelope.event_type, crate::events::TASK_CREATED);
    }

    #[tokio::test]
    async fn publish_surfaces_broker_errors() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1.0/publish/todo-pubsub/reminder-events")
            .with_status(500)
            .with_body("broker down")
            .create_async()
            .await;

        let publisher = EventPublisher::new(
            reqwest::Client::new(),
            &server.url(),
            "todo-pubsub",
            "notification-service",
        );

        let err = publisher
            .publish(crate::events::REMINDER_TRIGGERED, &json!({}))
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn unknown_event_type_is_rejected_without_io() {
        let publisher = EventPublisher::new(
            reqwest::Client::new(),
            "http://localhost:1",
            "todo-pubsub",
            "command-service",
        );
        let err = publisher
            .publish("com.other.event.v1", &json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, SidecarError::UnknownEventType(_)));
        assert!(!err.is_transient());
    }
}
