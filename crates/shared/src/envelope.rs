use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// CloudEvents v1.0 JSON envelope carrying one domain event.
///
/// Consumers key idempotency on `id`; two envelopes with the same id are the
/// same event regardless of how often the bus redelivers them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub specversion: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub source: String,
    pub id: String,
    pub time: String,
    pub datacontenttype: String,
    pub data: serde_json::Value,
}

impl Envelope {
    pub fn new<T: Serialize>(
        event_type: &str,
        source: &str,
        data: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            specversion: "1.0".to_owned(),
            event_type: event_type.to_owned(),
            source: source.to_owned(),
            id: Uuid::new_v4().to_string(),
            time: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
            datacontenttype: "application/json".to_owned(),
            data: serde_json::to_value(data)?,
        })
    }

    /// Deserialize the payload into a typed event struct.
    pub fn data_as<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.data.clone())
    }

    /// The `user_id` field of the payload, when the event carries one.
    pub fn actor_id(&self) -> Option<String> {
        self.data
            .get("user_id")
            .and_then(|v| v.as_str())
            .map(str::to_owned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_uses_cloudevents_field_names() {
        let envelope = Envelope::new(
            "com.todo.task.created.v1",
            "command-service",
            &json!({"task_id": "1", "user_id": "u1"}),
        )
        .unwrap();

        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value["specversion"], "1.0");
        assert_eq!(value["type"], "com.todo.task.created.v1");
        assert_eq!(value["source"], "command-service");
        assert_eq!(value["datacontenttype"], "application/json");
        assert!(value["id"].as_str().unwrap().len() >= 32);
        assert!(value["time"].as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn envelope_ids_are_unique() {
        let a = Envelope::new("t", "s", &json!({})).unwrap();
        let b = Envelope::new("t", "s", &json!({})).unwrap();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn actor_id_reads_user_id_from_payload() {
        let envelope =
            Envelope::new("t", "s", &json!({"user_id": "u42", "task_id": "7"})).unwrap();
        assert_eq!(envelope.actor_id().as_deref(), Some("u42"));

        let anonymous = Envelope::new("t", "s", &json!({"task_id": "7"})).unwrap();
        assert_eq!(anonymous.actor_id(), None);
    }
}
