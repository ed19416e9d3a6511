use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};

/// Outcome a subscription handler reports back to the bus.
///
/// `Success` and `Drop` acknowledge the delivery; `Retry` asks the bus to
/// redeliver, relying on the idempotency guard to keep the replay safe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventStatus {
    Success,
    Retry,
    Drop,
}

#[derive(Serialize, Deserialize)]
struct StatusBody {
    status: EventStatus,
}

impl IntoResponse for EventStatus {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(StatusBody { status: self })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_serialize_to_bus_wire_words() {
        assert_eq!(
            serde_json::to_string(&EventStatus::Success).unwrap(),
            r#""SUCCESS""#
        );
        assert_eq!(
            serde_json::to_string(&EventStatus::Retry).unwrap(),
            r#""RETRY""#
        );
        assert_eq!(
            serde_json::to_string(&EventStatus::Drop).unwrap(),
            r#""DROP""#
        );
    }
}
