use thiserror::Error;

/// Failure talking to the sidecar (broker publish, state store, scheduler
/// jobs, or service invocation).
#[derive(Error, Debug)]
pub enum SidecarError {
    #[error("sidecar transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("sidecar returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("no topic mapping for event type {0}")]
    UnknownEventType(String),
}

impl SidecarError {
    /// Transient failures are worth a bus redelivery; permanent ones are
    /// logged and dropped.
    pub fn is_transient(&self) -> bool {
        match self {
            SidecarError::Transport(err) => {
                err.is_connect() || err.is_timeout() || err.is_request()
            }
            SidecarError::Status { status, .. } => status.is_server_error(),
            SidecarError::Serialization(_) | SidecarError::UnknownEventType(_) => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            SidecarError::Status { status, .. } if *status == reqwest::StatusCode::NOT_FOUND
        )
    }

    pub(crate) async fn from_response(response: reqwest::Response) -> Self {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        SidecarError::Status { status, body }
    }
}
