use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found")]
    NotFound,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl IntoResponse for CommandError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self {
            CommandError::Validation(msg) => (StatusCode::BAD_REQUEST, "ValidationFailed", msg),
            // Ownership mismatches deliberately collapse into the same 404
            // as a missing row so ids cannot be enumerated.
            CommandError::NotFound => (
                StatusCode::NOT_FOUND,
                "NotFound",
                "The requested resource could not be found.".to_owned(),
            ),
            CommandError::Database(err) => {
                tracing::error!(error = ?err, "database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "InternalError",
                    "An unexpected error occurred. Please try again later.".to_owned(),
                )
            }
            CommandError::Serialization(err) => {
                tracing::error!(error = %err, "serialization error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "InternalError",
                    "An unexpected error occurred. Please try again later.".to_owned(),
                )
            }
        };

        let body = serde_json::json!({
            "error": error,
            "message": message,
        });
        (status, Json(body)).into_response()
    }
}
