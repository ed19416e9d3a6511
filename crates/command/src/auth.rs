//! Bearer-token authentication for the command surface.
//!
//! The `sub` claim is the only source of the owner principal; user ids are
//! never read from paths, query strings, or bodies.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};

use crate::app::AppState;

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
}

pub struct AuthRejection;

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": "Unauthorized",
            "message": "Missing or invalid authentication token.",
        });
        (StatusCode::UNAUTHORIZED, Json(body)).into_response()
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(AuthRejection)?;

        let token = header.strip_prefix("Bearer ").ok_or(AuthRejection)?;

        let user_id = todoflow_shared::token::verify(token, &state.jwt_secret)
            .map_err(|_| AuthRejection)?;

        Ok(AuthUser { user_id })
    }
}
