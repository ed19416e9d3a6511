use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::SidecarError;

/// Service-to-service calls over the sidecar invocation channel:
/// `{base}/v1.0/invoke/{app_id}/method/{path}`.
///
/// Callers authenticate with a bearer token whose `sub` claim is the owner
/// principal, so invoked endpoints apply the same ownership checks as
/// user-facing ones.
#[derive(Clone)]
pub struct InvocationClient {
    http: reqwest::Client,
    base_url: String,
    app_id: String,
}

impl InvocationClient {
    pub fn new(http: reqwest::Client, base_url: &str, app_id: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_owned(),
            app_id: app_id.to_owned(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/v1.0/invoke/{}/method/{}",
            self.base_url,
            self.app_id,
            path.trim_start_matches('/')
        )
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        token: &str,
    ) -> Result<T, SidecarError> {
        let response = self
            .http
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await?;
        Self::decode(response).await
    }

    pub async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        token: &str,
        body: &B,
    ) -> Result<T, SidecarError> {
        let response = self
            .http
            .post(self.url(path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await?;
        Self::decode(response).await
    }

    pub async fn patch_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        token: &str,
        body: &B,
    ) -> Result<T, SidecarError> {
        let response = self
            .http
            .patch(self.url(path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, SidecarError> {
        if !response.status().is_success() {
            return Err(SidecarError::from_response(response).await);
        }
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[tokio::test]
    async fn get_json_routes_through_invocation_path() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock(
                "GET",
                "/v1.0/invoke/command-service/method/api/recurrence-rules/4",
            )
            .match_header("authorization", "Bearer token-abc")
            .with_status(200)
            .with_body(r#"{"id": 4, "frequency": "weekly"}"#)
            .create_async()
            .await;

        let client = InvocationClient::new(reqwest::Client::new(), &server.url(), "command-service");
        let rule: Value = client
            .get_json("/api/recurrence-rules/4", "token-abc")
            .await
            .unwrap();
        mock.assert_async().await;
        assert_eq!(rule["frequency"], "weekly");
    }

    #[tokio::test]
    async fn non_success_statuses_become_typed_errors() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1.0/invoke/command-service/method/api/tasks/7")
            .with_status(404)
            .with_body(r#"{"error":"NotFound"}"#)
            .create_async()
            .await;

        let client = InvocationClient::new(reqwest::Client::new(), &server.url(), "command-service");
        let err = client
            .get_json::<Value>("/api/tasks/7", "t")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn upstream_5xx_is_transient() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1.0/invoke/command-service/method/api/tasks")
            .with_status(503)
            .create_async()
            .await;

        let client = InvocationClient::new(reqwest::Client::new(), &server.url(), "command-service");
        let err = client
            .post_json::<_, Value>("/api/tasks", "t", &json!({"title": "x"}))
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }
}
