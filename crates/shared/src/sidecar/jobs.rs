use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::error::SidecarError;

/// One-shot timers owned by the scheduler sidecar:
/// `POST/DELETE {base}/v1.0-alpha1/jobs/{name}`.
#[derive(Clone)]
pub struct JobsClient {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct JobRequest<'a, T: Serialize> {
    #[serde(rename = "dueTime")]
    due_time: String,
    data: &'a T,
}

impl JobsClient {
    pub fn new(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_owned(),
        }
    }

    /// Schedule a one-shot job. The scheduler calls the owning service back
    /// at `/job/{name}` with `data` under a `data` wrapper when it fires.
    pub async fn schedule<T: Serialize>(
        &self,
        name: &str,
        due_time: DateTime<Utc>,
        data: &T,
    ) -> Result<(), SidecarError> {
        let url = format!("{}/v1.0-alpha1/jobs/{}", self.base_url, name);
        let body = JobRequest {
            due_time: due_time.to_rfc3339_opts(SecondsFormat::Secs, true),
            data,
        };

        let response = self.http.post(&url).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(SidecarError::from_response(response).await);
        }

        tracing::info!(job = name, due_time = %body.due_time, "scheduled job");
        Ok(())
    }

    /// Cancel a job. A 404 means the job already fired or was cancelled,
    /// which callers treat as success.
    pub async fn cancel(&self, name: &str) -> Result<(), SidecarError> {
        let url = format!("{}/v1.0-alpha1/jobs/{}", self.base_url, name);
        let response = self.http.delete(&url).send().await?;

        match response.status() {
            status if status.is_success() => {
                tracing::info!(job = name, "cancelled job");
                Ok(())
            }
            status if status == reqwest::StatusCode::NOT_FOUND => {
                tracing::info!(job = name, "job already gone, nothing to cancel");
                Ok(())
            }
            _ => Err(SidecarError::from_response(response).await),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[tokio::test]
    async fn schedule_posts_due_time_and_payload() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1.0-alpha1/jobs/reminder-12")
            .match_body(mockito::Matcher::PartialJson(json!({
                "dueTime": "2026-03-01T09:00:00Z",
                "data": {"reminder_id": "12", "task_id": "3", "user_id": "u1"}
            })))
            .with_status(204)
            .create_async()
            .await;

        let jobs = JobsClient::new(reqwest::Client::new(), &server.url());
        jobs.schedule(
            "reminder-12",
            Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
            &json!({"reminder_id": "12", "task_id": "3", "user_id": "u1"}),
        )
        .await
        .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn cancel_treats_404_as_success() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("DELETE", "/v1.0-alpha1/jobs/reminder-99")
            .with_status(404)
            .create_async()
            .await;

        let jobs = JobsClient::new(reqwest::Client::new(), &server.url());
        jobs.cancel("reminder-99").await.unwrap();
    }

    #[tokio::test]
    async fn cancel_surfaces_scheduler_errors() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("DELETE", "/v1.0-alpha1/jobs/reminder-1")
            .with_status(500)
            .create_async()
            .await;

        let jobs = JobsClient::new(reqwest::Client::new(), &server.url());
        assert!(jobs.cancel("reminder-1").await.is_err());
    }
}
