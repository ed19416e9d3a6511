use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use tower::ServiceExt;

use todoflow_command::{router, AppState};
use todoflow_shared::sidecar::{EventPublisher, JobsClient, StateClient};
use todoflow_shared::IdempotencyGuard;

pub const TEST_SECRET: &str = "test-secret";

pub struct TestApp {
    pub router: Router,
    pub pool: SqlitePool,
    pub sidecar: mockito::ServerGuard,
}

/// In-memory database plus a mockito sidecar standing in for the broker,
/// state store and scheduler.
pub async fn setup() -> TestApp {
    let sidecar = mockito::Server::new_async().await;

    // A single connection keeps the in-memory database alive and shared.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory database");
    sqlx::migrate!("../../migrations/command")
        .run(&pool)
        .await
        .expect("migrations");

    let http = reqwest::Client::new();
    let state = AppState {
        read_pool: pool.clone(),
        write_pool: pool.clone(),
        publisher: EventPublisher::new(http.clone(), &sidecar.url(), "todo-pubsub", "command-service"),
        jobs: JobsClient::new(http.clone(), &sidecar.url()),
        idempotency: IdempotencyGuard::new(
            StateClient::new(http, &sidecar.url(), "todo-statestore"),
            "command-service",
        ),
        jwt_secret: TEST_SECRET.to_owned(),
    };

    TestApp {
        router: router(state),
        pool,
        sidecar,
    }
}

pub fn bearer(user_id: &str) -> String {
    let token = todoflow_shared::token::issue(user_id, TEST_SECRET, 3600).expect("token");
    format!("Bearer {token}")
}

pub fn json_request(method: &str, uri: &str, user_id: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .header("authorization", bearer(user_id))
        .body(Body::from(body.to_string()))
        .expect("request")
}

pub fn empty_request(method: &str, uri: &str, user_id: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", bearer(user_id))
        .body(Body::empty())
        .expect("request")
}

pub async fn body_json(response: Response<axum::body::Body>) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("json body")
}

impl TestApp {
    pub async fn request(&self, request: Request<Body>) -> Response<axum::body::Body> {
        self.router.clone().oneshot(request).await.expect("response")
    }

    /// Convenience: create a task and return its id.
    pub async fn create_task(&self, user_id: &str, body: serde_json::Value) -> i64 {
        let response = self
            .request(json_request("POST", "/api/tasks", user_id, body))
            .await;
        assert_eq!(response.status(), axum::http::StatusCode::CREATED);
        body_json(response).await["id"].as_i64().expect("task id")
    }
}
