//! Typed calls to the command service over the sidecar invocation channel.
//!
//! Each call carries a short-lived bearer token minted with the shared
//! secret and the task owner as `sub`, so the command service applies the
//! same ownership checks it applies to user traffic.

use serde::{Deserialize, Serialize};
use todoflow_shared::sidecar::InvocationClient;
use todoflow_shared::{token, SidecarError};

const OWNER_TOKEN_TTL_SECONDS: u64 = 300;

#[derive(Debug, Clone, Deserialize)]
pub struct RuleDto {
    pub id: i64,
    pub task_id: i64,
    pub frequency: String,
    pub end_after_count: Option<i64>,
    pub end_by_date: Option<String>,
    pub occurrences_generated: i64,
    pub is_active: bool,
    pub base_due_date: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TaskDto {
    pub id: i64,
    pub user_id: String,
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateTaskBody {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    pub recurrence_rule_id: i64,
}

#[derive(Debug, Serialize)]
pub struct RulePatchBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub occurrences_generated: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_due_date: Option<String>,
}

#[derive(Clone)]
pub struct CommandClient {
    invoke: InvocationClient,
    jwt_secret: String,
}

impl CommandClient {
    pub fn new(invoke: InvocationClient, jwt_secret: &str) -> Self {
        Self {
            invoke,
            jwt_secret: jwt_secret.to_owned(),
        }
    }

    fn owner_token(&self, user_id: &str) -> anyhow::Result<String> {
        token::issue(user_id, &self.jwt_secret, OWNER_TOKEN_TTL_SECONDS)
    }

    pub async fn get_rule(&self, user_id: &str, rule_id: &str) -> Result<RuleDto, CallError> {
        let token = self.owner_token(user_id)?;
        let path = format!("/api/recurrence-rules/{rule_id}");
        Ok(self.invoke.get_json(&path, &token).await?)
    }

    pub async fn get_task(&self, user_id: &str, task_id: &str) -> Result<TaskDto, CallError> {
        let token = self.owner_token(user_id)?;
        let path = format!("/api/tasks/{task_id}");
        Ok(self.invoke.get_json(&path, &token).await?)
    }

    pub async fn create_task(
        &self,
        user_id: &str,
        body: &CreateTaskBody,
    ) -> Result<TaskDto, CallError> {
        let token = self.owner_token(user_id)?;
        Ok(self.invoke.post_json("/api/tasks", &token, body).await?)
    }

    pub async fn patch_rule(
        &self,
        user_id: &str,
        rule_id: &str,
        body: &RulePatchBody,
    ) -> Result<RuleDto, CallError> {
        let token = self.owner_token(user_id)?;
        let path = format!("/api/recurrence-rules/{rule_id}");
        Ok(self.invoke.patch_json(&path, &token, body).await?)
    }
}

/// Invocation failure, split so the handler can decide between RETRY and
/// mark-processed-and-drop.
#[derive(Debug, thiserror::Error)]
pub enum CallError {
    #[error(transparent)]
    Sidecar(#[from] SidecarError),

    #[error("token error: {0}")]
    Token(#[from] anyhow::Error),
}

impl CallError {
    pub fn is_transient(&self) -> bool {
        match self {
            CallError::Sidecar(err) => err.is_transient(),
            CallError::Token(_) => false,
        }
    }
}
