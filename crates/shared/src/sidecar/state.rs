use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::SidecarError;

/// Key-value access through the sidecar state API.
///
/// Holds idempotency keys, gateway presence, and offline reminder queues;
/// writes are per-key, reads tolerate missing entries.
#[derive(Clone)]
pub struct StateClient {
    http: reqwest::Client,
    base_url: String,
    store: String,
}

#[derive(Serialize)]
struct StateEntry<'a, T: Serialize> {
    key: &'a str,
    value: &'a T,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<StateMetadata>,
}

#[derive(Serialize)]
struct StateMetadata {
    #[serde(rename = "ttlInSeconds")]
    ttl_in_seconds: String,
}

impl StateClient {
    pub fn new(http: reqwest::Client, base_url: &str, store: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_owned(),
            store: store.to_owned(),
        }
    }

    /// `None` on a missing key; an empty body also counts as a miss.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, SidecarError> {
        let url = format!("{}/v1.0/state/{}/{}", self.base_url, self.store, key);
        let response = self.http.get(&url).send().await?;

        match response.status() {
            status if status == reqwest::StatusCode::NO_CONTENT => Ok(None),
            status if status == reqwest::StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let body = response.text().await?;
                if body.is_empty() {
                    return Ok(None);
                }
                Ok(Some(serde_json::from_str(&body)?))
            }
            _ => Err(SidecarError::from_response(response).await),
        }
    }

    pub async fn set<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<(), SidecarError> {
        let url = format!("{}/v1.0/state/{}", self.base_url, self.store);
        let entry = StateEntry {
            key,
            value,
            metadata: ttl.map(|ttl| StateMetadata {
                ttl_in_seconds: ttl.as_secs().to_string(),
            }),
        };

        let response = self.http.post(&url).json(&[entry]).send().await?;
        if !response.status().is_success() {
            return Err(SidecarError::from_response(response).await);
        }
        Ok(())
    }

    pub async fn delete(&self, key: &str) -> Result<(), SidecarError> {
        let url = format!("{}/v1.0/state/{}/{}", self.base_url, self.store, key);
        let response = self.http.delete(&url).send().await?;
        // Deleting an absent key is a no-op, same as the store itself.
        if !response.status().is_success() && response.status() != reqwest::StatusCode::NOT_FOUND {
            return Err(SidecarError::from_response(response).await);
        }
        Ok(())
    }
}
