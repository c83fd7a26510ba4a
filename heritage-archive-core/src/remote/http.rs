//! HTTP client for the remote document store.

use std::time::Duration;

use futures::future::BoxFuture;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;

use super::{RemoteError, RemoteStore};
use crate::models::ArchiveState;
use crate::room::RoomId;

/// Request timeout used when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Body returned by a successful create.
#[derive(Debug, Deserialize)]
struct CreateResponse {
    id: serde_json::Value,
}

/// Remote store client speaking plain HTTP + JSON.
#[derive(Debug, Clone)]
pub struct HttpRemote {
    base_url: String,
    client: reqwest::Client,
}

impl HttpRemote {
    pub fn new(base_url: impl Into<String>) -> Result<Self, RemoteError> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteError::RemoteUnavailable(e.to_string()))?;

        Ok(Self {
            base_url: base_url.into(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// URL rooms are created under.
    fn collection_url(&self) -> String {
        let base_url = if !self.base_url.starts_with("http://")
            && !self.base_url.starts_with("https://")
        {
            format!("http://{}", self.base_url)
        } else {
            self.base_url.clone()
        };

        base_url.trim_end_matches('/').to_string()
    }

    fn document_url(&self, room: &RoomId) -> String {
        format!(
            "{}/{}",
            self.collection_url(),
            urlencoding::encode(room.as_str())
        )
    }

    async fn create_room(&self, state: &ArchiveState) -> Result<RoomId, RemoteError> {
        let body = state
            .canonical_json()
            .map_err(|e| RemoteError::RemoteUnavailable(e.to_string()))?;

        let response = self
            .client
            .post(self.collection_url())
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| RemoteError::RemoteUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(RemoteError::RemoteUnavailable(format!(
                "Server returned status {}",
                response.status()
            )));
        }

        let created: CreateResponse = response
            .json()
            .await
            .map_err(|e| RemoteError::RemoteUnavailable(e.to_string()))?;

        let id = match created.id {
            serde_json::Value::String(id) => id,
            serde_json::Value::Number(n) => n.to_string(),
            other => {
                return Err(RemoteError::RemoteUnavailable(format!(
                    "Unexpected room id in response: {}",
                    other
                )))
            }
        };

        RoomId::new(id).map_err(|e| RemoteError::RemoteUnavailable(e.to_string()))
    }

    async fn fetch_room(&self, room: &RoomId) -> Result<ArchiveState, RemoteError> {
        let response = self
            .client
            .get(self.document_url(room))
            .send()
            .await
            .map_err(|e| RemoteError::RemoteUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(RemoteError::RoomNotFound(room.clone()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| RemoteError::RemoteUnavailable(e.to_string()))?;

        ArchiveState::from_json(&body).map_err(|e| {
            RemoteError::RemoteUnavailable(format!("Unreadable document for room {}: {}", room, e))
        })
    }

    async fn replace_room(&self, room: &RoomId, state: &ArchiveState) -> Result<(), RemoteError> {
        let body = state
            .canonical_json()
            .map_err(|e| RemoteError::RemoteUnavailable(e.to_string()))?;

        let response = self
            .client
            .put(self.document_url(room))
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| RemoteError::RemoteUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(RemoteError::PushRejected {
                room: room.clone(),
                reason: format!("Server returned status {}", response.status()),
            });
        }

        Ok(())
    }
}

impl RemoteStore for HttpRemote {
    fn create<'a>(&'a self, state: &'a ArchiveState) -> BoxFuture<'a, Result<RoomId, RemoteError>> {
        Box::pin(self.create_room(state))
    }

    fn fetch<'a>(&'a self, room: &'a RoomId) -> BoxFuture<'a, Result<ArchiveState, RemoteError>> {
        Box::pin(self.fetch_room(room))
    }

    fn replace<'a>(
        &'a self,
        room: &'a RoomId,
        state: &'a ArchiveState,
    ) -> BoxFuture<'a, Result<(), RemoteError>> {
        Box::pin(self.replace_room(room, state))
    }
}
