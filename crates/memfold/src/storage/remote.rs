//! HTTP adapter for a remote memory service
//!
//! Routes, all scoped to one user:
//! - `POST   {base}/users/{user}/memories`        `{"content"}` -> stored memory
//! - `POST   {base}/users/{user}/memories/query`  `{"content", "k"}` -> `QueryResult` or `null`
//! - `DELETE {base}/users/{user}/memories/{id}`

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use crate::config::StoreConfig;
use crate::error::{MemfoldError, Result};
use crate::memory::types::{Fact, MemoryId, RelatedMemory, StoredMemory};
use crate::storage::{MemoryStore, QueryResult};
use crate::user::UserId;

#[derive(Debug)]
pub struct RemoteStore {
    client: Client,
    base_url: Url,
    token: Option<String>,
}

#[derive(Debug, Serialize)]
struct AddRequest<'a> {
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct QueryRequest<'a> {
    content: &'a str,
    k: usize,
}

#[derive(Debug, Deserialize)]
struct AddResponse {
    id: String,
    content: String,
    /// Unix timestamp in seconds
    #[serde(default)]
    created_at: Option<i64>,
}

impl RemoteStore {
    /// Create a store client. The bearer token is read from the environment
    /// variable named in `config.api_key_env`; requests are unauthenticated
    /// when it is unset.
    pub fn new(config: &StoreConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            MemfoldError::Config(format!("Invalid store base_url '{}': {e}", config.base_url))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(MemfoldError::Config(format!(
                "Store base_url '{}' cannot hold a path",
                config.base_url
            )));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| MemfoldError::Config(format!("Failed to create store client: {e}")))?;

        let token = env::var(&config.api_key_env).ok().filter(|t| !t.is_empty());

        info!("RemoteStore initialized with base_url: {}", base_url);

        Ok(Self {
            client,
            base_url,
            token,
        })
    }

    fn endpoint(&self, user: &UserId, tail: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .push("users")
                .push(user.as_str())
                .push("memories")
                .extend(tail);
        }
        url
    }

    fn request(&self, method: reqwest::Method, url: Url) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

async fn error_body(response: reqwest::Response) -> String {
    let status = response.status();
    let text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    format!("memory service returned {status}: {text}")
}

#[async_trait]
impl MemoryStore for RemoteStore {
    async fn add(&self, user: &UserId, text: &str) -> Result<StoredMemory> {
        let url = self.endpoint(user, &[]);
        let response = self
            .request(reqwest::Method::POST, url)
            .json(&AddRequest { content: text })
            .send()
            .await
            .map_err(|e| MemfoldError::Store(format!("add failed: {e}")))?;

        if !response.status().is_success() {
            return Err(MemfoldError::Store(error_body(response).await));
        }

        let added: AddResponse = response
            .json()
            .await
            .map_err(|e| MemfoldError::Store(format!("unreadable add response: {e}")))?;

        let created_at = added
            .created_at
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .unwrap_or_else(Utc::now);

        debug!(user = %user, id = %added.id, "Stored memory");
        Ok(StoredMemory {
            id: MemoryId::new(added.id),
            fact: Fact::new(added.content, created_at),
        })
    }

    async fn query(&self, user: &UserId, text: &str, k: usize) -> Result<Vec<RelatedMemory>> {
        let url = self.endpoint(user, &["query"]);
        let response = self
            .request(reqwest::Method::POST, url)
            .json(&QueryRequest { content: text, k })
            .send()
            .await
            .map_err(|e| MemfoldError::Retrieval(format!("query failed: {e}")))?;

        if !response.status().is_success() {
            return Err(MemfoldError::Retrieval(error_body(response).await));
        }

        let result: Option<QueryResult> = response
            .json()
            .await
            .map_err(|e| MemfoldError::Retrieval(format!("unreadable query response: {e}")))?;

        match result {
            Some(result) => result.into_related(),
            None => {
                debug!(user = %user, "Memory service returned no match");
                Ok(Vec::new())
            }
        }
    }

    async fn delete(&self, user: &UserId, id: &MemoryId) -> Result<()> {
        let url = self.endpoint(user, &[id.as_str()]);
        let response = self
            .request(reqwest::Method::DELETE, url)
            .send()
            .await
            .map_err(|e| MemfoldError::Store(format!("delete failed: {e}")))?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::NOT_FOUND => {
                debug!(user = %user, id = %id, "Memory already gone");
                Ok(())
            }
            _ => Err(MemfoldError::Store(error_body(response).await)),
        }
    }

    fn name(&self) -> &'static str {
        "remote"
    }
}
