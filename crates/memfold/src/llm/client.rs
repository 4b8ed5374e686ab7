//! HTTP client for OpenAI-compatible chat-completion endpoints
//!
//! The underlying `reqwest::Client` is built on the first request and shared
//! by every call until `close()` releases it. A closed client refuses further
//! requests with a transport error.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::Mutex as TokioMutex;
use tracing::{debug, info, warn};

use crate::config::ModelConfig;
use crate::error::{MemfoldError, Result};
use crate::llm::CompletionProvider;

const COMPLETIONS_PATH: &str = "/v1/chat/completions";

/// Lifecycle of the shared HTTP session
#[derive(Debug)]
enum Session {
    Unopened,
    Open(Client),
    Closed,
}

/// Chat-completion client holding one long-lived HTTP session
#[derive(Debug)]
pub struct ModelClient {
    session: TokioMutex<Session>,
    url: String,
    model: String,
    api_key: String,
    timeout: Option<Duration>,
    max_retries: u32,
}

/// OpenAI-compatible chat completion request
#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: [Message<'a>; 2],
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

/// OpenAI-compatible chat completion response
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

impl ModelClient {
    /// Create a client from configuration. No connection is made until the
    /// first call to `complete`.
    pub fn new(config: &ModelConfig) -> Self {
        let url = format!(
            "{}{}",
            config.endpoint_url.trim_end_matches('/'),
            COMPLETIONS_PATH
        );

        info!("ModelClient configured with model: {}, url: {}", config.model, url);

        Self {
            session: TokioMutex::new(Session::Unopened),
            url,
            model: config.model.clone(),
            api_key: config.resolve_api_key(),
            timeout: config.timeout_secs.map(Duration::from_secs),
            max_retries: config.max_retries,
        }
    }

    /// Return the shared HTTP client, building it on first use
    async fn client(&self) -> Result<Client> {
        let mut session = self.session.lock().await;
        match &*session {
            Session::Open(client) => Ok(client.clone()),
            Session::Closed => Err(MemfoldError::transport("model client is closed")),
            Session::Unopened => {
                let mut builder = Client::builder();
                if let Some(timeout) = self.timeout {
                    builder = builder.timeout(timeout);
                }
                let client = builder.build()?;
                debug!("Opened model client session");
                *session = Session::Open(client.clone());
                Ok(client)
            }
        }
    }

    /// Release the HTTP session. Returns false if it was already closed.
    pub async fn shutdown(&self) -> bool {
        let mut session = self.session.lock().await;
        match std::mem::replace(&mut *session, Session::Closed) {
            Session::Closed => {
                warn!("Model client closed more than once");
                false
            }
            Session::Open(_) => {
                debug!("Closed model client session");
                true
            }
            Session::Unopened => true,
        }
    }

    /// Whether `close` has been called
    pub async fn is_closed(&self) -> bool {
        matches!(*self.session.lock().await, Session::Closed)
    }

    async fn send(&self, client: &Client, request: &ChatCompletionRequest<'_>) -> Result<String> {
        let mut delay = Duration::from_secs(1);
        let mut attempt = 0;

        loop {
            let response = match client
                .post(&self.url)
                .bearer_auth(&self.api_key)
                .json(request)
                .send()
                .await
            {
                Ok(response) => response,
                Err(e) if attempt < self.max_retries => {
                    attempt += 1;
                    warn!(
                        "Request failed on attempt {}/{}, retrying in {:?}: {}",
                        attempt,
                        self.max_retries + 1,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS && attempt < self.max_retries {
                attempt += 1;
                warn!(
                    "Rate limited on attempt {}/{}, waiting {:?}",
                    attempt,
                    self.max_retries + 1,
                    delay
                );
                tokio::time::sleep(delay).await;
                delay *= 2;
                continue;
            }

            if !status.is_success() {
                let error_text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                return Err(MemfoldError::transport(format!(
                    "model endpoint returned {status}: {error_text}"
                )));
            }

            return response.text().await.map_err(MemfoldError::from);
        }
    }
}

/// Pull `choices[0].message.content` out of a completion response body
fn completion_content(body: &str) -> Result<String> {
    let completion: ChatCompletionResponse = serde_json::from_str(body)
        .map_err(|e| MemfoldError::Upstream(format!("unreadable completion response: {e}")))?;

    completion
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message)
        .and_then(|m| m.content)
        .ok_or_else(|| {
            MemfoldError::Upstream("response has no choices[0].message.content".to_string())
        })
}

#[async_trait]
impl CompletionProvider for ModelClient {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        let client = self.client().await?;
        let request = ChatCompletionRequest {
            model: &self.model,
            messages: [
                Message {
                    role: "system",
                    content: system_prompt,
                },
                Message {
                    role: "user",
                    content: user_prompt,
                },
            ],
        };

        debug!("Calling model endpoint at: {}", self.url);
        let body = self.send(&client, &request).await?;
        let content = completion_content(&body)?;
        debug!("Model response: {}", content);
        Ok(content)
    }

    async fn close(&self) {
        self.shutdown().await;
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
