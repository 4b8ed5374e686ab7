//! Completion provider trait
//!
//! Abstracts the chat-completion backend so the extractor and consolidator
//! can run against the HTTP client or a scripted stand-in.

use async_trait::async_trait;

use crate::error::Result;

#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Send a system + user prompt pair and return the raw reply text
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String>;

    /// Release held resources. Called once when the owning pipeline shuts down.
    async fn close(&self) {}

    /// Provider name for logging
    fn name(&self) -> &'static str;
}
