//! Fact extraction from a user message

use std::sync::Arc;
use tracing::{debug, info};

use crate::error::Result;
use crate::llm::CompletionProvider;
use crate::memory::parse::parse_fact_list;
use crate::memory::prompts::EXTRACTION_PROMPT;
use crate::memory::types::CandidateBatch;

/// Turns conversation text into candidate facts with one model call
pub struct FactExtractor {
    provider: Arc<dyn CompletionProvider>,
}

impl FactExtractor {
    pub fn new(provider: Arc<dyn CompletionProvider>) -> Self {
        Self { provider }
    }

    /// Extract candidate facts from `text`.
    ///
    /// Fails with `Parse` when the reply is not a fact list; callers treat
    /// that as an empty batch.
    pub async fn extract(&self, text: &str) -> Result<CandidateBatch> {
        let reply = self.provider.complete(EXTRACTION_PROMPT, text).await?;
        debug!("Extraction response: {}", reply);

        let facts = parse_fact_list(&reply)?;
        info!("Extracted {} candidate facts", facts.len());
        Ok(facts)
    }
}
