//! Memory consolidation
//!
//! Merges a candidate fact with the stored facts close enough to it:
//! 1. Keep related memories with `distance < threshold`
//! 2. Send them plus the candidate to the model with the consolidation prompt
//! 3. The model's list becomes the facts to add
//! 4. Every kept related memory is superseded and scheduled for deletion
//!
//! A failed model call or unreadable reply yields an error and no result,
//! so nothing is added or deleted for that candidate.

use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{MemfoldError, Result};
use crate::llm::CompletionProvider;
use crate::memory::parse::parse_fact_list;
use crate::memory::prompts::CONSOLIDATION_PROMPT;
use crate::memory::types::{ConsolidationInput, ConsolidationResult, Fact, RelatedMemory};

/// Split related memories into those strictly below `threshold` and the rest.
/// Only the first set takes part in consolidation.
pub fn filter_related(related: &[RelatedMemory], threshold: f32) -> Vec<&RelatedMemory> {
    related.iter().filter(|r| r.distance < threshold).collect()
}

pub struct Consolidator {
    provider: Arc<dyn CompletionProvider>,
    threshold: f32,
}

impl Consolidator {
    pub fn new(provider: Arc<dyn CompletionProvider>, threshold: f32) -> Self {
        Self {
            provider,
            threshold,
        }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Consolidate `new_fact` against `related`.
    ///
    /// With nothing under the threshold the candidate is returned as-is and
    /// the model is not called.
    pub async fn consolidate(
        &self,
        new_fact: &Fact,
        related: &[RelatedMemory],
    ) -> Result<ConsolidationResult> {
        let kept = filter_related(related, self.threshold);
        if kept.is_empty() {
            debug!("No related memories under {}, storing as-is", self.threshold);
            return Ok(ConsolidationResult::unrelated(new_fact));
        }

        let input = ConsolidationInput {
            new_fact: new_fact.clone(),
            related: kept.iter().map(|r| r.to_fact()).collect(),
        };
        let payload = serde_json::to_string_pretty(&input.entries())
            .map_err(|e| MemfoldError::Serialization(e.to_string()))?;

        let reply = self.provider.complete(CONSOLIDATION_PROMPT, &payload).await?;
        debug!("Consolidation response: {}", reply);

        let add = parse_fact_list(&reply)?;
        let delete = kept.into_iter().map(|r| r.id.clone()).collect::<Vec<_>>();

        info!(
            "Consolidated {} related memories and 1 new fact into {} facts",
            delete.len(),
            add.len()
        );
        Ok(ConsolidationResult { add, delete })
    }
}
