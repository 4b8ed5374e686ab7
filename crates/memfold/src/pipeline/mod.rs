//! Per-turn memory pipeline
//!
//! Runs after the chat response has been produced:
//! 1. Extract candidate facts from the user's message (next-to-last message)
//! 2. For each candidate, in order: retrieve related memories, consolidate,
//!    then add the merged facts and delete the superseded ones
//! 3. Optionally store the assistant's reply verbatim
//!
//! Each candidate is fully persisted before the next one is retrieved, so a
//! later candidate always sees the deletions of an earlier one. Failures are
//! logged, reported and skipped; they never abort the rest of the turn.

pub mod turn;

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

use crate::config::{Config, MemoryConfig};
use crate::error::{MemfoldError, Result};
use crate::events::{StatusEvent, StatusSink};
use crate::llm::{CompletionProvider, ModelClient};
use crate::memory::types::{ConsolidationResult, Fact, StoredMemory};
use crate::memory::{Consolidator, FactExtractor, RelatedMemoryRetriever};
use crate::storage::MemoryStore;
use crate::user::{UserContext, UserId};

pub use turn::{ChatMessage, FactOutcome, Role, Stage, TurnReport, TurnState};

/// Timestamp source for new candidate facts
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub struct MemoryPipeline {
    provider: Arc<dyn CompletionProvider>,
    store: Arc<dyn MemoryStore>,
    extractor: FactExtractor,
    retriever: RelatedMemoryRetriever,
    consolidator: Consolidator,
    auto_save_assistant: bool,
    clock: Clock,
    closed: AtomicBool,
}

impl MemoryPipeline {
    /// Assemble a pipeline around an existing provider and store
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        store: Arc<dyn MemoryStore>,
        config: &MemoryConfig,
    ) -> Self {
        Self {
            extractor: FactExtractor::new(provider.clone()),
            retriever: RelatedMemoryRetriever::new(store.clone(), config.related_memories_n),
            consolidator: Consolidator::new(provider.clone(), config.related_memories_dist),
            auto_save_assistant: config.auto_save_assistant,
            provider,
            store,
            clock: Arc::new(Utc::now),
            closed: AtomicBool::new(false),
        }
    }

    /// Replace the wall clock used to timestamp candidate facts
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Build a pipeline that talks to the configured chat-completion endpoint
    pub fn from_config(config: &Config, store: Arc<dyn MemoryStore>) -> Result<Self> {
        config.validate()?;
        let client = Arc::new(ModelClient::new(&config.model));
        info!(
            "Memory pipeline using provider: {}, store: {}",
            client.name(),
            store.name()
        );
        Ok(Self::new(client, store, &config.memory))
    }

    /// Process a completed turn. Never fails; problems are recorded in the
    /// returned report and, when enabled, announced through `sink`.
    pub async fn process_turn(
        &self,
        user: &UserContext,
        messages: &[ChatMessage],
        sink: &dyn StatusSink,
    ) -> TurnReport {
        let mut report = TurnReport::new();

        if messages.len() >= 2 {
            let user_message = &messages[messages.len() - 2];
            report.enter(TurnState::Extracting);
            report.candidates = self
                .extract_candidates(user, &user_message.content, sink, &mut report.outcomes)
                .await;

            for (index, candidate) in report.candidates.clone().into_iter().enumerate() {
                report.enter(TurnState::PerFactConsolidating(index));
                let outcome = self.process_candidate(&user.id, &candidate).await;
                self.notify(user, sink, &outcome).await;
                report.outcomes.push(outcome);
            }
        } else {
            debug!("Fewer than two messages, skipping extraction");
        }

        if self.auto_save_assistant {
            if let Some(reply) = messages.last().filter(|m| m.role == Role::Assistant) {
                let outcome = self.save_assistant(&user.id, &reply.content).await;
                self.notify(user, sink, &outcome).await;
                report.outcomes.push(outcome);
            }
        }

        let report = report.finish();
        info!(
            user = %user.id,
            candidates = report.candidates.len(),
            failures = report.failures(),
            "Finished memory processing for turn"
        );
        report
    }

    async fn extract_candidates(
        &self,
        user: &UserContext,
        text: &str,
        sink: &dyn StatusSink,
        outcomes: &mut Vec<FactOutcome>,
    ) -> Vec<String> {
        if text.trim().is_empty() {
            debug!("User message is empty, nothing to extract");
            return Vec::new();
        }

        match self.extractor.extract(text).await {
            Ok(candidates) => candidates,
            Err(MemfoldError::Parse(e)) => {
                warn!("Extraction reply was not a fact list, treating as empty: {}", e);
                Vec::new()
            }
            Err(e) => {
                warn!("Fact extraction failed: {}", e);
                let outcome = FactOutcome::Failed {
                    candidate: None,
                    stage: Stage::Extraction,
                    error: e.to_string(),
                };
                self.notify(user, sink, &outcome).await;
                outcomes.push(outcome);
                Vec::new()
            }
        }
    }

    /// Retrieve, consolidate and persist a single candidate fact
    pub async fn process_candidate(&self, user: &UserId, candidate: &str) -> FactOutcome {
        let failed = |stage: Stage, error: MemfoldError| {
            warn!(
                user = %user,
                stage = stage.as_str(),
                "Skipping candidate '{}': {}",
                candidate,
                error
            );
            FactOutcome::Failed {
                candidate: Some(candidate.to_string()),
                stage,
                error: error.to_string(),
            }
        };

        let related = match self.retriever.find_related(user, candidate).await {
            Ok(related) => related,
            Err(e) => return failed(Stage::Retrieval, e),
        };

        let new_fact = Fact::new(candidate, (self.clock)());
        let result = match self.consolidator.consolidate(&new_fact, &related).await {
            Ok(result) => result,
            Err(e) => return failed(Stage::Consolidation, e),
        };

        match self.apply(user, &result).await {
            Ok(added) => FactOutcome::Consolidated {
                candidate: candidate.to_string(),
                added,
                deleted: result.delete,
            },
            Err(e) => failed(Stage::Persistence, e),
        }
    }

    /// Persist a consolidation result: add the merged facts, then delete the
    /// superseded memories.
    ///
    /// If an add fails, or the first delete fails, the facts added so far are
    /// removed again and the store is left as it was. Once a superseded
    /// memory is gone the merged facts are its only replacement, so a later
    /// delete failure keeps them and leaves the remaining superseded
    /// memories in place.
    pub async fn apply(
        &self,
        user: &UserId,
        result: &ConsolidationResult,
    ) -> Result<Vec<StoredMemory>> {
        let mut added = Vec::with_capacity(result.add.len());
        for text in &result.add {
            match self.store.add(user, text).await {
                Ok(memory) => added.push(memory),
                Err(e) => {
                    self.roll_back(user, &added).await;
                    return Err(into_store_error(e));
                }
            }
        }

        for (deleted, id) in result.delete.iter().enumerate() {
            if let Err(e) = self.store.delete(user, id).await {
                if deleted == 0 {
                    warn!(user = %user, "Failed to delete superseded memory {}, rolling back", id);
                    self.roll_back(user, &added).await;
                } else {
                    warn!(
                        user = %user,
                        "Failed to delete superseded memory {} after {} deletes; it remains alongside the merged facts",
                        id,
                        deleted
                    );
                }
                return Err(into_store_error(e));
            }
        }

        debug!(
            user = %user,
            added = added.len(),
            deleted = result.delete.len(),
            "Applied consolidation"
        );
        Ok(added)
    }

    async fn roll_back(&self, user: &UserId, added: &[StoredMemory]) {
        for memory in added {
            if let Err(e) = self.store.delete(user, &memory.id).await {
                warn!(user = %user, "Failed to roll back memory {}: {}", memory.id, e);
            }
        }
    }

    async fn save_assistant(&self, user: &UserId, content: &str) -> FactOutcome {
        if content.trim().is_empty() {
            return FactOutcome::Failed {
                candidate: None,
                stage: Stage::AssistantSave,
                error: "assistant message is empty".to_string(),
            };
        }

        match self.store.add(user, content).await {
            Ok(memory) => FactOutcome::AssistantSaved { memory },
            Err(e) => {
                warn!(user = %user, "Failed to save assistant message: {}", e);
                FactOutcome::Failed {
                    candidate: None,
                    stage: Stage::AssistantSave,
                    error: into_store_error(e).to_string(),
                }
            }
        }
    }

    async fn notify(&self, user: &UserContext, sink: &dyn StatusSink, outcome: &FactOutcome) {
        if !user.settings.show_status {
            return;
        }
        if let Err(e) = sink.emit(StatusEvent::done(describe(outcome))).await {
            warn!("Failed to emit status event: {}", e);
        }
    }

    /// Release the model client. Only the first call has an effect.
    pub async fn shutdown(&self) -> bool {
        if self.closed.swap(true, Ordering::SeqCst) {
            warn!("Memory pipeline already shut down");
            return false;
        }
        self.provider.close().await;
        info!("Memory pipeline shut down");
        true
    }
}

fn into_store_error(err: MemfoldError) -> MemfoldError {
    match err {
        MemfoldError::Store(_) => err,
        other => MemfoldError::Store(other.to_string()),
    }
}

/// Status text for an outcome
fn describe(outcome: &FactOutcome) -> String {
    match outcome {
        FactOutcome::Consolidated { added, deleted, .. } => {
            let facts = added
                .iter()
                .map(|m| m.fact.text.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            match (added.is_empty(), deleted.is_empty()) {
                (_, true) => format!("Memory added: {facts}"),
                (true, false) => format!("Memory updated: removed {} outdated", deleted.len()),
                (false, false) => format!("Memory updated: {facts} (replaced {})", deleted.len()),
            }
        }
        FactOutcome::AssistantSaved { .. } => "Assistant response saved to memory".to_string(),
        FactOutcome::Failed {
            candidate, stage, ..
        } => match candidate {
            Some(candidate) => format!("Memory not saved ({} failed): {candidate}", stage.as_str()),
            None => format!("Memory processing failed during {}", stage.as_str()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::types::MemoryId;
    use crate::testing::{InMemoryStore, ScriptedModel};
    use chrono::Utc;

    fn user() -> UserId {
        UserId::try_from("user-1").unwrap()
    }

    fn pipeline(model: Arc<ScriptedModel>, store: Arc<InMemoryStore>) -> MemoryPipeline {
        MemoryPipeline::new(model, store, &MemoryConfig::default())
    }

    #[tokio::test]
    async fn test_apply_adds_then_deletes() {
        let store = Arc::new(InMemoryStore::new());
        store.insert(&user(), "old", Fact::new("User likes oranges", Utc::now()));
        let pipeline = pipeline(Arc::new(ScriptedModel::default()), store.clone());

        let result = ConsolidationResult {
            add: vec!["User likes ripe oranges".to_string()],
            delete: vec![MemoryId::new("old")],
        };
        let added = pipeline.apply(&user(), &result).await.unwrap();

        assert_eq!(added.len(), 1);
        assert_eq!(store.texts(&user()), vec!["User likes ripe oranges"]);
    }

    #[tokio::test]
    async fn test_apply_rolls_back_partial_adds() {
        let store = Arc::new(InMemoryStore::new());
        store.insert(&user(), "old", Fact::new("User works at Acme", Utc::now()));
        store.fail_adds_after(1);
        let pipeline = pipeline(Arc::new(ScriptedModel::default()), store.clone());

        let result = ConsolidationResult {
            add: vec![
                "User works at Acme as an engineer".to_string(),
                "User manages a team".to_string(),
            ],
            delete: vec![MemoryId::new("old")],
        };
        let err = pipeline.apply(&user(), &result).await.unwrap_err();

        assert!(matches!(err, MemfoldError::Store(_)));
        assert_eq!(store.texts(&user()), vec!["User works at Acme"]);
    }

    #[tokio::test]
    async fn test_apply_rolls_back_when_first_delete_fails() {
        let store = Arc::new(InMemoryStore::new());
        store.insert(&user(), "old", Fact::new("User likes oranges", Utc::now()));
        store.fail_deletes_of("old");
        let pipeline = pipeline(Arc::new(ScriptedModel::default()), store.clone());

        let result = ConsolidationResult {
            add: vec!["User dislikes oranges".to_string()],
            delete: vec![MemoryId::new("old")],
        };
        let err = pipeline.apply(&user(), &result).await.unwrap_err();

        assert!(matches!(err, MemfoldError::Store(_)));
        assert_eq!(store.texts(&user()), vec!["User likes oranges"]);
    }

    #[tokio::test]
    async fn test_apply_keeps_merged_facts_after_partial_delete() {
        let store = Arc::new(InMemoryStore::new());
        store.insert(&user(), "tea", Fact::new("User likes tea", Utc::now()));
        store.insert(&user(), "green", Fact::new("User drinks green tea", Utc::now()));
        store.fail_deletes_of("green");
        let pipeline = pipeline(Arc::new(ScriptedModel::default()), store.clone());

        let result = ConsolidationResult {
            add: vec!["User likes green tea".to_string()],
            delete: vec![MemoryId::new("tea"), MemoryId::new("green")],
        };
        assert!(pipeline.apply(&user(), &result).await.is_err());
        assert_eq!(
            store.texts(&user()),
            vec!["User drinks green tea", "User likes green tea"]
        );
    }

    #[tokio::test]
    async fn test_shutdown_closes_provider_once() {
        let model = Arc::new(ScriptedModel::default());
        let pipeline = pipeline(model.clone(), Arc::new(InMemoryStore::new()));

        assert!(pipeline.shutdown().await);
        assert!(!pipeline.shutdown().await);
        assert_eq!(model.close_count(), 1);
    }

    #[test]
    fn test_describe_success_and_failure_differ() {
        let memory = StoredMemory {
            id: MemoryId::new("m"),
            fact: Fact::now("User likes tea"),
        };
        let added = describe(&FactOutcome::Consolidated {
            candidate: "User likes tea".to_string(),
            added: vec![memory.clone()],
            deleted: vec![],
        });
        let updated = describe(&FactOutcome::Consolidated {
            candidate: "User likes tea".to_string(),
            added: vec![memory],
            deleted: vec![MemoryId::new("x")],
        });
        let failed = describe(&FactOutcome::Failed {
            candidate: Some("User likes tea".to_string()),
            stage: Stage::Retrieval,
            error: "down".to_string(),
        });

        assert_eq!(added, "Memory added: User likes tea");
        assert_eq!(updated, "Memory updated: User likes tea (replaced 1)");
        assert_eq!(failed, "Memory not saved (retrieval failed): User likes tea");
    }
}
