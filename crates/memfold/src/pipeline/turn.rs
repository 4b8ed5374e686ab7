//! Conversation turns and per-turn processing records

use serde::{Deserialize, Serialize};

use crate::memory::types::{MemoryId, StoredMemory};

/// Role of a conversation participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

/// One message of the chat as seen by the host after the response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Where a turn is in its processing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    Extracting,
    /// Consolidating the candidate at this index
    PerFactConsolidating(usize),
    Done,
    PartialFailure,
}

/// Stage at which a candidate or the assistant save failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Extraction,
    Retrieval,
    Consolidation,
    Persistence,
    AssistantSave,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Extraction => "extraction",
            Stage::Retrieval => "retrieval",
            Stage::Consolidation => "consolidation",
            Stage::Persistence => "persistence",
            Stage::AssistantSave => "assistant save",
        }
    }
}

/// What happened to one unit of work within a turn
#[derive(Debug, Clone, PartialEq)]
pub enum FactOutcome {
    /// A candidate was consolidated and persisted
    Consolidated {
        candidate: String,
        added: Vec<StoredMemory>,
        deleted: Vec<MemoryId>,
    },
    /// The assistant's message was stored verbatim
    AssistantSaved { memory: StoredMemory },
    /// The work failed and was skipped
    Failed {
        /// The candidate fact; `None` for extraction failures
        candidate: Option<String>,
        stage: Stage,
        error: String,
    },
}

impl FactOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, FactOutcome::Failed { .. })
    }
}

/// Result of processing one turn
#[derive(Debug, Clone, PartialEq)]
pub struct TurnReport {
    /// Final state, `Done` or `PartialFailure`
    pub state: TurnState,
    /// Every state entered, in order
    pub transitions: Vec<TurnState>,
    /// Candidates produced by extraction
    pub candidates: Vec<String>,
    /// Outcomes in processing order
    pub outcomes: Vec<FactOutcome>,
}

impl TurnReport {
    pub(crate) fn new() -> Self {
        Self {
            state: TurnState::Idle,
            transitions: vec![TurnState::Idle],
            candidates: Vec::new(),
            outcomes: Vec::new(),
        }
    }

    pub(crate) fn enter(&mut self, state: TurnState) {
        tracing::debug!("Turn state {:?} -> {:?}", self.state, state);
        self.state = state;
        self.transitions.push(state);
    }

    /// Finish the turn, picking the final state from the outcomes
    pub(crate) fn finish(mut self) -> Self {
        let final_state = if self.failures() > 0 {
            TurnState::PartialFailure
        } else {
            TurnState::Done
        };
        self.enter(final_state);
        self
    }

    pub fn failures(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_failure()).count()
    }

    /// All memories added during the turn
    pub fn added(&self) -> Vec<&StoredMemory> {
        self.outcomes
            .iter()
            .flat_map(|o| match o {
                FactOutcome::Consolidated { added, .. } => added.iter().collect::<Vec<_>>(),
                FactOutcome::AssistantSaved { memory } => vec![memory],
                FactOutcome::Failed { .. } => Vec::new(),
            })
            .collect()
    }

    /// All memory ids deleted during the turn
    pub fn deleted(&self) -> Vec<&MemoryId> {
        self.outcomes
            .iter()
            .flat_map(|o| match o {
                FactOutcome::Consolidated { deleted, .. } => deleted.iter().collect::<Vec<_>>(),
                _ => Vec::new(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_message_deserialization() {
        let messages: Vec<ChatMessage> = serde_json::from_str(
            r#"[{"role": "user", "content": "hi"}, {"role": "assistant", "content": "hello"}]"#,
        )
        .unwrap();

        assert_eq!(messages[0], ChatMessage::user("hi"));
        assert_eq!(messages[1].role, Role::Assistant);
        assert_eq!(messages[1].role.as_str(), "assistant");
    }

    #[test]
    fn test_report_final_state() {
        let report = TurnReport::new().finish();
        assert_eq!(report.state, TurnState::Done);
        assert_eq!(report.transitions, vec![TurnState::Idle, TurnState::Done]);

        let mut report = TurnReport::new();
        report.outcomes.push(FactOutcome::Failed {
            candidate: None,
            stage: Stage::Extraction,
            error: "boom".to_string(),
        });
        let report = report.finish();
        assert_eq!(report.state, TurnState::PartialFailure);
        assert_eq!(report.failures(), 1);
    }
}
