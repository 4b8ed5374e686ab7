//! Memory types for memfold
//!
//! Facts are immutable: consolidation never edits a stored memory, it
//! deletes the superseded ones and adds the merged replacements.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque identifier assigned by the memory store
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemoryId(String);

impl MemoryId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MemoryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A durable statement about a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fact {
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl Fact {
    pub fn new(text: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            text: text.into(),
            created_at,
        }
    }

    /// Create a fact timestamped now
    pub fn now(text: impl Into<String>) -> Self {
        Self::new(text, Utc::now())
    }
}

/// A fact as held by the memory store
#[derive(Debug, Clone, PartialEq)]
pub struct StoredMemory {
    pub id: MemoryId,
    pub fact: Fact,
}

/// One hit of a similarity query
#[derive(Debug, Clone, PartialEq)]
pub struct RelatedMemory {
    pub id: MemoryId,
    pub fact: String,
    pub created_at: DateTime<Utc>,
    /// Non-negative, smaller is more similar, unbounded above
    pub distance: f32,
}

impl RelatedMemory {
    pub fn to_fact(&self) -> Fact {
        Fact::new(self.fact.clone(), self.created_at)
    }
}

/// Raw fact strings extracted from one conversation turn, in extraction order
pub type CandidateBatch = Vec<String>;

/// Everything the model sees when merging one candidate
#[derive(Debug, Clone, PartialEq)]
pub struct ConsolidationInput {
    pub new_fact: Fact,
    pub related: Vec<Fact>,
}

impl ConsolidationInput {
    /// Related facts first, new fact last, as `{fact, created_at}` entries
    pub fn entries(&self) -> Vec<FactEntry<'_>> {
        self.related
            .iter()
            .chain(std::iter::once(&self.new_fact))
            .map(|f| FactEntry {
                fact: &f.text,
                created_at: f.created_at,
            })
            .collect()
    }
}

/// Wire shape of a fact in the consolidation prompt
#[derive(Debug, Serialize)]
pub struct FactEntry<'a> {
    pub fact: &'a str,
    pub created_at: DateTime<Utc>,
}

/// Facts to add and superseded memories to delete for one candidate
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConsolidationResult {
    pub add: Vec<String>,
    pub delete: Vec<MemoryId>,
}

impl ConsolidationResult {
    /// Result for a candidate with nothing related: store it unchanged
    pub fn unrelated(new_fact: &Fact) -> Self {
        Self {
            add: vec![new_fact.text.clone()],
            delete: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_entries_put_new_fact_last() {
        let input = ConsolidationInput {
            new_fact: Fact::new("User likes ripe oranges", Utc.timestamp_opt(2000, 0).unwrap()),
            related: vec![Fact::new("User likes oranges", Utc.timestamp_opt(1000, 0).unwrap())],
        };

        let entries = input.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].fact, "User likes oranges");
        assert_eq!(entries[1].fact, "User likes ripe oranges");
    }

    #[test]
    fn test_fact_entry_serialization() {
        let fact = Fact::new("User lives in Oslo", Utc.timestamp_opt(0, 0).unwrap());
        let input = ConsolidationInput {
            new_fact: fact,
            related: vec![],
        };

        let json = serde_json::to_value(input.entries()).unwrap();
        assert_eq!(
            json,
            serde_json::json!([{"fact": "User lives in Oslo", "created_at": "1970-01-01T00:00:00Z"}])
        );
    }

    #[test]
    fn test_unrelated_result() {
        let result = ConsolidationResult::unrelated(&Fact::now("User has a cat"));
        assert_eq!(result.add, vec!["User has a cat".to_string()]);
        assert!(result.delete.is_empty());
    }

    #[test]
    fn test_memory_id_is_transparent() {
        let id = MemoryId::new("abc-123");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc-123\"");
        assert_eq!(id.to_string(), "abc-123");
    }
}
