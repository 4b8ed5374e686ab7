//! Related-memory retrieval
//!
//! Looks up the stored facts nearest to a candidate fact. An empty or
//! missing store result is an empty related set, never an error.

use std::sync::Arc;
use tracing::debug;

use crate::error::{MemfoldError, Result};
use crate::memory::types::RelatedMemory;
use crate::storage::MemoryStore;
use crate::user::UserId;

pub struct RelatedMemoryRetriever {
    store: Arc<dyn MemoryStore>,
    k: usize,
}

impl RelatedMemoryRetriever {
    /// `k` is clamped to at least 1
    pub fn new(store: Arc<dyn MemoryStore>, k: usize) -> Self {
        Self { store, k: k.max(1) }
    }

    /// Number of neighbours requested per query
    pub fn k(&self) -> usize {
        self.k
    }

    /// Find up to `k` stored facts nearest to `fact_text`, nearest first.
    ///
    /// Any store failure is reported as `Retrieval`.
    pub async fn find_related(&self, user: &UserId, fact_text: &str) -> Result<Vec<RelatedMemory>> {
        let mut related = self
            .store
            .query(user, fact_text, self.k)
            .await
            .map_err(|e| match e {
                MemfoldError::Retrieval(msg) => MemfoldError::Retrieval(msg),
                other => MemfoldError::Retrieval(other.to_string()),
            })?;

        related.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        related.truncate(self.k);

        debug!(
            user = %user,
            found = related.len(),
            "Retrieved related memories for '{}'",
            fact_text
        );
        Ok(related)
    }
}
