//! Memory store contract
//!
//! The vector store itself lives outside this crate. `MemoryStore` is the
//! surface the pipeline consumes; `RemoteStore` speaks to a memory service
//! over HTTP and `testing::InMemoryStore` runs in-process.

pub mod query;
pub mod remote;

use async_trait::async_trait;

use crate::error::Result;
use crate::memory::types::{MemoryId, RelatedMemory, StoredMemory};
use crate::user::UserId;

pub use query::QueryResult;
pub use remote::RemoteStore;

#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Store a fact for `user`. Failures are `Store` errors.
    async fn add(&self, user: &UserId, text: &str) -> Result<StoredMemory>;

    /// Up to `k` stored facts nearest to `text`. No match is an empty list;
    /// failures are `Retrieval` errors.
    async fn query(&self, user: &UserId, text: &str, k: usize) -> Result<Vec<RelatedMemory>>;

    /// Remove a stored fact. Failures are `Store` errors.
    async fn delete(&self, user: &UserId, id: &MemoryId) -> Result<()>;

    /// Store name for logging
    fn name(&self) -> &'static str;
}
