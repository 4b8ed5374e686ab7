//! Fact extraction, related-memory retrieval and consolidation

pub mod consolidator;
pub mod extractor;
pub mod parse;
pub mod prompts;
pub mod retriever;
pub mod types;

pub use consolidator::{Consolidator, filter_related};
pub use extractor::FactExtractor;
pub use parse::{FACT_LIST_FORMAT_VERSION, parse_fact_list};
pub use retriever::RelatedMemoryRetriever;
pub use types::{
    CandidateBatch, ConsolidationInput, ConsolidationResult, Fact, MemoryId, RelatedMemory,
    StoredMemory,
};
