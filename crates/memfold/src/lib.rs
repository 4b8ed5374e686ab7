//! memfold - long-term user memory for chat pipelines
//!
//! After each chat turn, memfold extracts durable facts about the user with a
//! language model, merges them with the closest facts already stored, and
//! writes the consolidated set back to an external memory store.

pub mod config;
pub mod error;
pub mod events;
pub mod llm;
pub mod logging;
pub mod memory;
pub mod pipeline;
pub mod storage;
pub mod testing;
pub mod user;

pub use error::{MemfoldError, Result};
pub use events::{ChannelSink, NoopSink, StatusEvent, StatusSink};
pub use pipeline::{ChatMessage, MemoryPipeline, TurnReport};
pub use user::{UserContext, UserId, UserSettings};
