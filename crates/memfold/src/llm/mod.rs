//! Chat-completion access for extraction and consolidation
//!
//! Both pipeline stages talk to the model through the `CompletionProvider`
//! trait; `ModelClient` is the HTTP implementation.

pub mod client;
pub mod provider;

pub use client::ModelClient;
pub use provider::CompletionProvider;
