//! Status notifications emitted while a turn's memories are processed
//!
//! Events serialize as `{"type": "status", "data": {"description": ..., "done": true}}`
//! and are handed to a caller-supplied `StatusSink`.

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::error::{MemfoldError, Result};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum StatusEvent {
    Status(StatusData),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusData {
    pub description: String,
    pub done: bool,
}

impl StatusEvent {
    /// A finished status with the given description
    pub fn done(description: impl Into<String>) -> Self {
        StatusEvent::Status(StatusData {
            description: description.into(),
            done: true,
        })
    }

    pub fn description(&self) -> &str {
        match self {
            StatusEvent::Status(data) => &data.description,
        }
    }
}

/// Receiver of status events
#[async_trait]
pub trait StatusSink: Send + Sync {
    async fn emit(&self, event: StatusEvent) -> Result<()>;
}

/// Sink that drops every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

#[async_trait]
impl StatusSink for NoopSink {
    async fn emit(&self, _event: StatusEvent) -> Result<()> {
        Ok(())
    }
}

/// Sink forwarding events into a tokio channel
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<StatusEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<StatusEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl StatusSink for ChannelSink {
    async fn emit(&self, event: StatusEvent) -> Result<()> {
        self.tx
            .send(event)
            .map_err(|_| MemfoldError::Notify("status receiver dropped".to_string()))
    }
}
