//! Error types for memfold

use thiserror::Error;

/// Boxed cause carried by transport failures
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Main error type for memfold operations
#[derive(Error, Debug)]
pub enum MemfoldError {
    /// Network or HTTP-status failure talking to the model endpoint
    #[error("Transport error: {0}")]
    Transport(#[source] BoxError),

    /// Well-formed HTTP response without the expected completion field
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Model output that is not a list in the expected format
    #[error("Parse error: {0}")]
    Parse(String),

    /// Memory store query failure
    #[error("Retrieval error: {0}")]
    Retrieval(String),

    /// Memory store add/delete failure
    #[error("Store error: {0}")]
    Store(String),

    /// Status sink could not deliver an event
    #[error("Notification error: {0}")]
    Notify(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// User identifiers that cannot be used against the store
    #[error("Invalid user id: {0}")]
    InvalidUserId(#[from] crate::user::UserIdError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl MemfoldError {
    /// Build a transport error from any displayable cause
    pub fn transport(cause: impl Into<BoxError>) -> Self {
        MemfoldError::Transport(cause.into())
    }

    /// Short name of the error kind, used in logs and status messages
    pub fn kind(&self) -> &'static str {
        match self {
            MemfoldError::Transport(_) => "transport",
            MemfoldError::Upstream(_) => "upstream",
            MemfoldError::Parse(_) => "parse",
            MemfoldError::Retrieval(_) => "retrieval",
            MemfoldError::Store(_) => "store",
            MemfoldError::Notify(_) => "notify",
            MemfoldError::Config(_) => "config",
            MemfoldError::InvalidUserId(_) => "user",
            MemfoldError::Io(_) => "io",
            MemfoldError::Serialization(_) => "serialization",
        }
    }
}

impl From<reqwest::Error> for MemfoldError {
    fn from(err: reqwest::Error) -> Self {
        MemfoldError::Transport(Box::new(err))
    }
}

/// Result type alias for memfold operations
pub type Result<T> = std::result::Result<T, MemfoldError>;
