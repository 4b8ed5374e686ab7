//! User identity and per-user settings

use serde::Deserialize;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum UserIdError {
    #[error("user id is blank")]
    Blank,

    /// `.` and `..` would be resolved as relative segments in store URLs
    #[error("user id '{0}' is a dot segment")]
    DotSegment(String),

    #[error("user id contains a control character")]
    ControlChar,
}

/// Identifier scoping every memory store operation.
///
/// Store adapters escape the id when it becomes a URL path segment, so any
/// printable text is accepted apart from the dot segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Result<Self, UserIdError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(UserIdError::Blank);
        }
        if id == "." || id == ".." {
            return Err(UserIdError::DotSegment(id));
        }
        if id.chars().any(char::is_control) {
            return Err(UserIdError::ControlChar);
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for UserId {
    type Error = UserIdError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl FromStr for UserId {
    type Err = UserIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Settings the host loads for each user before a turn is processed
#[derive(Debug, Clone, Deserialize)]
pub struct UserSettings {
    /// Emit status events while memories are processed
    #[serde(default = "default_show_status")]
    pub show_status: bool,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            show_status: default_show_status(),
        }
    }
}

fn default_show_status() -> bool {
    true
}

/// The user a turn belongs to, with their settings
#[derive(Debug, Clone)]
pub struct UserContext {
    pub id: UserId,
    pub settings: UserSettings,
}

impl UserContext {
    pub fn new(id: UserId) -> Self {
        Self {
            id,
            settings: UserSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: UserSettings) -> Self {
        self.settings = settings;
        self
    }
}
