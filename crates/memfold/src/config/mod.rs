use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{MemfoldError, Result};

/// Main configuration structure for memfold
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Chat-completion endpoint used for extraction and consolidation
    #[serde(default)]
    pub model: ModelConfig,
    /// Consolidation behaviour
    #[serde(default)]
    pub memory: MemoryConfig,
    /// Remote memory store
    #[serde(default)]
    pub store: StoreConfig,
}

/// Chat-completion endpoint configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    /// Base URL; requests go to `{endpoint_url}/v1/chat/completions`
    #[serde(default = "default_endpoint_url")]
    pub endpoint_url: String,
    /// Model identifier sent with every request
    #[serde(default = "default_model")]
    pub model: String,
    /// Bearer credential. When empty, read from `api_key_env`
    #[serde(default)]
    pub api_key: String,
    /// Environment variable holding the API key
    #[serde(default = "default_model_api_key_env")]
    pub api_key_env: String,
    /// Request timeout in seconds (transport default when unset)
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Retries on rate limiting and connection failures (0 = none)
    #[serde(default)]
    pub max_retries: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            endpoint_url: default_endpoint_url(),
            model: default_model(),
            api_key: String::new(),
            api_key_env: default_model_api_key_env(),
            timeout_secs: None,
            max_retries: 0,
        }
    }
}

impl ModelConfig {
    /// Resolve the API key, preferring the inline value over the environment.
    ///
    /// Returns an empty string when neither is set; some local endpoints
    /// accept unauthenticated requests.
    pub fn resolve_api_key(&self) -> String {
        if !self.api_key.is_empty() {
            return self.api_key.clone();
        }
        env::var(&self.api_key_env).unwrap_or_default()
    }
}

fn default_endpoint_url() -> String {
    "https://api.openai.com".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_model_api_key_env() -> String {
    "MEMFOLD_API_KEY".to_string()
}

/// Consolidation configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MemoryConfig {
    /// How many related memories to retrieve per candidate fact
    #[serde(default = "default_related_memories_n")]
    pub related_memories_n: usize,
    /// Distance below which a related memory is merged (smaller = stricter)
    #[serde(default = "default_related_memories_dist")]
    pub related_memories_dist: f32,
    /// Store the assistant's final message verbatim after every turn
    #[serde(default)]
    pub auto_save_assistant: bool,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            related_memories_n: default_related_memories_n(),
            related_memories_dist: default_related_memories_dist(),
            auto_save_assistant: false,
        }
    }
}

fn default_related_memories_n() -> usize {
    5
}

fn default_related_memories_dist() -> f32 {
    0.75
}

/// Remote memory store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Base URL of the memory service
    #[serde(default = "default_store_base_url")]
    pub base_url: String,
    /// Environment variable holding the store's bearer token
    #[serde(default = "default_store_api_key_env")]
    pub api_key_env: String,
    /// Request timeout in seconds
    #[serde(default = "default_store_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_url: default_store_base_url(),
            api_key_env: default_store_api_key_env(),
            timeout_secs: default_store_timeout_secs(),
        }
    }
}

fn default_store_base_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

fn default_store_api_key_env() -> String {
    "MEMFOLD_STORE_TOKEN".to_string()
}

fn default_store_timeout_secs() -> u64 {
    30
}

impl Config {
    /// Load configuration from an explicit path, or search the default
    /// locations and fall back to defaults when no file exists.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_paths = [
                    dirs::home_dir().map(|h| h.join(".memfold").join("config.toml")),
                    dirs::config_dir().map(|c| c.join("memfold").join("config.toml")),
                    Some(PathBuf::from("config.toml")),
                ];

                match default_paths.iter().flatten().find(|p| p.exists()) {
                    Some(found) => Self::from_file(found)?,
                    None => {
                        tracing::info!("No config file found, using defaults");
                        Config::default()
                    }
                }
            }
        };

        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        tracing::info!("Loading config from: {}", path.display());
        let content = std::fs::read_to_string(path).map_err(|e| {
            MemfoldError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        toml::from_str(&content)
            .map_err(|e| MemfoldError::Config(format!("Failed to parse config: {e}")))
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.memory.related_memories_n == 0 {
            return Err(MemfoldError::Config(
                "related_memories_n must be at least 1".to_string(),
            ));
        }

        let dist = self.memory.related_memories_dist;
        if !dist.is_finite() || dist < 0.0 {
            return Err(MemfoldError::Config(format!(
                "related_memories_dist must be a non-negative number, got {dist}"
            )));
        }

        url::Url::parse(&self.model.endpoint_url).map_err(|e| {
            MemfoldError::Config(format!(
                "Invalid endpoint_url '{}': {e}",
                self.model.endpoint_url
            ))
        })?;

        url::Url::parse(&self.store.base_url).map_err(|e| {
            MemfoldError::Config(format!("Invalid store base_url '{}': {e}", self.store.base_url))
        })?;

        Ok(())
    }
}
