//! Engine configuration
//!
//! Loaded from TOML; every section and field falls back to its default when
//! absent.

use crate::error::{Result, SyncError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How a new text session seeds the trees of its segments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeedMode {
    /// Convert the stored flat text
    PlainText,
    /// Replay the stored node list, falling back to flat text when none exists
    PersistedNodes,
}

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub text: TextConfig,

    #[serde(default)]
    pub diagram: DiagramConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Text collaboration settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextConfig {
    #[serde(default = "default_seed")]
    pub seed: SeedMode,

    /// Larger operation batches are rejected outright
    #[serde(default = "default_max_batch_operations")]
    pub max_batch_operations: usize,

    /// Forward every effective node change to the persistence sink
    #[serde(default = "default_persist_nodes")]
    pub persist_nodes: bool,
}

/// Diagram collaboration settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiagramConfig {
    /// stateId given to a register seeded from storage
    #[serde(default)]
    pub seed_state_id: String,

    /// Timestamp given to a register seeded from storage
    #[serde(default)]
    pub seed_timestamp: u64,
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    #[serde(default = "default_filter")]
    pub filter: String,
}

impl Default for TextConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            max_batch_operations: default_max_batch_operations(),
            persist_nodes: default_persist_nodes(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}

// Default value functions for serde
fn default_seed() -> SeedMode { SeedMode::PlainText }
fn default_max_batch_operations() -> usize { 10_000 }
fn default_persist_nodes() -> bool { true }
fn default_filter() -> String { "info".to_string() }

impl EngineConfig {
    /// Parse configuration from a TOML string
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(source)?;
        if config.text.max_batch_operations == 0 {
            return Err(SyncError::Config(
                "text.max_batch_operations must be at least 1".to_string(),
            ));
        }
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Load configuration from file or use defaults
    pub fn load_or_default(path: Option<&Path>) -> Self {
        match path {
            Some(path) => match Self::load(path) {
                Ok(config) => {
                    tracing::info!("Loaded configuration from: {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to load config from {}: {}. Using defaults.",
                        path.display(),
                        e
                    );
                    Self::default()
                }
            },
            None => {
                tracing::info!("No config file specified, using defaults");
                Self::default()
            }
        }
    }
}
