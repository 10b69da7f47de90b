//! Configuration for the composer
//!
//! Parses `typeloom.toml` configuration files.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

/// Name of the configuration file looked up by [`ComposerConfig::from_directory`]
pub const CONFIG_FILE_NAME: &str = "typeloom.toml";

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ComposerConfig {
    #[serde(default)]
    pub composer: ComposerOptions,
}

/// Settings under [composer]
#[derive(Debug, Clone, Deserialize)]
pub struct ComposerOptions {
    /// Resolve references on the calling thread instead of a worker pool
    #[serde(default)]
    pub serial: bool,

    /// Worker count for reference resolution (hardware concurrency when unset)
    #[serde(default)]
    pub threads: Option<usize>,

    /// Collapse identical diagnostics in the final model
    #[serde(default = "default_true")]
    pub deduplicate_diagnostics: bool,
}

impl Default for ComposerOptions {
    fn default() -> Self {
        Self {
            serial: false,
            threads: None,
            deduplicate_diagnostics: true,
        }
    }
}

impl ComposerOptions {
    pub fn serial() -> Self {
        Self {
            serial: true,
            ..Self::default()
        }
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    /// Number of resolver workers to start
    pub fn worker_count(&self) -> usize {
        if self.serial {
            return 1;
        }
        self.threads
            .filter(|n| *n > 0)
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1)
            })
    }
}

fn default_true() -> bool {
    true
}

impl ComposerConfig {
    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse configuration from a string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Find and load configuration from a directory (looks for typeloom.toml)
    pub fn from_directory(dir: &Path) -> Result<Self, ConfigError> {
        let config_path = dir.join(CONFIG_FILE_NAME);
        if config_path.exists() {
            Self::from_file(&config_path)
        } else if let Some(parent) = dir.parent() {
            Self::from_directory(parent)
        } else {
            Ok(Self::default())
        }
    }
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}
