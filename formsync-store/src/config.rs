//! Configuration loading for the file store.
//!
//! Configuration is loaded from a TOML file or built in code.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// File store configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StoreConfig {
    /// Workspace root; every form directory lives below it.
    pub storage_root: PathBuf,
    /// File name of the per-form record (default: `metadata.json`).
    #[serde(default = "default_metadata_file")]
    pub metadata_file: String,
    /// How deep below the root to look for records when opening (default: 4).
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    /// Pretty-print records (default: true).
    #[serde(default = "default_pretty")]
    pub pretty: bool,
}

// Default value functions
fn default_metadata_file() -> String {
    "metadata.json".to_string()
}

fn default_max_depth() -> usize {
    4
}

fn default_pretty() -> bool {
    true
}

impl StoreConfig {
    /// Default configuration for a storage root.
    pub fn new(storage_root: impl Into<PathBuf>) -> Self {
        Self {
            storage_root: storage_root.into(),
            metadata_file: default_metadata_file(),
            max_depth: default_max_depth(),
            pretty: default_pretty(),
        }
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
}
