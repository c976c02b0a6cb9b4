//! Error types for the file store.

use std::path::PathBuf;

use formsync_core::PortError;
use formsync_types::MetadataError;

/// File store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Reading or writing a file failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File or directory involved.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A record file is not valid JSON.
    #[error("invalid JSON in {path}: {source}")]
    Json {
        /// The record file.
        path: PathBuf,
        /// Underlying parse error.
        source: serde_json::Error,
    },

    /// A record file is valid JSON but not a valid record.
    #[error("invalid metadata in {path}: {source}")]
    Metadata {
        /// The record file.
        path: PathBuf,
        /// What was wrong with the record.
        source: MetadataError,
    },

    /// A record would be written where this store never reads it.
    #[error("record {path} lies outside storage root {root}")]
    OutsideRoot {
        /// Where the record would have been written.
        path: PathBuf,
        /// The store's storage root.
        root: PathBuf,
    },

    /// A record would be written deeper than the store scans at open.
    #[error("record {path} is more than {max_depth} levels below the storage root")]
    TooDeep {
        /// Where the record would have been written.
        path: PathBuf,
        /// The configured scan depth.
        max_depth: usize,
    },

    /// Walking the storage root failed.
    #[error("failed to scan storage root: {0}")]
    Scan(#[from] walkdir::Error),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<StoreError> for PortError {
    fn from(error: StoreError) -> Self {
        PortError::backend(error)
    }
}

/// Result type alias for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
