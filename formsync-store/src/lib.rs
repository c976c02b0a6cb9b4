//! # formsync-store
//!
//! File-backed metadata store for formsync.
//!
//! Every form keeps its record next to its data:
//!
//! ```text
//! <storage_root>/
//! ├── forms/Census/
//! │   ├── metadata.json      ← FormMetadata::to_json()
//! │   └── instances/...
//! └── forms/Household/
//!     └── metadata.json
//! ```
//!
//! Records store the form directory relative to the storage root, so a
//! whole workspace can be moved or copied and reopened elsewhere.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod file;

pub use config::{ConfigError, StoreConfig};
pub use error::StoreError;
pub use file::FileStore;
