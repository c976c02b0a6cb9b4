//! # formsync-core
//!
//! Pure logic for form sync metadata (no I/O, instant tests).
//!
//! This crate owns the per-form sync record and the commands that move it
//! between states, without any network or disk I/O.
//!
//! ## Design Philosophy
//!
//! Records are immutable values: every transition builds a new
//! [`FormMetadata`]. Commands are values too. A [`Command`] captures the
//! facts a pull, export or discovery scan has observed, and only touches
//! storage when applied to a [`FormMetadataPort`]. This enables:
//! - Instant unit tests against [`MemoryPort`]
//! - Logging, batching or queueing transitions before running them
//! - Swapping the storage engine without touching transition logic
//!
//! Durable storage lives in `formsync-store`, which implements the port.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod commands;
pub mod definition;
pub mod executor;
pub mod metadata;
pub mod port;

pub use commands::{
    clean_all_cursors, update_as_pulled, update_as_pulled_keeping_cursor,
    update_last_exported_submission, update_submission_versions, Command,
};
pub use definition::{FormElement, XmlElement};
pub use executor::KeyedExecutor;
pub use metadata::FormMetadata;
pub use port::{FormMetadataPort, MemoryPort, PortError};

pub use formsync_types::{Cursor, FormKey, MetadataError, SubmissionExportMetadata};
