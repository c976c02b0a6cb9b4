//! # formsync-types
//!
//! Value types for form sync metadata.
//!
//! This crate provides the leaf types used across all formsync crates:
//! - [`FormKey`] - Composite form identity used as the store's lookup key
//! - [`Cursor`] - Opaque resumption token for incremental pulls
//! - [`SubmissionExportMetadata`] - Marker for the last exported submission
//! - [`MetadataError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod export;
mod ids;

pub use error::MetadataError;
pub use export::SubmissionExportMetadata;
pub use ids::{Cursor, FormKey};
