//! Error types for form sync metadata.

use thiserror::Error;

/// Errors raised while building or decoding form metadata.
#[derive(Debug, Error)]
pub enum MetadataError {
    /// A form definition lacks its title, primary instance, or form id.
    #[error("malformed form definition: {0}")]
    MalformedDefinition(String),

    /// A persisted record is missing a required field or has the wrong shape.
    #[error("malformed metadata record: field `{field}`: {reason}")]
    MalformedRecord {
        /// Name of the offending wire field.
        field: &'static str,
        /// What was wrong with it.
        reason: String,
    },
}

impl MetadataError {
    /// Shorthand for a [`MetadataError::MalformedRecord`].
    pub fn record(field: &'static str, reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            field,
            reason: reason.into(),
        }
    }

    /// Shorthand for a [`MetadataError::MalformedDefinition`].
    pub fn definition(reason: impl Into<String>) -> Self {
        Self::MalformedDefinition(reason.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = MetadataError::record("formDir", "missing");
        assert_eq!(
            err.to_string(),
            "malformed metadata record: field `formDir`: missing"
        );

        let err = MetadataError::definition("no title");
        assert_eq!(err.to_string(), "malformed form definition: no title");
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<MetadataError>();
    }
}
