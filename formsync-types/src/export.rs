//! Bookkeeping for the most recently exported submission of a form.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Identifies the last submission exported for a form, and when.
///
/// Both timestamps keep their original UTC offset and are serialized as
/// RFC 3339 strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionExportMetadata {
    instance_id: String,
    submission_date: DateTime<FixedOffset>,
    export_date_time: DateTime<FixedOffset>,
}

impl SubmissionExportMetadata {
    /// Create a new export marker.
    pub fn new(
        instance_id: impl Into<String>,
        submission_date: DateTime<FixedOffset>,
        export_date_time: DateTime<FixedOffset>,
    ) -> Self {
        Self {
            instance_id: instance_id.into(),
            submission_date,
            export_date_time,
        }
    }

    /// Instance id of the exported submission.
    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// When the exported submission was recorded.
    pub fn submission_date(&self) -> DateTime<FixedOffset> {
        self.submission_date
    }

    /// When the export ran.
    pub fn export_date_time(&self) -> DateTime<FixedOffset> {
        self.export_date_time
    }
}
