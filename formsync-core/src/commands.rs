//! State transitions over a metadata store.
//!
//! Each factory function returns a [`Command`]: a deferred read-modify-write
//! cycle that runs only when applied to a [`FormMetadataPort`]. Keyed
//! commands fetch the current record, or start from
//! [`FormMetadata::of`] when the form is unknown, so they never fail for
//! lack of a prior record. Port failures are returned unchanged.
//!
//! Every command is safe to re-run: versions merge by union, and the
//! pulled flag, cursor and export marker are plain overwrites.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset};

use crate::metadata::FormMetadata;
use crate::port::{FormMetadataPort, PortError};
use formsync_types::{Cursor, FormKey};

/// A deferred transition of the metadata store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Mark a form as pulled and merge the versions seen in the pull.
    UpdateAsPulled {
        /// Form to update.
        key: FormKey,
        /// New resumption cursor; `None` leaves the stored cursor alone.
        cursor: Option<Cursor>,
        /// Storage root used when the form has no record yet.
        storage_root: PathBuf,
        /// Form directory used when the form has no record yet.
        form_dir: PathBuf,
        /// Versions seen among the pulled submissions.
        submission_versions: BTreeSet<String>,
    },
    /// Merge newly observed submission versions.
    UpdateSubmissionVersions {
        /// Form to update.
        key: FormKey,
        /// Storage root used when the form has no record yet.
        storage_root: PathBuf,
        /// Form directory used when the form has no record yet.
        form_dir: PathBuf,
        /// Versions to add.
        submission_versions: BTreeSet<String>,
    },
    /// Replace the last-exported-submission marker.
    UpdateLastExportedSubmission {
        /// Form to update.
        key: FormKey,
        /// Instance id of the exported submission.
        instance_id: String,
        /// When the submission was recorded.
        submission_date: DateTime<FixedOffset>,
        /// When the export ran.
        export_date_time: DateTime<FixedOffset>,
        /// Storage root used when the form has no record yet.
        storage_root: PathBuf,
        /// Form directory used when the form has no record yet.
        form_dir: PathBuf,
    },
    /// Reset the cursor of every known form.
    CleanAllCursors,
}

impl Command {
    /// The form this command touches, or `None` for workspace-wide commands.
    pub fn key(&self) -> Option<&FormKey> {
        match self {
            Self::UpdateAsPulled { key, .. }
            | Self::UpdateSubmissionVersions { key, .. }
            | Self::UpdateLastExportedSubmission { key, .. } => Some(key),
            Self::CleanAllCursors => None,
        }
    }

    /// Run this command against a store.
    ///
    /// # Errors
    ///
    /// Returns whatever the port returns; nothing is retried.
    pub fn apply<P: FormMetadataPort + ?Sized>(&self, port: &P) -> Result<(), PortError> {
        match self {
            Self::UpdateAsPulled {
                key,
                cursor,
                storage_root,
                form_dir,
                submission_versions,
            } => {
                tracing::debug!(
                    "Marking {} as pulled (cursor: {:?}, versions: {:?})",
                    key,
                    cursor,
                    submission_versions
                );
                let updated = fetch_or_default(port, key, storage_root, form_dir)?
                    .with_has_been_pulled(true, submission_versions.iter().cloned());
                let updated = match cursor {
                    Some(cursor) => updated.with_cursor(cursor.clone()),
                    None => updated,
                };
                port.persist(updated)
            }
            Self::UpdateSubmissionVersions {
                key,
                storage_root,
                form_dir,
                submission_versions,
            } => {
                tracing::debug!(
                    "Recording submission versions {:?} for {}",
                    submission_versions,
                    key
                );
                let updated = fetch_or_default(port, key, storage_root, form_dir)?
                    .with_submission_versions(submission_versions.iter().cloned());
                port.persist(updated)
            }
            Self::UpdateLastExportedSubmission {
                key,
                instance_id,
                submission_date,
                export_date_time,
                storage_root,
                form_dir,
            } => {
                tracing::debug!("Recording export of {} for {}", instance_id, key);
                let updated = fetch_or_default(port, key, storage_root, form_dir)?
                    .with_last_exported_submission(
                        instance_id.clone(),
                        *submission_date,
                        *export_date_time,
                    );
                port.persist(updated)
            }
            Self::CleanAllCursors => {
                let reset: Vec<FormMetadata> = port
                    .fetch_all()?
                    .into_iter()
                    .map(FormMetadata::without_cursor)
                    .collect();
                tracing::debug!("Resetting cursors of {} forms", reset.len());
                port.persist_all(reset)
            }
        }
    }
}

fn fetch_or_default<P: FormMetadataPort + ?Sized>(
    port: &P,
    key: &FormKey,
    storage_root: &Path,
    form_dir: &Path,
) -> Result<FormMetadata, PortError> {
    Ok(port.fetch(key)?.unwrap_or_else(|| {
        tracing::debug!("No metadata for {} yet, starting from defaults", key);
        FormMetadata::of(key.clone(), storage_root, form_dir)
    }))
}

fn version_set<I, S>(versions: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    versions.into_iter().map(Into::into).collect()
}

/// Record a completed pull batch that advanced the resumption cursor.
pub fn update_as_pulled<I, S>(
    key: FormKey,
    cursor: Cursor,
    storage_root: impl Into<PathBuf>,
    form_dir: impl Into<PathBuf>,
    submission_versions: I,
) -> Command
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Command::UpdateAsPulled {
        key,
        cursor: Some(cursor),
        storage_root: storage_root.into(),
        form_dir: form_dir.into(),
        submission_versions: version_set(submission_versions),
    }
}

/// Record a completed pull from a source with no cursor concept.
///
/// The stored cursor is left untouched.
pub fn update_as_pulled_keeping_cursor<I, S>(
    key: FormKey,
    storage_root: impl Into<PathBuf>,
    form_dir: impl Into<PathBuf>,
    submission_versions: I,
) -> Command
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Command::UpdateAsPulled {
        key,
        cursor: None,
        storage_root: storage_root.into(),
        form_dir: form_dir.into(),
        submission_versions: version_set(submission_versions),
    }
}

/// Record submission versions observed outside of a pull, e.g. in a scan.
pub fn update_submission_versions<I, S>(
    key: FormKey,
    storage_root: impl Into<PathBuf>,
    form_dir: impl Into<PathBuf>,
    submission_versions: I,
) -> Command
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Command::UpdateSubmissionVersions {
        key,
        storage_root: storage_root.into(),
        form_dir: form_dir.into(),
        submission_versions: version_set(submission_versions),
    }
}

/// Record a successful export of one submission.
pub fn update_last_exported_submission(
    key: FormKey,
    instance_id: impl Into<String>,
    submission_date: DateTime<FixedOffset>,
    export_date_time: DateTime<FixedOffset>,
    storage_root: impl Into<PathBuf>,
    form_dir: impl Into<PathBuf>,
) -> Command {
    Command::UpdateLastExportedSubmission {
        key,
        instance_id: instance_id.into(),
        submission_date,
        export_date_time,
        storage_root: storage_root.into(),
        form_dir: form_dir.into(),
    }
}

/// Make every form's next pull start from the beginning.
pub fn clean_all_cursors() -> Command {
    Command::CleanAllCursors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::MemoryPort;

    fn root() -> PathBuf {
        PathBuf::from("/srv/briefcase")
    }

    fn key() -> FormKey {
        FormKey::new("Census", "census-1")
    }

    fn dir() -> PathBuf {
        root().join("forms").join("Census")
    }

    fn ts(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(s).unwrap()
    }

    fn stored(port: &MemoryPort) -> FormMetadata {
        port.fetch(&key()).unwrap().unwrap()
    }

    #[test]
    fn update_submission_versions_synthesizes_default() {
        let port = MemoryPort::new();

        update_submission_versions(key(), root(), dir(), ["v1"])
            .apply(&port)
            .unwrap();

        let expected = FormMetadata::of(key(), root(), dir()).with_submission_versions(["v1"]);
        let actual = stored(&port);
        assert_eq!(actual, expected);
        assert_eq!(actual.submission_versions(), expected.submission_versions());
    }

    #[test]
    fn update_as_pulled_sets_flag_cursor_and_versions() {
        let port = MemoryPort::new();

        update_as_pulled(key(), Cursor::new("c-1"), root(), dir(), ["v1", "v2"])
            .apply(&port)
            .unwrap();

        let metadata = stored(&port);
        assert!(metadata.has_been_pulled());
        assert_eq!(metadata.cursor(), &Cursor::new("c-1"));
        assert_eq!(metadata.submission_versions().len(), 2);
    }

    #[test]
    fn update_as_pulled_is_idempotent() {
        let port = MemoryPort::new();
        let command = update_as_pulled(key(), Cursor::new("c-1"), root(), dir(), ["v1"]);

        command.apply(&port).unwrap();
        let once = stored(&port);
        command.apply(&port).unwrap();
        let twice = stored(&port);

        assert_eq!(once, twice);
        assert_eq!(once.submission_versions(), twice.submission_versions());
        assert_eq!(port.len(), 1);
    }

    #[test]
    fn update_as_pulled_keeps_history_from_earlier_pulls() {
        let port = MemoryPort::new();

        update_as_pulled(key(), Cursor::new("c-1"), root(), dir(), ["v1"])
            .apply(&port)
            .unwrap();
        update_as_pulled(key(), Cursor::new("c-2"), root(), dir(), ["v2"])
            .apply(&port)
            .unwrap();

        let metadata = stored(&port);
        assert_eq!(metadata.cursor(), &Cursor::new("c-2"));
        let versions: Vec<&str> = metadata
            .submission_versions()
            .iter()
            .map(String::as_str)
            .collect();
        assert_eq!(versions, ["v1", "v2"]);
    }

    #[test]
    fn update_as_pulled_keeping_cursor_leaves_cursor() {
        let port = MemoryPort::with_records([
            FormMetadata::of(key(), root(), dir()).with_cursor(Cursor::new("c-7"))
        ]);

        update_as_pulled_keeping_cursor(key(), root(), dir(), ["v3"])
            .apply(&port)
            .unwrap();

        let metadata = stored(&port);
        assert!(metadata.has_been_pulled());
        assert_eq!(metadata.cursor(), &Cursor::new("c-7"));
        assert!(metadata.submission_versions().contains("v3"));
    }

    #[test]
    fn existing_record_wins_over_defaults() {
        let existing_dir = root().join("elsewhere");
        let port = MemoryPort::with_records([FormMetadata::of(key(), root(), existing_dir.clone())]);

        update_submission_versions(key(), root(), dir(), ["v1"])
            .apply(&port)
            .unwrap();

        assert_eq!(stored(&port).form_dir(), existing_dir);
    }

    #[test]
    fn update_last_exported_submission_is_last_write_wins() {
        let port = MemoryPort::new();

        update_last_exported_submission(
            key(),
            "uuid:1",
            ts("2023-01-01T00:00:00Z"),
            ts("2023-01-02T00:00:00Z"),
            root(),
            dir(),
        )
        .apply(&port)
        .unwrap();
        update_last_exported_submission(
            key(),
            "uuid:2",
            ts("2023-01-03T00:00:00+01:00"),
            ts("2023-01-04T00:00:00Z"),
            root(),
            dir(),
        )
        .apply(&port)
        .unwrap();

        let metadata = stored(&port);
        let marker = metadata.last_exported_submission().unwrap();
        assert_eq!(marker.instance_id(), "uuid:2");
        assert_eq!(marker.export_date_time(), ts("2023-01-04T00:00:00Z"));
        assert!(!metadata.has_been_pulled());
    }

    #[test]
    fn clean_all_cursors_resets_every_record() {
        let records: Vec<FormMetadata> = (0..5)
            .map(|i| {
                let key = FormKey::new(format!("Form {i}"), format!("f{i}"));
                FormMetadata::of(key, root(), format!("f{i}"))
                    .with_has_been_pulled(i % 2 == 0, [format!("v{i}")])
                    .with_cursor(Cursor::new(format!("c-{i}")))
            })
            .collect();
        let port = MemoryPort::with_records(records.clone());

        clean_all_cursors().apply(&port).unwrap();

        let after = port.fetch_all().unwrap();
        assert_eq!(after.len(), records.len());
        for before in records {
            let now = port.fetch(before.key()).unwrap().unwrap();
            assert!(now.cursor().is_empty());
            assert_eq!(now, before.clone().without_cursor());
            assert_eq!(now.submission_versions(), before.submission_versions());
        }
    }

    #[test]
    fn clean_all_cursors_on_empty_store() {
        let port = MemoryPort::new();
        clean_all_cursors().apply(&port).unwrap();
        assert!(port.is_empty());
    }

    #[test]
    fn fetch_failure_propagates_without_persisting() {
        let port = MemoryPort::new();
        port.fail_next_fetch("offline");

        let result = update_submission_versions(key(), root(), dir(), ["v1"]).apply(&port);

        assert!(matches!(result, Err(PortError::Unavailable(_))));
        assert!(port.is_empty());
    }

    #[test]
    fn persist_failure_propagates() {
        let port = MemoryPort::with_records([
            FormMetadata::of(key(), root(), dir()).with_cursor(Cursor::new("c-1"))
        ]);
        port.fail_next_persist("read-only");

        let result = clean_all_cursors().apply(&port);

        assert!(matches!(result, Err(PortError::Unavailable(_))));
        assert_eq!(stored(&port).cursor(), &Cursor::new("c-1"));
    }

    #[test]
    fn command_key() {
        assert_eq!(
            update_submission_versions(key(), root(), dir(), ["v1"]).key(),
            Some(&key())
        );
        assert_eq!(clean_all_cursors().key(), None);
    }

    #[test]
    fn commands_are_values() {
        let a = update_as_pulled_keeping_cursor(key(), root(), dir(), ["v2", "v1"]);
        let b = update_as_pulled_keeping_cursor(key(), root(), dir(), ["v1", "v2", "v1"]);
        assert_eq!(a, b);
    }
}
