//! The per-form sync record.
//!
//! A [`FormMetadata`] tracks, for one form:
//! - whether its submissions have ever been pulled
//! - the cursor the next incremental pull resumes from
//! - which form versions the pulled submissions were recorded against
//! - the last submission that was exported
//!
//! Records are immutable. Every `with_*` method returns a new record, and
//! every method that takes submission versions merges them into the
//! existing set. Versions are never removed, so repeated or resumed pulls
//! cannot lose history.

use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};
use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, FixedOffset};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::definition::FormElement;
use formsync_types::{Cursor, FormKey, MetadataError, SubmissionExportMetadata};

const KEY: &str = "key";
const FORM_DIR: &str = "formDir";
const HAS_BEEN_PULLED: &str = "hasBeenPulled";
const CURSOR: &str = "cursor";
const LAST_EXPORTED_SUBMISSION: &str = "lastExportedSubmission";
const SUBMISSION_VERSIONS: &str = "submissionVersions";

/// Sync state of one form.
///
/// Equality and hashing cover the key, storage root, form directory,
/// pulled flag, cursor and export marker. The submission version set is
/// accumulated history and is not part of a record's identity.
#[derive(Debug, Clone)]
pub struct FormMetadata {
    key: FormKey,
    storage_root: PathBuf,
    /// Always relative to `storage_root`.
    form_dir: PathBuf,
    has_been_pulled: bool,
    cursor: Cursor,
    last_exported_submission: Option<SubmissionExportMetadata>,
    submission_versions: BTreeSet<String>,
}

impl FormMetadata {
    fn new(
        key: FormKey,
        storage_root: PathBuf,
        form_dir: PathBuf,
        has_been_pulled: bool,
        cursor: Cursor,
        last_exported_submission: Option<SubmissionExportMetadata>,
        submission_versions: BTreeSet<String>,
    ) -> Self {
        let form_dir = relativize(&storage_root, form_dir);
        Self {
            key,
            storage_root,
            form_dir,
            has_been_pulled,
            cursor,
            last_exported_submission,
            submission_versions,
        }
    }

    /// Create the record of a form nothing is known about yet.
    ///
    /// `form_dir` may be absolute (it is made relative to `storage_root`)
    /// or already relative.
    pub fn of(
        key: FormKey,
        storage_root: impl Into<PathBuf>,
        form_dir: impl Into<PathBuf>,
    ) -> Self {
        Self::new(
            key,
            storage_root.into(),
            form_dir.into(),
            false,
            Cursor::empty(),
            None,
            BTreeSet::new(),
        )
    }

    /// Derive a record from a form definition found at `form_file`.
    ///
    /// The key is built from the definition's title and the id of its
    /// primary instance. The form directory is the file's parent. Discovery
    /// does not imply a pull, so the record starts unpulled.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataError::MalformedDefinition`] if the root is not an
    /// `html` element, or the title, primary instance or form id is missing.
    pub fn from_definition<E: FormElement>(
        storage_root: impl Into<PathBuf>,
        form_file: &Path,
        definition: &E,
    ) -> Result<Self, MetadataError> {
        if definition.local_name() != "html" {
            return Err(MetadataError::definition(format!(
                "expected an html root element, found <{}>",
                definition.name()
            )));
        }

        let name = definition
            .find_elements(&["head", "title"])
            .first()
            .and_then(|title| title.value())
            .ok_or_else(|| MetadataError::definition("missing form title"))?
            .to_string();

        let primary = definition
            .find_elements(&["head", "model", "instance"])
            .into_iter()
            .find(|instance| is_primary_instance(*instance))
            .ok_or_else(|| MetadataError::definition("no primary instance declaration"))?;

        let id = primary
            .children()
            .first()
            .and_then(|data| data.attribute("id"))
            .ok_or_else(|| MetadataError::definition("primary instance has no form id"))?
            .to_string();

        let form_dir = form_file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        Ok(Self::of(FormKey::new(name, id), storage_root, form_dir))
    }

    /// Decode a persisted record.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataError::MalformedRecord`] if `key`, `formDir`,
    /// `hasBeenPulled` or `cursor` is missing or has the wrong shape, or if
    /// an optional field is present with the wrong shape.
    pub fn from_json(
        storage_root: impl Into<PathBuf>,
        node: &Value,
    ) -> Result<Self, MetadataError> {
        let object = node
            .as_object()
            .ok_or_else(|| MetadataError::record(KEY, "record is not a JSON object"))?;

        let key: FormKey = required(object, KEY)?;
        let form_dir: String = required(object, FORM_DIR)?;
        let has_been_pulled: bool = required(object, HAS_BEEN_PULLED)?;
        let cursor: Cursor = required(object, CURSOR)?;
        let last_exported_submission: Option<SubmissionExportMetadata> =
            optional(object, LAST_EXPORTED_SUBMISSION)?;
        let submission_versions: BTreeSet<String> =
            match optional::<Vec<Value>>(object, SUBMISSION_VERSIONS)? {
                Some(versions) => versions
                    .iter()
                    .map(version_text)
                    .collect::<Result<_, MetadataError>>()?,
                None => BTreeSet::new(),
            };

        Ok(Self::new(
            key,
            storage_root.into(),
            from_portable(&form_dir),
            has_been_pulled,
            cursor,
            last_exported_submission,
            submission_versions,
        ))
    }

    /// Encode this record. The form directory is written root-relative
    /// with `/` separators.
    pub fn to_json(&self) -> Value {
        let mut object = Map::new();
        object.insert(KEY.into(), serde_json::json!(self.key));
        object.insert(FORM_DIR.into(), Value::String(to_portable(&self.form_dir)));
        object.insert(HAS_BEEN_PULLED.into(), Value::Bool(self.has_been_pulled));
        object.insert(CURSOR.into(), serde_json::json!(self.cursor));
        if let Some(marker) = &self.last_exported_submission {
            object.insert(LAST_EXPORTED_SUBMISSION.into(), serde_json::json!(marker));
        }
        object.insert(
            SUBMISSION_VERSIONS.into(),
            serde_json::json!(self.submission_versions),
        );
        Value::Object(object)
    }

    /// The form's key.
    pub fn key(&self) -> &FormKey {
        &self.key
    }

    /// The workspace root this record was loaded under.
    pub fn storage_root(&self) -> &Path {
        &self.storage_root
    }

    /// Absolute path of the form's data directory.
    pub fn form_dir(&self) -> PathBuf {
        self.storage_root.join(&self.form_dir)
    }

    /// The form's data directory relative to the storage root.
    pub fn relative_form_dir(&self) -> &Path {
        &self.form_dir
    }

    /// Whether at least one pull of this form has completed.
    pub fn has_been_pulled(&self) -> bool {
        self.has_been_pulled
    }

    /// Where the next incremental pull resumes.
    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    /// The most recently exported submission, if any.
    pub fn last_exported_submission(&self) -> Option<&SubmissionExportMetadata> {
        self.last_exported_submission.as_ref()
    }

    /// Form versions seen among this form's submissions.
    pub fn submission_versions(&self) -> &BTreeSet<String> {
        &self.submission_versions
    }

    /// Replace the cursor.
    #[must_use]
    pub fn with_cursor(self, cursor: Cursor) -> Self {
        Self { cursor, ..self }
    }

    /// Reset the cursor so the next pull starts from the beginning.
    #[must_use]
    pub fn without_cursor(self) -> Self {
        self.with_cursor(Cursor::empty())
    }

    /// Add submission versions to the recorded set.
    #[must_use]
    pub fn with_submission_versions<I, S>(mut self, versions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.submission_versions
            .extend(versions.into_iter().map(Into::into));
        self
    }

    /// Set the pulled flag and add submission versions to the recorded set.
    #[must_use]
    pub fn with_has_been_pulled<I, S>(self, has_been_pulled: bool, versions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            has_been_pulled,
            ..self
        }
        .with_submission_versions(versions)
    }

    /// Record the last exported submission, replacing any previous marker.
    #[must_use]
    pub fn with_last_exported_submission(
        self,
        instance_id: impl Into<String>,
        submission_date: DateTime<FixedOffset>,
        export_date_time: DateTime<FixedOffset>,
    ) -> Self {
        Self {
            last_exported_submission: Some(SubmissionExportMetadata::new(
                instance_id,
                submission_date,
                export_date_time,
            )),
            ..self
        }
    }
}

impl PartialEq for FormMetadata {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
            && self.storage_root == other.storage_root
            && self.form_dir == other.form_dir
            && self.has_been_pulled == other.has_been_pulled
            && self.cursor == other.cursor
            && self.last_exported_submission == other.last_exported_submission
    }
}

impl Eq for FormMetadata {}

impl Hash for FormMetadata {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
        self.storage_root.hash(state);
        self.form_dir.hash(state);
        self.has_been_pulled.hash(state);
        self.cursor.hash(state);
        self.last_exported_submission.hash(state);
    }
}

/// An `<instance>` is the primary one when it is not a secondary instance
/// (no `id` of its own) and wraps exactly one data element carrying the
/// form id.
fn is_primary_instance<E: FormElement>(instance: &E) -> bool {
    let children = instance.children();
    !instance.has_attribute("id") && children.len() == 1 && children[0].has_attribute("id")
}

fn required<T: DeserializeOwned>(
    object: &Map<String, Value>,
    field: &'static str,
) -> Result<T, MetadataError> {
    let value = object
        .get(field)
        .ok_or_else(|| MetadataError::record(field, "missing"))?;
    serde_json::from_value(value.clone()).map_err(|e| MetadataError::record(field, e.to_string()))
}

fn optional<T: DeserializeOwned>(
    object: &Map<String, Value>,
    field: &'static str,
) -> Result<Option<T>, MetadataError> {
    match object.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_json::from_value(value.clone())
            .map(Some)
            .map_err(|e| MetadataError::record(field, e.to_string())),
    }
}

/// Versions are opaque labels; scalar elements keep their JSON text.
fn version_text(value: &Value) -> Result<String, MetadataError> {
    match value {
        Value::String(version) => Ok(version.clone()),
        Value::Number(number) => Ok(number.to_string()),
        Value::Bool(flag) => Ok(flag.to_string()),
        other => Err(MetadataError::record(
            SUBMISSION_VERSIONS,
            format!("expected a scalar version, found {other}"),
        )),
    }
}

/// Express `path` relative to `root`. Relative paths are kept as they are.
fn relativize(root: &Path, path: PathBuf) -> PathBuf {
    if !path.is_absolute() {
        return path;
    }
    if let Ok(relative) = path.strip_prefix(root) {
        return relative.to_path_buf();
    }

    let root_components: Vec<Component<'_>> = root.components().collect();
    let path_components: Vec<Component<'_>> = path.components().collect();
    let common = root_components
        .iter()
        .zip(&path_components)
        .take_while(|(a, b)| a == b)
        .count();
    // Nothing shared, not even the root or drive: keep the absolute path.
    if common == 0 {
        return path;
    }

    let mut relative = PathBuf::new();
    for _ in common..root_components.len() {
        relative.push("..");
    }
    for component in &path_components[common..] {
        relative.push(component.as_os_str());
    }
    relative
}

fn to_portable(path: &Path) -> String {
    let mut portable = String::new();
    for component in path.components() {
        match component {
            Component::Prefix(prefix) => {
                portable.push_str(&prefix.as_os_str().to_string_lossy());
            }
            Component::RootDir => portable.push('/'),
            Component::CurDir => {}
            Component::ParentDir | Component::Normal(_) => {
                if !portable.is_empty() && !portable.ends_with('/') {
                    portable.push('/');
                }
                portable.push_str(&component.as_os_str().to_string_lossy());
            }
        }
    }
    portable
}

fn from_portable(path: &str) -> PathBuf {
    if Path::new(path).is_absolute() {
        return PathBuf::from(path);
    }
    path.split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect()
}
