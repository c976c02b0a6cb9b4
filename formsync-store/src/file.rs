//! File-backed implementation of [`FormMetadataPort`].

use std::collections::HashMap;
use std::ffi::OsStr;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use walkdir::WalkDir;

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use formsync_core::{FormMetadata, FormMetadataPort, PortError};
use formsync_types::FormKey;

/// Metadata store keeping one JSON record inside each form directory.
///
/// All records are loaded when the store is opened and served from memory
/// afterwards. Writes go to disk first, through a temporary file that is
/// renamed over the record, so a crash never leaves a half-written record.
///
/// A record is only written if reopening would find it again: its form
/// directory must sit under the storage root, within `max_depth`.
#[derive(Debug)]
pub struct FileStore {
    config: StoreConfig,
    records: Mutex<HashMap<FormKey, FormMetadata>>,
}

impl FileStore {
    /// Open the store, loading every record below the storage root.
    ///
    /// Creates the storage root if it does not exist.
    ///
    /// # Errors
    ///
    /// Fails if the root cannot be created or scanned, or if any record
    /// file is unreadable or malformed.
    pub fn open(config: StoreConfig) -> StoreResult<Self> {
        let root = &config.storage_root;
        fs::create_dir_all(root).map_err(|e| StoreError::io(root, e))?;

        let mut records = HashMap::new();
        let file_name = OsStr::new(&config.metadata_file);
        for entry in WalkDir::new(root)
            .max_depth(config.max_depth)
            .follow_links(false)
        {
            let entry = entry?;
            if entry.file_name() != file_name {
                continue;
            }
            if !entry.file_type().is_file() {
                tracing::warn!("Skipping {}: not a regular file", entry.path().display());
                continue;
            }

            let metadata = read_record(root, entry.path())?;
            if let Some(previous) = records.insert(metadata.key().clone(), metadata) {
                tracing::warn!(
                    "Duplicate metadata for {}; {} replaces {}",
                    previous.key(),
                    entry.path().display(),
                    previous.form_dir().display()
                );
            }
        }

        tracing::info!(
            "Opened metadata store at {} ({} forms)",
            root.display(),
            records.len()
        );

        Ok(Self {
            config,
            records: Mutex::new(records),
        })
    }

    /// Load a TOML configuration file and open the store it describes.
    ///
    /// # Errors
    ///
    /// Fails if the configuration cannot be loaded or the store cannot be
    /// opened.
    pub fn open_with_config_file(path: &Path) -> StoreResult<Self> {
        Self::open(StoreConfig::from_file(path)?)
    }

    /// The configuration this store was opened with.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Where the record for `metadata` is written.
    pub fn record_path(&self, metadata: &FormMetadata) -> PathBuf {
        metadata.form_dir().join(&self.config.metadata_file)
    }

    /// Reject records that a later [`FileStore::open`] would not find.
    fn check_reachable(&self, metadata: &FormMetadata) -> StoreResult<()> {
        let path = self.record_path(metadata);
        let mut depth = 1;
        for component in metadata.relative_form_dir().components() {
            match component {
                Component::Normal(_) => depth += 1,
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(self.outside_root(path));
                }
            }
        }
        if metadata.storage_root() != self.config.storage_root.as_path() {
            return Err(self.outside_root(path));
        }
        if depth > self.config.max_depth {
            return Err(StoreError::TooDeep {
                path,
                max_depth: self.config.max_depth,
            });
        }
        Ok(())
    }

    fn outside_root(&self, path: PathBuf) -> StoreError {
        StoreError::OutsideRoot {
            path,
            root: self.config.storage_root.clone(),
        }
    }

    fn write_record(&self, metadata: &FormMetadata) -> StoreResult<()> {
        self.check_reachable(metadata)?;

        let dir = metadata.form_dir();
        fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;

        let path = self.record_path(metadata);
        let json = metadata.to_json();
        let bytes = if self.config.pretty {
            serde_json::to_vec_pretty(&json)
        } else {
            serde_json::to_vec(&json)
        }
        .map_err(|source| StoreError::Json {
            path: path.clone(),
            source,
        })?;

        let tmp = dir.join(format!(".{}.tmp", self.config.metadata_file));
        fs::write(&tmp, bytes).map_err(|e| StoreError::io(&tmp, e))?;
        fs::rename(&tmp, &path).map_err(|e| StoreError::io(&path, e))?;

        tracing::debug!("Persisted metadata for {} to {}", metadata.key(), path.display());
        Ok(())
    }

    // Every critical section leaves the index consistent with disk, so a
    // poisoned lock still guards valid data.
    fn lock(&self) -> MutexGuard<'_, HashMap<FormKey, FormMetadata>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl FormMetadataPort for FileStore {
    fn fetch(&self, key: &FormKey) -> Result<Option<FormMetadata>, PortError> {
        Ok(self.lock().get(key).cloned())
    }

    fn fetch_all(&self) -> Result<Vec<FormMetadata>, PortError> {
        Ok(self.lock().values().cloned().collect())
    }

    fn persist(&self, metadata: FormMetadata) -> Result<(), PortError> {
        let mut records = self.lock();
        self.write_record(&metadata)?;
        records.insert(metadata.key().clone(), metadata);
        Ok(())
    }

    fn persist_all(&self, metadata: Vec<FormMetadata>) -> Result<(), PortError> {
        let mut records = self.lock();
        for m in metadata {
            self.write_record(&m)?;
            records.insert(m.key().clone(), m);
        }
        Ok(())
    }
}

fn read_record(root: &Path, path: &Path) -> StoreResult<FormMetadata> {
    let content = fs::read(path).map_err(|e| StoreError::io(path, e))?;
    let json: serde_json::Value =
        serde_json::from_slice(&content).map_err(|source| StoreError::Json {
            path: path.to_path_buf(),
            source,
        })?;
    FormMetadata::from_json(root, &json).map_err(|source| StoreError::Metadata {
        path: path.to_path_buf(),
        source,
    })
}
