//! Storage port for form metadata.
//!
//! This module defines the narrow interface commands need from a store,
//! plus a memory-based implementation for testing and for embedding in
//! processes that do not need durability.

use std::collections::HashMap;
use std::error::Error;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;

use crate::metadata::FormMetadata;
use formsync_types::{FormKey, MetadataError};

/// Errors reported by a storage port.
///
/// Commands never retry or swallow these; they reach the caller unchanged.
#[derive(Debug, Error)]
pub enum PortError {
    /// The store cannot be reached or refused the operation.
    #[error("metadata store unavailable: {0}")]
    Unavailable(String),

    /// A stored record could not be decoded.
    #[error("corrupt metadata record: {0}")]
    Corrupt(#[from] MetadataError),

    /// Any other failure of the concrete store.
    #[error("metadata store failure: {0}")]
    Backend(#[source] Box<dyn Error + Send + Sync>),
}

impl PortError {
    /// Wrap a store-specific error.
    pub fn backend(error: impl Into<Box<dyn Error + Send + Sync>>) -> Self {
        Self::Backend(error.into())
    }
}

/// Trait for form metadata stores.
///
/// Persisting is an upsert by key: the last write for a key wins, and
/// persisting a record with no prior entry inserts it. Implementations
/// must not corrupt records under concurrent use, but need not make a
/// fetch-then-persist sequence atomic; see [`KeyedExecutor`](crate::KeyedExecutor).
pub trait FormMetadataPort: Send + Sync {
    /// Look up the record for `key`. Absence is not an error.
    fn fetch(&self, key: &FormKey) -> Result<Option<FormMetadata>, PortError>;

    /// All known records, in no particular order.
    fn fetch_all(&self) -> Result<Vec<FormMetadata>, PortError>;

    /// Insert or replace the record for its key.
    fn persist(&self, metadata: FormMetadata) -> Result<(), PortError>;

    /// Insert or replace several records.
    fn persist_all(&self, metadata: Vec<FormMetadata>) -> Result<(), PortError> {
        metadata.into_iter().try_for_each(|m| self.persist(m))
    }
}

impl<P: FormMetadataPort + ?Sized> FormMetadataPort for Arc<P> {
    fn fetch(&self, key: &FormKey) -> Result<Option<FormMetadata>, PortError> {
        (**self).fetch(key)
    }

    fn fetch_all(&self) -> Result<Vec<FormMetadata>, PortError> {
        (**self).fetch_all()
    }

    fn persist(&self, metadata: FormMetadata) -> Result<(), PortError> {
        (**self).persist(metadata)
    }

    fn persist_all(&self, metadata: Vec<FormMetadata>) -> Result<(), PortError> {
        (**self).persist_all(metadata)
    }
}

/// In-memory metadata store.
///
/// Clones share the same records. Not persistent - all data is lost when
/// the last handle is dropped.
#[derive(Debug, Default, Clone)]
pub struct MemoryPort {
    inner: Arc<Mutex<MemoryPortInner>>,
}

#[derive(Debug, Default)]
struct MemoryPortInner {
    records: HashMap<FormKey, FormMetadata>,
    fail_next_fetch: Option<String>,
    fail_next_persist: Option<String>,
}

impl MemoryPort {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding the given records.
    pub fn with_records(records: impl IntoIterator<Item = FormMetadata>) -> Self {
        let port = Self::new();
        port.lock()
            .records
            .extend(records.into_iter().map(|m| (m.key().clone(), m)));
        port
    }

    /// Number of records currently stored.
    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.lock().records.is_empty()
    }

    /// Remove all records.
    pub fn clear(&self) {
        self.lock().records.clear();
    }

    /// Cause the next `fetch` or `fetch_all` to fail with the given reason.
    pub fn fail_next_fetch(&self, reason: &str) {
        self.lock().fail_next_fetch = Some(reason.to_string());
    }

    /// Cause the next `persist` or `persist_all` to fail with the given reason.
    pub fn fail_next_persist(&self, reason: &str) {
        self.lock().fail_next_persist = Some(reason.to_string());
    }

    // Every critical section leaves the map consistent, so a poisoned
    // lock still guards valid data.
    fn lock(&self) -> MutexGuard<'_, MemoryPortInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl FormMetadataPort for MemoryPort {
    fn fetch(&self, key: &FormKey) -> Result<Option<FormMetadata>, PortError> {
        let mut inner = self.lock();
        if let Some(reason) = inner.fail_next_fetch.take() {
            return Err(PortError::Unavailable(reason));
        }
        Ok(inner.records.get(key).cloned())
    }

    fn fetch_all(&self) -> Result<Vec<FormMetadata>, PortError> {
        let mut inner = self.lock();
        if let Some(reason) = inner.fail_next_fetch.take() {
            return Err(PortError::Unavailable(reason));
        }
        Ok(inner.records.values().cloned().collect())
    }

    fn persist(&self, metadata: FormMetadata) -> Result<(), PortError> {
        self.persist_all(vec![metadata])
    }

    fn persist_all(&self, metadata: Vec<FormMetadata>) -> Result<(), PortError> {
        let mut inner = self.lock();
        if let Some(reason) = inner.fail_next_persist.take() {
            return Err(PortError::Unavailable(reason));
        }
        for m in metadata {
            inner.records.insert(m.key().clone(), m);
        }
        Ok(())
    }
}
