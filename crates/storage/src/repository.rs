use async_trait::async_trait;
use curriculum_core::model::{Batch, BatchId};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::document::BatchRecord;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    /// The batch already exists (insert) or was written by someone else since
    /// it was loaded (update).
    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Repository contract for batch documents.
///
/// Writes are whole-document and versioned: `update_batch` only succeeds when
/// the stored version equals `batch.version()`.
#[async_trait]
pub trait BatchRepository: Send + Sync {
    /// Store a new batch.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if a batch with the same id exists.
    async fn insert_batch(&self, batch: &Batch) -> Result<(), StorageError>;

    /// Fetch a batch by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the document cannot be read or decoded.
    async fn get_batch(&self, id: BatchId) -> Result<Option<Batch>, StorageError>;

    /// Replace a batch, bumping its version. Returns the new version.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing and `StorageError::Conflict`
    /// if the stored version moved on.
    async fn update_batch(&self, batch: &Batch) -> Result<u64, StorageError>;

    /// List batches ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the documents cannot be read or decoded.
    async fn list_batches(&self, limit: u32) -> Result<Vec<Batch>, StorageError>;
}

/// In-memory repository for tests and prototyping.
///
/// Holds encoded documents rather than live `Batch` values so it goes through
/// the same validation on load as the SQLite backend.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    batches: Arc<Mutex<BTreeMap<BatchId, String>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn decode(raw: &str) -> Result<Batch, StorageError> {
        BatchRecord::from_json(raw)?.into_batch()
    }
}

#[async_trait]
impl BatchRepository for InMemoryRepository {
    async fn insert_batch(&self, batch: &Batch) -> Result<(), StorageError> {
        let raw = BatchRecord::from_batch(batch).to_json()?;
        let mut guard = self
            .batches
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        if guard.contains_key(&batch.id()) {
            return Err(StorageError::Conflict);
        }
        guard.insert(batch.id(), raw);
        Ok(())
    }

    async fn get_batch(&self, id: BatchId) -> Result<Option<Batch>, StorageError> {
        let guard = self
            .batches
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.get(&id).map(|raw| Self::decode(raw)).transpose()
    }

    async fn update_batch(&self, batch: &Batch) -> Result<u64, StorageError> {
        let mut guard = self
            .batches
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let stored = guard.get(&batch.id()).ok_or(StorageError::NotFound)?;
        let stored_version = BatchRecord::from_json(stored)?.version;
        if stored_version != batch.version() {
            tracing::debug!(
                batch_id = %batch.id(),
                stored_version,
                attempted = batch.version(),
                "rejecting stale batch write"
            );
            return Err(StorageError::Conflict);
        }

        let mut record = BatchRecord::from_batch(batch);
        record.version = stored_version + 1;
        guard.insert(batch.id(), record.to_json()?);
        Ok(record.version)
    }

    async fn list_batches(&self, limit: u32) -> Result<Vec<Batch>, StorageError> {
        let guard = self
            .batches
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard
            .values()
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .map(|raw| Self::decode(raw))
            .collect()
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub batches: Arc<dyn BatchRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            batches: Arc::new(InMemoryRepository::new()),
        }
    }
}
