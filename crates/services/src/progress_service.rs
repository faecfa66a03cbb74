use std::sync::Arc;

use curriculum_core::model::{Batch, BatchId, ChapterDraft};
use storage::repository::BatchRepository;

use crate::Clock;
use crate::error::ProgressError;
use crate::locks::BatchLocks;
use crate::store;

/// Serialized ledger mutations: topic and assignment completion.
#[derive(Clone)]
pub struct ProgressService {
    clock: Clock,
    batches: Arc<dyn BatchRepository>,
    locks: BatchLocks,
}

impl ProgressService {
    #[must_use]
    pub fn new(clock: Clock, batches: Arc<dyn BatchRepository>, locks: BatchLocks) -> Self {
        Self {
            clock,
            batches,
            locks,
        }
    }

    /// Create and persist a batch with all progress zeroed.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Ledger` for invalid chapter drafts and
    /// `ProgressError::Storage` if persistence fails (including `Conflict` when
    /// the id is taken).
    pub async fn create_batch(
        &self,
        batch_id: BatchId,
        title: impl Into<String>,
        chapters: Vec<ChapterDraft>,
    ) -> Result<Batch, ProgressError> {
        let batch = Batch::new(batch_id, title, chapters, self.clock.now())?;
        self.batches.insert_batch(&batch).await?;
        tracing::info!(
            batch_id = %batch_id,
            chapters = batch.total_chapter_count(),
            "created batch"
        );
        Ok(batch)
    }

    /// Fetch a batch.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::BatchNotFound` or `ProgressError::Storage`.
    pub async fn get_batch(&self, batch_id: BatchId) -> Result<Batch, ProgressError> {
        self.batches
            .get_batch(batch_id)
            .await?
            .ok_or(ProgressError::BatchNotFound(batch_id))
    }

    /// Mark a topic completed and persist the recomputed aggregates.
    ///
    /// Marking an already-completed topic returns the batch unchanged without
    /// writing.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Ledger` for out-of-range indices,
    /// `ProgressError::BatchNotFound`, or `ProgressError::Storage`.
    pub async fn mark_topic_completed(
        &self,
        batch_id: BatchId,
        chapter_index: usize,
        topic_index: usize,
    ) -> Result<Batch, ProgressError> {
        let _guard = self.locks.lock(batch_id).await;
        let mut batch = self.get_batch(batch_id).await?;

        if !batch.mark_topic_completed(chapter_index, topic_index)? {
            tracing::debug!(
                batch_id = %batch_id,
                chapter_index,
                topic_index,
                "topic already completed"
            );
            return Ok(batch);
        }
        store::save(self.batches.as_ref(), &mut batch).await?;
        tracing::debug!(
            batch_id = %batch_id,
            chapter_index,
            topic_index,
            progress_percent = batch.progress_percent(),
            "topic completed"
        );
        Ok(batch)
    }

    /// Mark a chapter's assignment as completed.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Ledger` for out-of-range indices or chapters
    /// without an assignment, `ProgressError::BatchNotFound`, or
    /// `ProgressError::Storage`.
    pub async fn mark_assignment_completed(
        &self,
        batch_id: BatchId,
        chapter_index: usize,
    ) -> Result<Batch, ProgressError> {
        let _guard = self.locks.lock(batch_id).await;
        let mut batch = self.get_batch(batch_id).await?;

        if batch.mark_assignment_completed(chapter_index)? {
            store::save(self.batches.as_ref(), &mut batch).await?;
            tracing::debug!(batch_id = %batch_id, chapter_index, "assignment completed");
        }
        Ok(batch)
    }
}
