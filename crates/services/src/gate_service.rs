use std::sync::Arc;

use curriculum_core::gate;
use curriculum_core::model::{Batch, BatchId};
use storage::repository::BatchRepository;

use crate::batch_view::BatchOverview;
use crate::error::GateError;

/// Read-only unlock and certificate queries over stored batches.
#[derive(Clone)]
pub struct GateService {
    batches: Arc<dyn BatchRepository>,
}

impl GateService {
    #[must_use]
    pub fn new(batches: Arc<dyn BatchRepository>) -> Self {
        Self { batches }
    }

    async fn load(&self, batch_id: BatchId) -> Result<Batch, GateError> {
        self.batches
            .get_batch(batch_id)
            .await?
            .ok_or(GateError::BatchNotFound(batch_id))
    }

    /// # Errors
    ///
    /// Returns `GateError::Ledger` for a bad index, `GateError::BatchNotFound`,
    /// or `GateError::Storage`.
    pub async fn is_chapter_unlocked(
        &self,
        batch_id: BatchId,
        chapter_index: usize,
    ) -> Result<bool, GateError> {
        let batch = self.load(batch_id).await?;
        Ok(gate::is_chapter_unlocked(&batch, chapter_index)?)
    }

    /// # Errors
    ///
    /// Returns `GateError::BatchNotFound` or `GateError::Storage`.
    pub async fn is_eligible_for_certificate(&self, batch_id: BatchId) -> Result<bool, GateError> {
        let batch = self.load(batch_id).await?;
        Ok(gate::is_eligible_for_certificate(&batch))
    }

    /// # Errors
    ///
    /// Returns `GateError::BatchNotFound` or `GateError::Storage`.
    pub async fn overview(&self, batch_id: BatchId) -> Result<BatchOverview, GateError> {
        let batch = self.load(batch_id).await?;
        Ok(BatchOverview::from_batch(&batch)?)
    }
}
