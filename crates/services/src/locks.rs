use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use curriculum_core::model::BatchId;
use tokio::sync::OwnedMutexGuard;

/// Per-batch async locks serializing read-modify-write cycles in this process.
///
/// Different batches never contend. Cross-process writers are still caught by
/// the repository's version check.
#[derive(Clone, Default)]
pub struct BatchLocks {
    inner: Arc<Mutex<HashMap<BatchId, Arc<tokio::sync::Mutex<()>>>>>,
}

impl BatchLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `batch_id`. Released when the guard drops.
    pub async fn lock(&self, batch_id: BatchId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(map.entry(batch_id).or_default())
        };
        lock.lock_owned().await
    }
}
