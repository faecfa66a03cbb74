use curriculum_core::model::Batch;
use storage::repository::{BatchRepository, StorageError};

/// Write a mutated batch back and adopt the version storage assigned.
pub(crate) async fn save(
    batches: &dyn BatchRepository,
    batch: &mut Batch,
) -> Result<(), StorageError> {
    let version = batches.update_batch(batch).await?;
    batch.set_version(version);
    Ok(())
}
