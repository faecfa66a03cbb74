use curriculum_core::model::{Batch, BatchId};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::document::BatchRecord;
use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

pub(crate) fn batch_id_to_i64(id: BatchId) -> Result<i64, StorageError> {
    i64::try_from(id.value()).map_err(|_| StorageError::Serialization("batch_id overflow".into()))
}

pub(crate) fn version_to_i64(version: u64) -> Result<i64, StorageError> {
    i64::try_from(version).map_err(|_| StorageError::Serialization("version overflow".into()))
}

pub(crate) fn version_from_i64(v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid version: {v}")))
}

/// Decode a `batches` row. The `version` column wins over the copy inside the
/// document, since only the column is checked on update.
pub(crate) fn map_batch_row(row: &SqliteRow) -> Result<Batch, StorageError> {
    let raw: String = row.try_get("document").map_err(ser)?;
    let mut record = BatchRecord::from_json(&raw)?;

    let id: i64 = row.try_get("id").map_err(ser)?;
    if batch_id_to_i64(record.id)? != id {
        return Err(StorageError::Serialization(format!(
            "document id {} does not match row id {id}",
            record.id
        )));
    }
    record.version = version_from_i64(row.try_get("version").map_err(ser)?)?;
    record.into_batch()
}
