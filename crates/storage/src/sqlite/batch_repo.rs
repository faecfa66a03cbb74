use chrono::Utc;
use curriculum_core::model::{Batch, BatchId};

use super::SqliteRepository;
use super::mapping::{batch_id_to_i64, conn, map_batch_row, version_to_i64};
use crate::document::BatchRecord;
use crate::repository::{BatchRepository, StorageError};

#[async_trait::async_trait]
impl BatchRepository for SqliteRepository {
    async fn insert_batch(&self, batch: &Batch) -> Result<(), StorageError> {
        let document = BatchRecord::from_batch(batch).to_json()?;
        let res = sqlx::query(
            r"
            INSERT INTO batches (id, title, created_at, updated_at, version, progress_percent, document)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(id) DO NOTHING
            ",
        )
        .bind(batch_id_to_i64(batch.id())?)
        .bind(batch.title())
        .bind(batch.created_at())
        .bind(Utc::now())
        .bind(version_to_i64(batch.version())?)
        .bind(i64::from(batch.progress_percent()))
        .bind(document)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::Conflict);
        }
        tracing::debug!(batch_id = %batch.id(), "inserted batch");
        Ok(())
    }

    async fn get_batch(&self, id: BatchId) -> Result<Option<Batch>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, version, document
            FROM batches WHERE id = ?1
            ",
        )
        .bind(batch_id_to_i64(id)?)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_batch_row).transpose()
    }

    async fn update_batch(&self, batch: &Batch) -> Result<u64, StorageError> {
        let next_version = batch.version() + 1;
        let mut record = BatchRecord::from_batch(batch);
        record.version = next_version;
        let document = record.to_json()?;

        let res = sqlx::query(
            r"
            UPDATE batches
            SET title = ?1, updated_at = ?2, version = ?3, progress_percent = ?4, document = ?5
            WHERE id = ?6 AND version = ?7
            ",
        )
        .bind(batch.title())
        .bind(Utc::now())
        .bind(version_to_i64(next_version)?)
        .bind(i64::from(batch.progress_percent()))
        .bind(document)
        .bind(batch_id_to_i64(batch.id())?)
        .bind(version_to_i64(batch.version())?)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        if res.rows_affected() == 1 {
            return Ok(next_version);
        }

        let exists = sqlx::query("SELECT 1 FROM batches WHERE id = ?1")
            .bind(batch_id_to_i64(batch.id())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;
        if exists.is_none() {
            return Err(StorageError::NotFound);
        }
        tracing::warn!(
            batch_id = %batch.id(),
            attempted = batch.version(),
            "rejecting stale batch write"
        );
        Err(StorageError::Conflict)
    }

    async fn list_batches(&self, limit: u32) -> Result<Vec<Batch>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, version, document
            FROM batches
            ORDER BY id ASC
            LIMIT ?1
            ",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_batch_row).collect()
    }
}
