//! Shared error types for the services crate.

use std::time::Duration;

use thiserror::Error;

use curriculum_core::model::{BatchId, GradeError, LedgerError};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors from the external content producer. Always retryable, never applied
/// to the ledger.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ContentGenerationError {
    #[error("content generation is not configured")]
    Disabled,
    #[error("content generation timed out after {0:?}")]
    Timeout(Duration),
    #[error("content generation request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("content generation returned an empty response")]
    EmptyResponse,
    #[error("generated content is malformed: {0}")]
    Malformed(String),
}

/// Errors emitted by `ProgressService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("batch {0} not found")]
    BatchNotFound(BatchId),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `RemediationService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RemediationError {
    #[error("batch {0} not found")]
    BatchNotFound(BatchId),
    #[error(transparent)]
    Content(#[from] ContentGenerationError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `AssessmentService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AssessmentError {
    #[error("batch {0} not found")]
    BatchNotFound(BatchId),
    #[error("chapter {index} is locked")]
    ChapterLocked { index: usize },
    #[error(transparent)]
    Grade(#[from] GradeError),
    #[error(transparent)]
    Content(#[from] ContentGenerationError),
    #[error(transparent)]
    Remediation(#[from] RemediationError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `GateService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GateError {
    #[error("batch {0} not found")]
    BatchNotFound(BatchId),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping engine services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EngineServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("content generator: {0}")]
    Content(#[from] ContentGenerationError),
}
