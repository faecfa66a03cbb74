use std::sync::Arc;
use std::time::Duration;

use curriculum_core::model::{Batch, BatchId, Chapter, LedgerError};
use curriculum_core::remediation::{RemediationDecision, evaluate_chapter};
use storage::repository::{BatchRepository, StorageError};

use crate::content::ContentStore;
use crate::error::{ContentGenerationError, RemediationError};
use crate::locks::BatchLocks;
use crate::store;

const DEFAULT_GENERATION_TIMEOUT: Duration = Duration::from_secs(60);
/// Generation attempts when the test result changes underneath one.
const MAX_GENERATION_ROUNDS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemediationConfig {
    /// Upper bound on one content generation call.
    pub generation_timeout: Duration,
}

impl Default for RemediationConfig {
    fn default() -> Self {
        Self {
            generation_timeout: DEFAULT_GENERATION_TIMEOUT,
        }
    }
}

impl RemediationConfig {
    /// Read `CURRICULUM_REMEDIATION_TIMEOUT_SECS`, falling back to 60 seconds.
    #[must_use]
    pub fn from_env() -> Self {
        let generation_timeout = std::env::var("CURRICULUM_REMEDIATION_TIMEOUT_SECS")
            .ok()
            .and_then(|value| value.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map_or(DEFAULT_GENERATION_TIMEOUT, Duration::from_secs);
        Self { generation_timeout }
    }
}

/// What a remediation attempt did to the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemediationOutcome {
    /// The chapter's latest result does not call for remediation.
    NotNeeded,
    /// A remediation chapter already exists at `chapter_index`; nothing appended.
    AlreadyRemediated { chapter_index: usize },
    /// A new remediation chapter was appended at `chapter_index`.
    Appended {
        chapter_index: usize,
        concepts: Vec<String>,
    },
}

/// Decides on and inserts remediation chapters.
///
/// Content is generated before the batch lock is taken, and the batch is
/// re-read under the lock before appending, so a failed or slow generation
/// never leaves a partial write behind.
#[derive(Clone)]
pub struct RemediationService {
    batches: Arc<dyn BatchRepository>,
    locks: BatchLocks,
    content: ContentStore,
    config: RemediationConfig,
}

impl RemediationService {
    #[must_use]
    pub fn new(
        batches: Arc<dyn BatchRepository>,
        locks: BatchLocks,
        content: ContentStore,
        config: RemediationConfig,
    ) -> Self {
        Self {
            batches,
            locks,
            content,
            config,
        }
    }

    async fn load(&self, batch_id: BatchId) -> Result<Batch, RemediationError> {
        self.batches
            .get_batch(batch_id)
            .await?
            .ok_or(RemediationError::BatchNotFound(batch_id))
    }

    /// Evaluate the stored test result of a chapter.
    ///
    /// # Errors
    ///
    /// Returns `RemediationError::BatchNotFound`, `RemediationError::Ledger`
    /// for a bad index, or `RemediationError::Storage`.
    pub async fn evaluate(
        &self,
        batch_id: BatchId,
        chapter_index: usize,
    ) -> Result<RemediationDecision, RemediationError> {
        let batch = self.load(batch_id).await?;
        Ok(evaluate_chapter(&batch, chapter_index)?)
    }

    /// Ask the content store for a chapter targeting `concepts`, bounded by the
    /// configured timeout.
    ///
    /// # Errors
    ///
    /// Returns `ContentGenerationError::Timeout` on expiry, or whatever the
    /// content store reports for unusable output.
    pub async fn plan_remediation_content(
        &self,
        parent: &Chapter,
        concepts: &[String],
    ) -> Result<Chapter, ContentGenerationError> {
        let timeout = self.config.generation_timeout;
        tokio::time::timeout(timeout, self.content.generate_remediation(parent, concepts))
            .await
            .map_err(|_| ContentGenerationError::Timeout(timeout))?
    }

    /// Append a remediation chapter for `chapter_index` if its latest test
    /// result calls for one and none exists yet.
    ///
    /// Safe to call repeatedly; this is also the retry path after a
    /// `ContentGenerationError`. Content is regenerated when a retake changes
    /// the concepts to review while generation is in flight.
    ///
    /// # Errors
    ///
    /// Returns `RemediationError::Content` when generation fails (the batch is
    /// left untouched), `RemediationError::BatchNotFound`,
    /// `RemediationError::Ledger` for a bad index, or `RemediationError::Storage`
    /// (`StorageError::Conflict` if the result keeps changing).
    pub async fn remediate(
        &self,
        batch_id: BatchId,
        chapter_index: usize,
    ) -> Result<RemediationOutcome, RemediationError> {
        let batch = self.load(batch_id).await?;
        let mut concepts = match evaluate_chapter(&batch, chapter_index)? {
            RemediationDecision::NoActionNeeded => {
                return Ok(no_action(&batch, batch_id, chapter_index));
            }
            RemediationDecision::RemediationRequired(concepts) => concepts,
        };
        let parent = batch.entry(chapter_index)?.chapter().clone();

        for _ in 0..MAX_GENERATION_ROUNDS {
            let chapter = self
                .plan_remediation_content(&parent, &concepts)
                .await
                .inspect_err(|err| {
                    tracing::warn!(
                        batch_id = %batch_id,
                        chapter_index,
                        error = %err,
                        "remediation content generation failed"
                    );
                })?;

            let _guard = self.locks.lock(batch_id).await;
            let mut batch = self.load(batch_id).await?;
            let current = match evaluate_chapter(&batch, chapter_index)? {
                RemediationDecision::NoActionNeeded => {
                    return Ok(no_action(&batch, batch_id, chapter_index));
                }
                RemediationDecision::RemediationRequired(current) => current,
            };
            if current != concepts {
                // A retake landed while generating; the content targets stale gaps.
                tracing::debug!(
                    batch_id = %batch_id,
                    chapter_index,
                    generated_for = ?concepts,
                    current = ?current,
                    "test result changed during generation, regenerating"
                );
                concepts = current;
                continue;
            }

            let appended_at = match batch.append_adaptive_chapter(chapter, chapter_index) {
                Ok(index) => index,
                Err(LedgerError::DuplicateRemediation { .. }) => {
                    return Ok(no_action(&batch, batch_id, chapter_index));
                }
                Err(err) => return Err(err.into()),
            };
            store::save(self.batches.as_ref(), &mut batch).await?;

            tracing::info!(
                batch_id = %batch_id,
                parent_chapter_index = chapter_index,
                chapter_index = appended_at,
                concepts = ?concepts,
                "appended remediation chapter"
            );
            return Ok(RemediationOutcome::Appended {
                chapter_index: appended_at,
                concepts,
            });
        }

        tracing::warn!(
            batch_id = %batch_id,
            chapter_index,
            "test result kept changing during remediation generation"
        );
        Err(StorageError::Conflict.into())
    }
}

fn no_action(batch: &Batch, batch_id: BatchId, chapter_index: usize) -> RemediationOutcome {
    match batch.remediation_index_for(chapter_index) {
        Some(existing) => {
            tracing::debug!(
                batch_id = %batch_id,
                chapter_index,
                remediation_index = existing,
                "remediation already exists, skipping"
            );
            RemediationOutcome::AlreadyRemediated {
                chapter_index: existing,
            }
        }
        None => RemediationOutcome::NotNeeded,
    }
}
