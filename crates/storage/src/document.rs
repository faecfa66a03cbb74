//! Persisted batch document.
//!
//! Storage keeps the learner-facing shape: `chapters` and `completionStatus` as
//! two index-aligned arrays in camelCase JSON. The domain `Batch` pairs them,
//! so alignment is checked once here when a document is loaded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use curriculum_core::model::{
    Batch, BatchId, ChapterDraft, ChapterId, ChapterProgress, TestResult, TopicDraft,
    TopicProgress,
};

use crate::repository::StorageError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicRecord {
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub resources: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterRecord {
    pub id: ChapterId,
    pub title: String,
    pub topics: Vec<TopicRecord>,
    #[serde(default)]
    pub is_test_gate: bool,
    #[serde(default)]
    pub has_assignment: bool,
    #[serde(default)]
    pub is_adaptive: bool,
    #[serde(default)]
    pub parent_chapter_index: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterProgressRecord {
    pub topic_progress: Vec<TopicProgress>,
    pub completed: bool,
    #[serde(default)]
    pub test_attempted: bool,
    #[serde(default)]
    pub test_score: Option<u8>,
    #[serde(default)]
    pub test_result: Option<TestResult>,
    #[serde(default)]
    pub assignment_completed: Option<bool>,
    #[serde(default)]
    pub is_adaptive: bool,
    #[serde(default)]
    pub parent_chapter_index: Option<usize>,
}

/// Full batch document. Derived counters are written for readers of the raw
/// document but recomputed on load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRecord {
    pub id: BatchId,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub version: u64,
    pub chapters: Vec<ChapterRecord>,
    pub completion_status: Vec<ChapterProgressRecord>,
    pub progress_percent: u8,
    pub completed_chapter_count: usize,
    pub total_chapter_count: usize,
}

impl BatchRecord {
    #[must_use]
    pub fn from_batch(batch: &Batch) -> Self {
        let mut chapters = Vec::with_capacity(batch.total_chapter_count());
        let mut completion_status = Vec::with_capacity(batch.total_chapter_count());

        for entry in batch.entries() {
            let chapter = entry.chapter();
            let progress = entry.progress();
            chapters.push(ChapterRecord {
                id: entry.id(),
                title: chapter.title().to_owned(),
                topics: chapter
                    .topics()
                    .iter()
                    .map(|t| TopicRecord {
                        title: t.title().to_owned(),
                        content: t.content().to_owned(),
                        resources: t.resources().iter().map(ToString::to_string).collect(),
                    })
                    .collect(),
                is_test_gate: chapter.is_test_gate(),
                has_assignment: chapter.has_assignment(),
                is_adaptive: progress.is_adaptive(),
                parent_chapter_index: progress.parent_chapter_index(),
            });
            completion_status.push(ChapterProgressRecord {
                topic_progress: progress.topic_progress().to_vec(),
                completed: progress.is_completed(),
                test_attempted: progress.test_attempted(),
                test_score: progress.test_score(),
                test_result: progress.test_result().cloned(),
                assignment_completed: progress.assignment_completed(),
                is_adaptive: progress.is_adaptive(),
                parent_chapter_index: progress.parent_chapter_index(),
            });
        }

        Self {
            id: batch.id(),
            title: batch.title().to_owned(),
            created_at: batch.created_at(),
            version: batch.version(),
            chapters,
            completion_status,
            progress_percent: batch.progress_percent(),
            completed_chapter_count: batch.completed_chapter_count(),
            total_chapter_count: batch.total_chapter_count(),
        }
    }

    /// Convert the document back into a domain `Batch`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if the two arrays are misaligned, the
    /// adaptive markers disagree, or any chapter/progress entry fails validation.
    pub fn into_batch(self) -> Result<Batch, StorageError> {
        if self.chapters.len() != self.completion_status.len() {
            return Err(StorageError::Serialization(format!(
                "batch {}: {} chapters but {} progress entries",
                self.id,
                self.chapters.len(),
                self.completion_status.len()
            )));
        }

        let mut parts = Vec::with_capacity(self.chapters.len());
        for (index, (chapter, progress)) in self
            .chapters
            .into_iter()
            .zip(self.completion_status)
            .enumerate()
        {
            if chapter.is_adaptive != progress.is_adaptive
                || chapter.parent_chapter_index != progress.parent_chapter_index
                || progress.is_adaptive != progress.parent_chapter_index.is_some()
            {
                return Err(StorageError::Serialization(format!(
                    "batch {}: chapter {index} has inconsistent remediation markers",
                    self.id
                )));
            }

            let draft = ChapterDraft {
                title: chapter.title,
                topics: chapter
                    .topics
                    .into_iter()
                    .map(|t| TopicDraft {
                        title: t.title,
                        content: t.content,
                        resources: t.resources,
                    })
                    .collect(),
                is_test_gate: chapter.is_test_gate,
                has_assignment: chapter.has_assignment,
            };
            let chapter = draft
                .validate()
                .map_err(|e| StorageError::Serialization(format!("chapter {index}: {e}")))?;
            let progress = ChapterProgress::from_persisted(
                progress.topic_progress,
                progress.test_attempted,
                progress.test_score,
                progress.test_result,
                progress.assignment_completed,
                progress.parent_chapter_index,
            )
            .map_err(|e| StorageError::Serialization(format!("progress {index}: {e}")))?;
            parts.push((chapter, progress));
        }

        Batch::from_parts(self.id, self.title, self.created_at, self.version, parts)
            .map_err(|e| StorageError::Serialization(e.to_string()))
    }

    /// Encode as the JSON document stored by document-oriented backends.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if encoding fails.
    pub fn to_json(&self) -> Result<String, StorageError> {
        serde_json::to_string(self).map_err(|e| StorageError::Serialization(e.to_string()))
    }

    /// Decode a stored JSON document.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` for malformed JSON.
    pub fn from_json(raw: &str) -> Result<Self, StorageError> {
        serde_json::from_str(raw).map_err(|e| StorageError::Serialization(e.to_string()))
    }
}
