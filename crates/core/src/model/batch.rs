use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::{
    BatchId, Chapter, ChapterDraft, ChapterError, ChapterId, ChapterProgress, TestResult,
    assessment::percentage,
};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum LedgerError {
    #[error("batch title cannot be empty")]
    EmptyTitle,

    #[error("batch must contain at least one chapter")]
    NoChapters,

    #[error("chapter index {index} out of range (batch has {len} chapters)")]
    ChapterOutOfRange { index: usize, len: usize },

    #[error("topic index {index} out of range (chapter has {len} topics)")]
    TopicOutOfRange { index: usize, len: usize },

    #[error("chapter {parent} already has a remediation chapter")]
    DuplicateRemediation { parent: usize },

    #[error("remediation chapter cannot target remediation chapter {parent}")]
    NestedRemediation { parent: usize },

    #[error("chapter {index} has no assignment")]
    NoAssignment { index: usize },

    #[error("invalid test score: {score}")]
    InvalidScore { score: u8 },

    #[error("chapter {index} has {topics} topics but {progress} progress entries")]
    Misaligned {
        index: usize,
        topics: usize,
        progress: usize,
    },

    #[error("chapter {index}: {source}")]
    Chapter {
        index: usize,
        #[source]
        source: ChapterError,
    },
}

//
// ─── ENTRY ─────────────────────────────────────────────────────────────────────
//

/// A chapter paired with the learner's progress on it.
///
/// Keeping both halves in one entry means content and progress cannot drift
/// out of alignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterEntry {
    id: ChapterId,
    chapter: Chapter,
    progress: ChapterProgress,
}

impl ChapterEntry {
    #[must_use]
    pub fn id(&self) -> ChapterId {
        self.id
    }

    #[must_use]
    pub fn chapter(&self) -> &Chapter {
        &self.chapter
    }

    #[must_use]
    pub fn progress(&self) -> &ChapterProgress {
        &self.progress
    }
}

//
// ─── BATCH ─────────────────────────────────────────────────────────────────────
//

/// A learner's enrollment in a curriculum: ordered chapters plus progress.
///
/// Aggregates (`progress_percent`, `completed_chapter_count`) are recomputed
/// inside every mutating call, so a caller never observes them stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    id: BatchId,
    title: String,
    created_at: DateTime<Utc>,
    version: u64,
    entries: Vec<ChapterEntry>,
    progress_percent: u8,
    completed_chapter_count: usize,
}

impl Batch {
    /// Create a batch with all progress zeroed.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::EmptyTitle`, `LedgerError::NoChapters`, or
    /// `LedgerError::Chapter` when a draft fails validation.
    pub fn new(
        id: BatchId,
        title: impl Into<String>,
        chapters: Vec<ChapterDraft>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, LedgerError> {
        if chapters.is_empty() {
            return Err(LedgerError::NoChapters);
        }
        let mut parts = Vec::with_capacity(chapters.len());
        for (index, draft) in chapters.into_iter().enumerate() {
            let chapter = draft
                .validate()
                .map_err(|source| LedgerError::Chapter { index, source })?;
            let progress = ChapterProgress::fresh(chapter.topic_count(), chapter.has_assignment());
            parts.push((chapter, progress));
        }
        Self::from_parts(id, title, created_at, 0, parts)
    }

    /// Rehydrate a batch from persisted chapter/progress pairs.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Misaligned` if a progress entry does not cover exactly
    /// its chapter's topics, and `LedgerError::DuplicateRemediation` /
    /// `LedgerError::ChapterOutOfRange` / `LedgerError::NestedRemediation` for
    /// broken remediation back-references.
    pub fn from_parts(
        id: BatchId,
        title: impl Into<String>,
        created_at: DateTime<Utc>,
        version: u64,
        parts: Vec<(Chapter, ChapterProgress)>,
    ) -> Result<Self, LedgerError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(LedgerError::EmptyTitle);
        }
        if parts.is_empty() {
            return Err(LedgerError::NoChapters);
        }

        let mut batch = Self {
            id,
            title: title.trim().to_owned(),
            created_at,
            version,
            entries: Vec::with_capacity(parts.len()),
            progress_percent: 0,
            completed_chapter_count: 0,
        };

        for (index, (chapter, progress)) in parts.into_iter().enumerate() {
            if chapter.topic_count() != progress.topic_progress().len() {
                return Err(LedgerError::Misaligned {
                    index,
                    topics: chapter.topic_count(),
                    progress: progress.topic_progress().len(),
                });
            }
            if let Some(parent) = progress.parent_chapter_index() {
                batch.check_remediation_parent(parent)?;
            }
            batch.push_entry(chapter, progress);
        }

        batch.recompute();
        Ok(batch)
    }

    fn push_entry(&mut self, chapter: Chapter, progress: ChapterProgress) -> usize {
        let index = self.entries.len();
        let id = ChapterId::new(u64::try_from(index).unwrap_or(u64::MAX).saturating_add(1));
        self.entries.push(ChapterEntry {
            id,
            chapter,
            progress,
        });
        index
    }

    fn check_remediation_parent(&self, parent: usize) -> Result<(), LedgerError> {
        let target = self.entry(parent)?;
        if target.progress.is_adaptive() {
            return Err(LedgerError::NestedRemediation { parent });
        }
        if self.has_remediation_for(parent) {
            return Err(LedgerError::DuplicateRemediation { parent });
        }
        Ok(())
    }

    fn recompute(&mut self) {
        let (done, total) = self.entries.iter().fold((0_usize, 0_usize), |(d, t), e| {
            (
                d + e.progress.completed_topics(),
                t + e.progress.topic_progress().len(),
            )
        });
        self.progress_percent = percentage(
            u32::try_from(done).unwrap_or(u32::MAX),
            u32::try_from(total).unwrap_or(u32::MAX),
        );
        self.completed_chapter_count = self
            .entries
            .iter()
            .filter(|e| e.progress.is_completed())
            .count();
    }

    fn entry_mut(&mut self, index: usize) -> Result<&mut ChapterEntry, LedgerError> {
        let len = self.entries.len();
        self.entries
            .get_mut(index)
            .ok_or(LedgerError::ChapterOutOfRange { index, len })
    }

    //
    // ─── LEDGER OPERATIONS ─────────────────────────────────────────────────────
    //

    /// Mark a topic as completed and recompute chapter and batch aggregates.
    ///
    /// Idempotent: returns `Ok(false)` and leaves state untouched when the topic
    /// was already completed.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::ChapterOutOfRange` or `LedgerError::TopicOutOfRange`.
    pub fn mark_topic_completed(
        &mut self,
        chapter_index: usize,
        topic_index: usize,
    ) -> Result<bool, LedgerError> {
        let changed = self
            .entry_mut(chapter_index)?
            .progress
            .complete_topic(topic_index)?;
        if changed {
            self.recompute();
        }
        Ok(changed)
    }

    /// Append a remediation chapter targeting `parent_chapter_index`.
    ///
    /// Returns the index of the new chapter.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::DuplicateRemediation` if the parent already has one,
    /// `LedgerError::ChapterOutOfRange` for a bad parent index, and
    /// `LedgerError::NestedRemediation` when the parent is itself a remediation chapter.
    pub fn append_adaptive_chapter(
        &mut self,
        chapter: Chapter,
        parent_chapter_index: usize,
    ) -> Result<usize, LedgerError> {
        self.check_remediation_parent(parent_chapter_index)?;
        let progress = ChapterProgress::adaptive(chapter.topic_count(), parent_chapter_index);
        let index = self.push_entry(chapter, progress);
        self.recompute();
        Ok(index)
    }

    /// Store a graded attempt. A retake replaces the previous result.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::ChapterOutOfRange`.
    pub fn record_test_result(
        &mut self,
        chapter_index: usize,
        result: TestResult,
    ) -> Result<(), LedgerError> {
        self.entry_mut(chapter_index)?.progress.record_test(result);
        Ok(())
    }

    /// Mark the chapter's assignment as done. Returns `false` if it already was.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::ChapterOutOfRange`, or `LedgerError::NoAssignment`
    /// when the chapter has no assignment.
    pub fn mark_assignment_completed(&mut self, chapter_index: usize) -> Result<bool, LedgerError> {
        let entry = self.entry_mut(chapter_index)?;
        if entry.progress.assignment_completed().is_none() {
            return Err(LedgerError::NoAssignment {
                index: chapter_index,
            });
        }
        Ok(entry.progress.complete_assignment())
    }

    /// Record the storage version after a successful write.
    pub fn set_version(&mut self, version: u64) {
        self.version = version;
    }

    //
    // ─── QUERIES ───────────────────────────────────────────────────────────────
    //

    /// Whether a remediation chapter for `chapter_index` already exists.
    #[must_use]
    pub fn has_remediation_for(&self, chapter_index: usize) -> bool {
        self.entries
            .iter()
            .any(|e| e.progress.parent_chapter_index() == Some(chapter_index))
    }

    /// Index of the remediation chapter generated for `chapter_index`, if any.
    #[must_use]
    pub fn remediation_index_for(&self, chapter_index: usize) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.progress.parent_chapter_index() == Some(chapter_index))
    }

    /// Look up an entry by position.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::ChapterOutOfRange`.
    pub fn entry(&self, index: usize) -> Result<&ChapterEntry, LedgerError> {
        self.entries.get(index).ok_or(LedgerError::ChapterOutOfRange {
            index,
            len: self.entries.len(),
        })
    }

    /// Position of the chapter with the given id.
    #[must_use]
    pub fn index_of(&self, id: ChapterId) -> Option<usize> {
        self.entries.iter().position(|e| e.id == id)
    }

    #[must_use]
    pub fn entries(&self) -> &[ChapterEntry] {
        &self.entries
    }

    pub fn chapters(&self) -> impl Iterator<Item = &Chapter> {
        self.entries.iter().map(|e| &e.chapter)
    }

    pub fn completion_status(&self) -> impl Iterator<Item = &ChapterProgress> {
        self.entries.iter().map(|e| &e.progress)
    }

    #[must_use]
    pub fn id(&self) -> BatchId {
        self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Completed topics over all topics, as a rounded percentage.
    #[must_use]
    pub fn progress_percent(&self) -> u8 {
        self.progress_percent
    }

    #[must_use]
    pub fn completed_chapter_count(&self) -> usize {
        self.completed_chapter_count
    }

    #[must_use]
    pub fn total_chapter_count(&self) -> usize {
        self.entries.len()
    }
}
