use curriculum_core::gate::{
    ChapterState, chapter_passed, chapter_state, is_chapter_unlocked,
    is_eligible_for_certificate,
};
use curriculum_core::model::{Batch, BatchId, ChapterId, LedgerError};

/// Presentation-agnostic snapshot of one chapter.
///
/// No pre-formatted strings; callers render `state` themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterOverview {
    pub index: usize,
    pub id: ChapterId,
    pub title: String,
    pub is_test_gate: bool,
    pub is_adaptive: bool,
    pub parent_chapter_index: Option<usize>,
    pub unlocked: bool,
    pub state: ChapterState,
    pub completed_topics: usize,
    pub total_topics: usize,
    pub test_score: Option<u8>,
    pub assignment_completed: Option<bool>,
    /// Topics, test and assignment are all done, so the chapter counts
    /// toward the certificate. Always false for remediation chapters.
    pub counts_toward_certificate: bool,
}

/// Snapshot of a whole batch: per-chapter state plus aggregates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOverview {
    pub batch_id: BatchId,
    pub title: String,
    pub progress_percent: u8,
    pub completed_chapters: usize,
    pub total_chapters: usize,
    pub certificate_eligible: bool,
    pub chapters: Vec<ChapterOverview>,
}

impl BatchOverview {
    /// # Errors
    ///
    /// Only fails if the batch is internally inconsistent, which a validated
    /// `Batch` never is.
    pub fn from_batch(batch: &Batch) -> Result<Self, LedgerError> {
        let chapters = batch
            .entries()
            .iter()
            .enumerate()
            .map(|(index, entry)| {
                let progress = entry.progress();
                Ok(ChapterOverview {
                    index,
                    id: entry.id(),
                    title: entry.chapter().title().to_owned(),
                    is_test_gate: entry.chapter().is_test_gate(),
                    is_adaptive: progress.is_adaptive(),
                    parent_chapter_index: progress.parent_chapter_index(),
                    unlocked: is_chapter_unlocked(batch, index)?,
                    state: chapter_state(batch, index)?,
                    completed_topics: progress.completed_topics(),
                    total_topics: progress.topic_progress().len(),
                    test_score: progress.test_score(),
                    assignment_completed: progress.assignment_completed(),
                    counts_toward_certificate: !progress.is_adaptive()
                        && chapter_passed(progress),
                })
            })
            .collect::<Result<Vec<_>, LedgerError>>()?;

        Ok(Self {
            batch_id: batch.id(),
            title: batch.title().to_owned(),
            progress_percent: batch.progress_percent(),
            completed_chapters: batch.completed_chapter_count(),
            total_chapters: batch.total_chapter_count(),
            certificate_eligible: is_eligible_for_certificate(batch),
            chapters,
        })
    }
}
