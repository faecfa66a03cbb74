use serde::{Deserialize, Serialize};

use crate::model::{LedgerError, TestResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TopicProgress {
    pub completed: bool,
}

/// Mutable progress state for one chapter.
///
/// Only `Batch` mutates it, so the topic list always matches the chapter's
/// topic count and `completed` always equals the AND over all topics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterProgress {
    topic_progress: Vec<TopicProgress>,
    completed: bool,
    test_attempted: bool,
    test_score: Option<u8>,
    test_result: Option<TestResult>,
    assignment_completed: Option<bool>,
    parent_chapter_index: Option<usize>,
}

impl ChapterProgress {
    /// Fresh, all-incomplete progress for a curriculum chapter.
    #[must_use]
    pub(crate) fn fresh(topic_count: usize, has_assignment: bool) -> Self {
        Self {
            topic_progress: vec![TopicProgress::default(); topic_count],
            completed: false,
            test_attempted: false,
            test_score: None,
            test_result: None,
            assignment_completed: has_assignment.then_some(false),
            parent_chapter_index: None,
        }
    }

    /// Fresh progress for a remediation chapter pointing back at `parent`.
    #[must_use]
    pub(crate) fn adaptive(topic_count: usize, parent: usize) -> Self {
        Self {
            parent_chapter_index: Some(parent),
            ..Self::fresh(topic_count, false)
        }
    }

    /// Rehydrate progress from persisted storage.
    ///
    /// `completed` is recomputed from the topic list rather than trusted.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::InvalidScore` if the score exceeds 100, disagrees with
    /// the stored result, or is present without an attempt.
    pub fn from_persisted(
        topic_progress: Vec<TopicProgress>,
        test_attempted: bool,
        test_score: Option<u8>,
        test_result: Option<TestResult>,
        assignment_completed: Option<bool>,
        parent_chapter_index: Option<usize>,
    ) -> Result<Self, LedgerError> {
        if let Some(score) = test_score {
            if score > 100 || !test_attempted {
                return Err(LedgerError::InvalidScore { score });
            }
        }
        if let Some(result) = &test_result {
            if !result.is_consistent() || test_score != Some(result.score()) {
                return Err(LedgerError::InvalidScore {
                    score: result.score(),
                });
            }
        }

        let mut progress = Self {
            topic_progress,
            completed: false,
            test_attempted,
            test_score,
            test_result,
            assignment_completed,
            parent_chapter_index,
        };
        progress.completed = progress.all_topics_done();
        Ok(progress)
    }

    fn all_topics_done(&self) -> bool {
        !self.topic_progress.is_empty() && self.topic_progress.iter().all(|t| t.completed)
    }

    /// Marks one topic done. Returns `false` when it already was.
    pub(crate) fn complete_topic(&mut self, topic_index: usize) -> Result<bool, LedgerError> {
        let topics = self.topic_progress.len();
        let entry = self
            .topic_progress
            .get_mut(topic_index)
            .ok_or(LedgerError::TopicOutOfRange {
                index: topic_index,
                len: topics,
            })?;
        if entry.completed {
            return Ok(false);
        }
        entry.completed = true;
        // Never flips back: topics only ever move to completed.
        self.completed = self.completed || self.all_topics_done();
        Ok(true)
    }

    pub(crate) fn record_test(&mut self, result: TestResult) {
        self.test_attempted = true;
        self.test_score = Some(result.score());
        self.test_result = Some(result);
    }

    pub(crate) fn complete_assignment(&mut self) -> bool {
        match self.assignment_completed {
            Some(false) => {
                self.assignment_completed = Some(true);
                true
            }
            _ => false,
        }
    }

    #[must_use]
    pub fn topic_progress(&self) -> &[TopicProgress] {
        &self.topic_progress
    }

    #[must_use]
    pub fn completed_topics(&self) -> usize {
        self.topic_progress.iter().filter(|t| t.completed).count()
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    #[must_use]
    pub fn test_attempted(&self) -> bool {
        self.test_attempted
    }

    #[must_use]
    pub fn test_score(&self) -> Option<u8> {
        self.test_score
    }

    #[must_use]
    pub fn test_result(&self) -> Option<&TestResult> {
        self.test_result.as_ref()
    }

    /// `None` means the chapter has no assignment.
    #[must_use]
    pub fn assignment_completed(&self) -> Option<bool> {
        self.assignment_completed
    }

    #[must_use]
    pub fn is_adaptive(&self) -> bool {
        self.parent_chapter_index.is_some()
    }

    /// Index of the chapter this remediation chapter was generated for.
    #[must_use]
    pub fn parent_chapter_index(&self) -> Option<usize> {
        self.parent_chapter_index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_progress_tracks_assignment_applicability() {
        assert_eq!(ChapterProgress::fresh(2, true).assignment_completed(), Some(false));
        assert_eq!(ChapterProgress::fresh(2, false).assignment_completed(), None);
    }

    #[test]
    fn completing_all_topics_completes_chapter() {
        let mut progress = ChapterProgress::fresh(2, false);
        assert!(progress.complete_topic(0).unwrap());
        assert!(!progress.is_completed());
        assert!(progress.complete_topic(1).unwrap());
        assert!(progress.is_completed());
        assert!(!progress.complete_topic(1).unwrap());
    }

    #[test]
    fn complete_topic_rejects_bad_index() {
        let mut progress = ChapterProgress::fresh(1, false);
        let err = progress.complete_topic(4).unwrap_err();
        assert_eq!(err, LedgerError::TopicOutOfRange { index: 4, len: 1 });
    }

    #[test]
    fn from_persisted_recomputes_completion() {
        let progress = ChapterProgress::from_persisted(
            vec![TopicProgress { completed: true }; 3],
            false,
            None,
            None,
            None,
            Some(0),
        )
        .unwrap();
        assert!(progress.is_completed());
        assert!(progress.is_adaptive());
    }

    #[test]
    fn from_persisted_rejects_score_without_attempt() {
        let err = ChapterProgress::from_persisted(vec![], false, Some(40), None, None, None)
            .unwrap_err();
        assert_eq!(err, LedgerError::InvalidScore { score: 40 });
    }
}
