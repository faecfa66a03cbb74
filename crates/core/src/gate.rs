//! Unlock gating and certificate eligibility. Pure reads over a `Batch`.

use crate::model::{Batch, ChapterProgress, LedgerError};
use crate::remediation::{evaluate, is_passing};

/// Whether the learner may open chapter `chapter_index`.
///
/// Chapter 0 is always open. Any later chapter is locked only while the
/// previous chapter is a test gate whose test has not been attempted.
///
/// # Errors
///
/// Returns `LedgerError::ChapterOutOfRange`.
pub fn is_chapter_unlocked(batch: &Batch, chapter_index: usize) -> Result<bool, LedgerError> {
    batch.entry(chapter_index)?;
    let Some(previous) = chapter_index.checked_sub(1) else {
        return Ok(true);
    };
    let previous = batch.entry(previous)?;
    Ok(!(previous.chapter().is_test_gate() && !previous.progress().test_attempted()))
}

/// Whether a single curriculum chapter counts toward a certificate.
#[must_use]
pub fn chapter_passed(progress: &ChapterProgress) -> bool {
    progress.is_completed()
        && progress.test_attempted()
        && progress.test_score().is_some_and(is_passing)
        && progress.assignment_completed().unwrap_or(true)
}

/// True iff every non-remediation chapter is completed, tested with a passing
/// score, and has its assignment (if any) done.
#[must_use]
pub fn is_eligible_for_certificate(batch: &Batch) -> bool {
    batch
        .completion_status()
        .filter(|p| !p.is_adaptive())
        .all(chapter_passed)
}

/// Observable state of one chapter, from the learner's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChapterState {
    Locked,
    NotStarted,
    InProgress,
    AllTopicsComplete,
    /// Tested below the passing score, with no remediation to offer.
    TestTaken(u8),
    /// Tested at or above the passing score. Open topics or an open
    /// assignment still keep the chapter from counting toward a certificate.
    PassedGate(u8),
    RemediationTriggered(u8),
}

impl ChapterState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Locked => "locked",
            Self::NotStarted => "not started",
            Self::InProgress => "in progress",
            Self::AllTopicsComplete => "all topics complete",
            Self::TestTaken(_) => "test taken",
            Self::PassedGate(_) => "passed",
            Self::RemediationTriggered(_) => "remediation triggered",
        }
    }
}

/// Derive the state of one chapter.
///
/// # Errors
///
/// Returns `LedgerError::ChapterOutOfRange`.
pub fn chapter_state(batch: &Batch, chapter_index: usize) -> Result<ChapterState, LedgerError> {
    if !is_chapter_unlocked(batch, chapter_index)? {
        return Ok(ChapterState::Locked);
    }
    let progress = batch.entry(chapter_index)?.progress();

    if let Some(result) = progress.test_result() {
        let score = result.score();
        if is_passing(score) {
            return Ok(ChapterState::PassedGate(score));
        }
        if !progress.is_adaptive() && evaluate(result).is_required() {
            return Ok(ChapterState::RemediationTriggered(score));
        }
        return Ok(ChapterState::TestTaken(score));
    }

    Ok(match progress.completed_topics() {
        0 => ChapterState::NotStarted,
        _ if progress.is_completed() => ChapterState::AllTopicsComplete,
        _ => ChapterState::InProgress,
    })
}
