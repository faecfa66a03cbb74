use crate::model::{Batch, LedgerError, TestResult};

/// Minimum score that counts as passing, for remediation and certificates alike.
pub const PASSING_SCORE: u8 = 70;

/// Outcome of evaluating a graded test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemediationDecision {
    NoActionNeeded,
    /// Concepts the remediation chapter should target, in sorted order.
    RemediationRequired(Vec<String>),
}

impl RemediationDecision {
    #[must_use]
    pub fn is_required(&self) -> bool {
        matches!(self, Self::RemediationRequired(_))
    }
}

#[must_use]
pub fn is_passing(score: u8) -> bool {
    score >= PASSING_SCORE
}

/// Remediation is required iff the score is below passing and there is at
/// least one concept to review.
#[must_use]
pub fn evaluate(result: &TestResult) -> RemediationDecision {
    if is_passing(result.score()) || result.concepts_to_review().is_empty() {
        return RemediationDecision::NoActionNeeded;
    }
    RemediationDecision::RemediationRequired(result.concepts_to_review().iter().cloned().collect())
}

/// Evaluate the stored test result of a chapter, honoring idempotency.
///
/// Returns `NoActionNeeded` when the chapter has no test result yet, is itself
/// a remediation chapter, or already has a remediation chapter.
///
/// # Errors
///
/// Returns `LedgerError::ChapterOutOfRange`.
pub fn evaluate_chapter(
    batch: &Batch,
    chapter_index: usize,
) -> Result<RemediationDecision, LedgerError> {
    let progress = batch.entry(chapter_index)?.progress();
    if progress.is_adaptive() || batch.has_remediation_for(chapter_index) {
        return Ok(RemediationDecision::NoActionNeeded);
    }
    Ok(progress
        .test_result()
        .map_or(RemediationDecision::NoActionNeeded, evaluate))
}
