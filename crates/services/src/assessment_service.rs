use std::sync::Arc;

use curriculum_core::gate::is_chapter_unlocked;
use curriculum_core::grader::grade_test;
use curriculum_core::model::{Answers, BatchId, GradeError, Question, TestResult};
use curriculum_core::remediation::is_passing;
use storage::repository::BatchRepository;

use crate::Clock;
use crate::content::ContentStore;
use crate::error::{AssessmentError, ContentGenerationError, RemediationError};
use crate::locks::BatchLocks;
use crate::remediation_service::{RemediationOutcome, RemediationService};
use crate::store;

/// Remediation follow-up of a submitted test.
///
/// `Deferred` is an infrastructure failure ("retry later"), distinct from a
/// below-passing score, which shows up as `Done(Appended { .. })`.
#[derive(Debug)]
pub enum RemediationStatus {
    Done(RemediationOutcome),
    Deferred(ContentGenerationError),
}

/// Result of submitting one chapter test.
#[derive(Debug)]
pub struct TestSubmission {
    pub chapter_index: usize,
    pub result: TestResult,
    pub passed: bool,
    pub remediation: RemediationStatus,
}

/// Grades chapter tests, records results and triggers remediation.
#[derive(Clone)]
pub struct AssessmentService {
    clock: Clock,
    batches: Arc<dyn BatchRepository>,
    locks: BatchLocks,
    content: ContentStore,
    remediation: Arc<RemediationService>,
}

impl AssessmentService {
    #[must_use]
    pub fn new(
        clock: Clock,
        batches: Arc<dyn BatchRepository>,
        locks: BatchLocks,
        content: ContentStore,
        remediation: Arc<RemediationService>,
    ) -> Self {
        Self {
            clock,
            batches,
            locks,
            content,
            remediation,
        }
    }

    /// Generate a test for a chapter through the content store.
    ///
    /// # Errors
    ///
    /// Returns `AssessmentError::Content` if generation fails and
    /// `AssessmentError::Grade(GradeError::NoQuestions)` if no generated
    /// question survives validation.
    pub async fn generate_test(
        &self,
        batch_id: BatchId,
        chapter_index: usize,
    ) -> Result<Vec<Question>, AssessmentError> {
        let batch = self
            .batches
            .get_batch(batch_id)
            .await?
            .ok_or(AssessmentError::BatchNotFound(batch_id))?;
        let chapter = batch.entry(chapter_index)?.chapter();

        let questions = self.content.generate_test(chapter).await?;
        if questions.is_empty() {
            tracing::warn!(batch_id = %batch_id, chapter_index, "no usable generated questions");
            return Err(GradeError::NoQuestions.into());
        }
        Ok(questions)
    }

    /// Grade a test, record the result on the chapter and run remediation.
    ///
    /// The result is committed before remediation starts, so a generation
    /// failure is reported as `RemediationStatus::Deferred` rather than an
    /// error; `RemediationService::remediate` retries it later.
    ///
    /// # Errors
    ///
    /// Returns `AssessmentError::ChapterLocked` when the chapter is gated,
    /// `AssessmentError::Grade` for an empty test or answers that do not fit
    /// it, `AssessmentError::Ledger` for a bad index,
    /// `AssessmentError::BatchNotFound`, `AssessmentError::Storage`, or
    /// `AssessmentError::Remediation` for non-generation remediation failures.
    pub async fn submit_test(
        &self,
        batch_id: BatchId,
        chapter_index: usize,
        questions: &[Question],
        answers: &Answers,
    ) -> Result<TestSubmission, AssessmentError> {
        let result = {
            let _guard = self.locks.lock(batch_id).await;
            let mut batch = self
                .batches
                .get_batch(batch_id)
                .await?
                .ok_or(AssessmentError::BatchNotFound(batch_id))?;
            if !is_chapter_unlocked(&batch, chapter_index)? {
                return Err(AssessmentError::ChapterLocked {
                    index: chapter_index,
                });
            }

            let result = grade_test(questions, answers, self.clock.now())?;
            batch.record_test_result(chapter_index, result.clone())?;
            store::save(self.batches.as_ref(), &mut batch).await?;
            tracing::info!(
                batch_id = %batch_id,
                chapter_index,
                score = result.score(),
                "recorded test result"
            );
            result
        };

        let remediation = match self.remediation.remediate(batch_id, chapter_index).await {
            Ok(outcome) => RemediationStatus::Done(outcome),
            Err(RemediationError::Content(err)) => RemediationStatus::Deferred(err),
            Err(err) => return Err(err.into()),
        };

        Ok(TestSubmission {
            chapter_index,
            passed: is_passing(result.score()),
            result,
            remediation,
        })
    }
}
