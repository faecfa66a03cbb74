use thiserror::Error;

use crate::model::{ChapterError, GradeError, LedgerError, QuestionError};

/// Umbrella error for callers that do not care which domain rule failed.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Grade(#[from] GradeError),
    #[error(transparent)]
    Chapter(#[from] ChapterError),
    #[error(transparent)]
    Question(#[from] QuestionError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Batch, BatchId, ChapterDraft};
    use crate::time::fixed_now;

    fn build_empty_chapter() -> Result<Batch, Error> {
        let chapter = ChapterDraft::new("Empty", Vec::new());
        Ok(Batch::new(BatchId::new(1), "Course", vec![chapter], fixed_now())?)
    }

    #[test]
    fn domain_errors_convert_into_umbrella() {
        let err = build_empty_chapter().unwrap_err();
        assert!(matches!(
            err,
            Error::Ledger(LedgerError::Chapter {
                index: 0,
                source: ChapterError::NoTopics
            })
        ));
        assert_eq!(err.to_string(), "chapter 0: chapter must contain at least one topic");
    }
}
