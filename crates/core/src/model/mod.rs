mod assessment;
mod batch;
mod chapter;
mod ids;
mod progress;

pub use assessment::{
    AnswerKey, Answers, DEFAULT_CONCEPT, Difficulty, DifficultyBreakdown, GradeError,
    IncorrectAnswer, Question, QuestionDraft, QuestionError, SubmittedAnswer, TestResult,
    percentage,
};
pub use batch::{Batch, ChapterEntry, LedgerError};
pub use chapter::{Chapter, ChapterDraft, ChapterError, Topic, TopicDraft};
pub use ids::{BatchId, ChapterId, ParseIdError};
pub use progress::{ChapterProgress, TopicProgress};
