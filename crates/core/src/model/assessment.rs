use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Concept assigned to questions that do not name one.
pub const DEFAULT_CONCEPT: &str = "General concept";

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question prompt cannot be empty")]
    EmptyPrompt,

    #[error("question has no correct answer")]
    MissingCorrectAnswer,

    #[error("correct option {index} is out of range for {options} options")]
    CorrectOptionOutOfRange { index: usize, options: usize },
}

/// Rejected test submissions.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum GradeError {
    #[error("cannot grade a test without questions")]
    NoQuestions,

    #[error("answer submitted for question {index}, but the test has {total} questions")]
    AnswerOutOfRange { index: usize, total: usize },

    #[error("question {index} has {options} options, option {selected} was submitted")]
    OptionOutOfRange {
        index: usize,
        selected: usize,
        options: usize,
    },
}

//
// ─── QUESTIONS ─────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    /// Lenient parse for generated content ("Easy", " HARD ").
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "easy" => Some(Self::Easy),
            "medium" | "moderate" => Some(Self::Medium),
            "hard" | "difficult" => Some(Self::Hard),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
        }
    }
}

/// The expected answer of a question: an option index or free text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerKey {
    Option(usize),
    Text(String),
}

/// What the learner submitted for one question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SubmittedAnswer {
    Option(usize),
    Text(String),
}

impl SubmittedAnswer {
    /// Blank free text counts as unanswered.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        matches!(self, Self::Text(text) if text.trim().is_empty())
    }
}

/// Submitted answers keyed by question index. Missing keys are unanswered.
pub type Answers = BTreeMap<usize, SubmittedAnswer>;

/// Loosely-typed question as it arrives from authored files or generated content.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QuestionDraft {
    #[serde(alias = "question")]
    pub prompt: String,
    pub options: Vec<String>,
    #[serde(alias = "answer")]
    pub correct_answer: Option<AnswerKey>,
    pub concept: Option<String>,
    pub difficulty: Option<Difficulty>,
    pub explanation: Option<String>,
}

/// A validated test question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "QuestionDraft", into = "QuestionDraft")]
pub struct Question {
    prompt: String,
    options: Vec<String>,
    correct_answer: AnswerKey,
    concept: Option<String>,
    difficulty: Option<Difficulty>,
    explanation: Option<String>,
}

impl TryFrom<QuestionDraft> for Question {
    type Error = QuestionError;

    fn try_from(draft: QuestionDraft) -> Result<Self, Self::Error> {
        let prompt = draft.prompt.trim();
        if prompt.is_empty() {
            return Err(QuestionError::EmptyPrompt);
        }
        let correct_answer = match draft.correct_answer {
            None => return Err(QuestionError::MissingCorrectAnswer),
            Some(AnswerKey::Text(text)) if text.trim().is_empty() => {
                return Err(QuestionError::MissingCorrectAnswer);
            }
            Some(AnswerKey::Option(index)) if index >= draft.options.len() => {
                return Err(QuestionError::CorrectOptionOutOfRange {
                    index,
                    options: draft.options.len(),
                });
            }
            Some(AnswerKey::Text(text)) if !draft.options.is_empty() => {
                AnswerKey::Option(resolve_option_key(&text, &draft.options)?)
            }
            Some(key) => key,
        };
        let concept = draft
            .concept
            .map(|c| c.trim().to_owned())
            .filter(|c| !c.is_empty());

        Ok(Self {
            prompt: prompt.to_owned(),
            options: draft.options,
            correct_answer,
            concept,
            difficulty: draft.difficulty,
            explanation: draft.explanation,
        })
    }
}

/// Resolve a textual key of a multiple-choice question to an option index.
///
/// Tried in order: the option text itself (trimmed, case-insensitive), an
/// option letter ("B", "b)"), then a zero-based index ("1").
fn resolve_option_key(key: &str, options: &[String]) -> Result<usize, QuestionError> {
    let key = key.trim().to_lowercase();
    if let Some(index) = options
        .iter()
        .position(|option| option.trim().to_lowercase() == key)
    {
        return Ok(index);
    }

    let label = key.trim_end_matches([')', '.', ':']).trim();
    if let [letter @ b'a'..=b'z'] = label.as_bytes() {
        let index = usize::from(letter - b'a');
        return if index < options.len() {
            Ok(index)
        } else {
            Err(QuestionError::MissingCorrectAnswer)
        };
    }

    match label.parse::<usize>() {
        Ok(index) if index < options.len() => Ok(index),
        Ok(index) => Err(QuestionError::CorrectOptionOutOfRange {
            index,
            options: options.len(),
        }),
        Err(_) => Err(QuestionError::MissingCorrectAnswer),
    }
}

impl From<Question> for QuestionDraft {
    fn from(q: Question) -> Self {
        Self {
            prompt: q.prompt,
            options: q.options,
            correct_answer: Some(q.correct_answer),
            concept: q.concept,
            difficulty: q.difficulty,
            explanation: q.explanation,
        }
    }
}

impl Question {
    /// Multiple-choice question.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if the prompt is blank or `correct` is not a valid option.
    pub fn multiple_choice(
        prompt: impl Into<String>,
        options: Vec<String>,
        correct: usize,
    ) -> Result<Self, QuestionError> {
        Self::try_from(QuestionDraft {
            prompt: prompt.into(),
            options,
            correct_answer: Some(AnswerKey::Option(correct)),
            ..QuestionDraft::default()
        })
    }

    /// Free-text question.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if the prompt or expected answer is blank.
    pub fn free_text(
        prompt: impl Into<String>,
        expected: impl Into<String>,
    ) -> Result<Self, QuestionError> {
        Self::try_from(QuestionDraft {
            prompt: prompt.into(),
            correct_answer: Some(AnswerKey::Text(expected.into())),
            ..QuestionDraft::default()
        })
    }

    #[must_use]
    pub fn with_concept(mut self, concept: impl Into<String>) -> Self {
        let concept = concept.into();
        let concept = concept.trim();
        self.concept = (!concept.is_empty()).then(|| concept.to_owned());
        self
    }

    #[must_use]
    pub fn with_difficulty(mut self, difficulty: Difficulty) -> Self {
        self.difficulty = Some(difficulty);
        self
    }

    #[must_use]
    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = Some(explanation.into());
        self
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn options(&self) -> &[String] {
        &self.options
    }

    #[must_use]
    pub fn correct_answer(&self) -> &AnswerKey {
        &self.correct_answer
    }

    #[must_use]
    pub fn concept(&self) -> Option<&str> {
        self.concept.as_deref()
    }

    /// Concept used for gap analysis, falling back to [`DEFAULT_CONCEPT`].
    #[must_use]
    pub fn concept_or_default(&self) -> &str {
        self.concept.as_deref().unwrap_or(DEFAULT_CONCEPT)
    }

    #[must_use]
    pub fn difficulty(&self) -> Option<Difficulty> {
        self.difficulty
    }

    #[must_use]
    pub fn explanation(&self) -> Option<&str> {
        self.explanation.as_deref()
    }

    /// Human-readable form of the expected answer.
    #[must_use]
    pub fn correct_answer_text(&self) -> String {
        match &self.correct_answer {
            AnswerKey::Option(i) => self.options.get(*i).cloned().unwrap_or_else(|| i.to_string()),
            AnswerKey::Text(text) => text.clone(),
        }
    }
}

//
// ─── RESULTS ───────────────────────────────────────────────────────────────────
//

/// One wrong or unanswered question in a graded test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncorrectAnswer {
    pub question: String,
    /// `None` when the question was left unanswered.
    pub user_answer: Option<String>,
    pub correct_answer: String,
    pub explanation: Option<String>,
    pub concept: String,
}

/// Count of answered questions per difficulty bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DifficultyBreakdown {
    pub easy: u32,
    pub medium: u32,
    pub hard: u32,
}

impl DifficultyBreakdown {
    pub(crate) fn tally(&mut self, difficulty: Difficulty) {
        let bucket = match difficulty {
            Difficulty::Easy => &mut self.easy,
            Difficulty::Medium => &mut self.medium,
            Difficulty::Hard => &mut self.hard,
        };
        *bucket = bucket.saturating_add(1);
    }

    #[must_use]
    pub fn total(&self) -> u32 {
        self.easy + self.medium + self.hard
    }
}

/// Graded outcome of one test attempt. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    score: u8,
    total_questions: u32,
    correct_answers: u32,
    incorrect_answers: Vec<IncorrectAnswer>,
    concepts_to_review: BTreeSet<String>,
    difficulty_breakdown: DifficultyBreakdown,
    completed_at: DateTime<Utc>,
}

impl TestResult {
    pub(crate) fn new(
        total_questions: u32,
        correct_answers: u32,
        incorrect_answers: Vec<IncorrectAnswer>,
        difficulty_breakdown: DifficultyBreakdown,
        completed_at: DateTime<Utc>,
    ) -> Self {
        let concepts_to_review = incorrect_answers
            .iter()
            .map(|a| a.concept.clone())
            .collect();
        Self {
            score: percentage(correct_answers, total_questions),
            total_questions,
            correct_answers,
            incorrect_answers,
            concepts_to_review,
            difficulty_breakdown,
            completed_at,
        }
    }

    /// Checks the internal consistency of a rehydrated result.
    pub(crate) fn is_consistent(&self) -> bool {
        let wrong = u32::try_from(self.incorrect_answers.len()).unwrap_or(u32::MAX);
        self.score <= 100
            && self.correct_answers <= self.total_questions
            && self.correct_answers.saturating_add(wrong) == self.total_questions
    }

    /// Score in percent, 0..=100.
    #[must_use]
    pub fn score(&self) -> u8 {
        self.score
    }

    #[must_use]
    pub fn total_questions(&self) -> u32 {
        self.total_questions
    }

    #[must_use]
    pub fn correct_answers(&self) -> u32 {
        self.correct_answers
    }

    #[must_use]
    pub fn incorrect_answers(&self) -> &[IncorrectAnswer] {
        &self.incorrect_answers
    }

    /// Distinct concepts of the incorrect answers.
    #[must_use]
    pub fn concepts_to_review(&self) -> &BTreeSet<String> {
        &self.concepts_to_review
    }

    #[must_use]
    pub fn difficulty_breakdown(&self) -> DifficultyBreakdown {
        self.difficulty_breakdown
    }

    #[must_use]
    pub fn completed_at(&self) -> DateTime<Utc> {
        self.completed_at
    }
}

/// `round(100 * part / whole)`, rounding halves up. Zero when `whole` is zero.
#[must_use]
pub fn percentage(part: u32, whole: u32) -> u8 {
    if whole == 0 {
        return 0;
    }
    let part = u64::from(part.min(whole));
    let whole = u64::from(whole);
    let rounded = (200 * part + whole) / (2 * whole);
    u8::try_from(rounded).unwrap_or(100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentage_rounds_half_up() {
        assert_eq!(percentage(1, 3), 33);
        assert_eq!(percentage(2, 3), 67);
        assert_eq!(percentage(1, 8), 13);
        assert_eq!(percentage(0, 0), 0);
        assert_eq!(percentage(5, 5), 100);
    }

    #[test]
    fn question_requires_prompt_and_answer() {
        let err = Question::try_from(QuestionDraft {
            prompt: "  ".into(),
            correct_answer: Some(AnswerKey::Text("x".into())),
            ..QuestionDraft::default()
        })
        .unwrap_err();
        assert_eq!(err, QuestionError::EmptyPrompt);

        let err = Question::try_from(QuestionDraft {
            prompt: "What?".into(),
            ..QuestionDraft::default()
        })
        .unwrap_err();
        assert_eq!(err, QuestionError::MissingCorrectAnswer);
    }

    #[test]
    fn multiple_choice_checks_option_range() {
        let err = Question::multiple_choice("Pick", vec!["a".into()], 3).unwrap_err();
        assert_eq!(
            err,
            QuestionError::CorrectOptionOutOfRange {
                index: 3,
                options: 1
            }
        );
    }

    #[test]
    fn question_deserializes_loose_json() {
        let q: Question = serde_json::from_value(serde_json::json!({
            "question": "2 + 2?",
            "options": ["3", "4"],
            "correctAnswer": 1,
            "concept": "  arithmetic ",
            "difficulty": "easy"
        }))
        .unwrap();
        assert_eq!(q.prompt(), "2 + 2?");
        assert_eq!(q.correct_answer(), &AnswerKey::Option(1));
        assert_eq!(q.concept(), Some("arithmetic"));
        assert_eq!(q.correct_answer_text(), "4");
    }

    #[test]
    fn textual_key_of_choice_question_resolves_to_an_option() {
        let options = vec!["a shared borrow".to_owned(), "a mutable borrow".to_owned()];
        let draft = |key: &str| QuestionDraft {
            prompt: "What does `&mut` take?".into(),
            options: options.clone(),
            correct_answer: Some(AnswerKey::Text(key.into())),
            ..QuestionDraft::default()
        };

        for key in ["B", "b)", " A Mutable Borrow ", "1"] {
            let q = Question::try_from(draft(key)).unwrap();
            assert_eq!(q.correct_answer(), &AnswerKey::Option(1), "key {key:?}");
        }
        assert_eq!(
            Question::try_from(draft("C")).unwrap_err(),
            QuestionError::MissingCorrectAnswer
        );
        assert_eq!(
            Question::try_from(draft("borrow")).unwrap_err(),
            QuestionError::MissingCorrectAnswer
        );
        assert_eq!(
            Question::try_from(draft("7")).unwrap_err(),
            QuestionError::CorrectOptionOutOfRange {
                index: 7,
                options: 2
            }
        );
    }

    #[test]
    fn blank_concept_falls_back_to_default() {
        let q = Question::free_text("Name it", "ownership").unwrap().with_concept(" ");
        assert_eq!(q.concept_or_default(), DEFAULT_CONCEPT);
    }

    #[test]
    fn difficulty_parse_is_lenient() {
        assert_eq!(Difficulty::parse(" HARD "), Some(Difficulty::Hard));
        assert_eq!(Difficulty::parse("impossible"), None);
    }
}
