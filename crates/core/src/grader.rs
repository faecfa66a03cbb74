//! Test grading with concept-level gap analysis.
//!
//! Grading is a pure function of the questions, the submitted answers and the
//! completion timestamp.

use chrono::{DateTime, Utc};

use crate::model::{
    AnswerKey, Answers, DifficultyBreakdown, GradeError, IncorrectAnswer, Question,
    SubmittedAnswer, TestResult,
};

/// Grade a submitted test against its answer key.
///
/// Unanswered questions (missing or blank) count as incorrect and are not
/// tallied in the difficulty breakdown.
///
/// # Errors
///
/// Returns `GradeError::NoQuestions` for an empty test, `GradeError::AnswerOutOfRange`
/// when an answer targets a question that does not exist, and
/// `GradeError::OptionOutOfRange` when a selected option does not exist.
pub fn grade_test(
    questions: &[Question],
    answers: &Answers,
    completed_at: DateTime<Utc>,
) -> Result<TestResult, GradeError> {
    if questions.is_empty() {
        return Err(GradeError::NoQuestions);
    }
    if let Some((&index, _)) = answers.range(questions.len()..).next() {
        return Err(GradeError::AnswerOutOfRange {
            index,
            total: questions.len(),
        });
    }

    let mut correct = 0_u32;
    let mut incorrect = Vec::new();
    let mut breakdown = DifficultyBreakdown::default();

    for (index, question) in questions.iter().enumerate() {
        let submitted = answers.get(&index).filter(|a| !a.is_blank());

        let is_correct = match submitted {
            Some(answer) => {
                breakdown.tally(question.difficulty().unwrap_or_default());
                is_correct(index, question, answer)?
            }
            None => false,
        };

        if is_correct {
            correct += 1;
        } else {
            incorrect.push(IncorrectAnswer {
                question: question.prompt().to_owned(),
                user_answer: submitted.map(|a| display_answer(question, a)),
                correct_answer: question.correct_answer_text(),
                explanation: question.explanation().map(ToOwned::to_owned),
                concept: question.concept_or_default().to_owned(),
            });
        }
    }

    let total = u32::try_from(questions.len()).unwrap_or(u32::MAX);
    Ok(TestResult::new(
        total,
        correct,
        incorrect,
        breakdown,
        completed_at,
    ))
}

fn is_correct(
    index: usize,
    question: &Question,
    answer: &SubmittedAnswer,
) -> Result<bool, GradeError> {
    let options = question.options();
    let selected_text = |selected: usize| {
        options.get(selected).ok_or(GradeError::OptionOutOfRange {
            index,
            selected,
            options: options.len(),
        })
    };

    Ok(match (question.correct_answer(), answer) {
        (AnswerKey::Option(expected), SubmittedAnswer::Option(selected)) => {
            if !options.is_empty() {
                selected_text(*selected)?;
            }
            expected == selected
        }
        // Typed answer to a multiple-choice question: must name the option exactly.
        (AnswerKey::Option(expected), SubmittedAnswer::Text(text)) => options
            .get(*expected)
            .is_some_and(|option| normalize(option) == normalize(text)),
        // Only reachable without options: textual keys of choice questions
        // are resolved to an index when the question is built.
        (AnswerKey::Text(expected), SubmittedAnswer::Option(selected)) => {
            free_text_matches(selected_text(*selected)?, expected)
        }
        (AnswerKey::Text(expected), SubmittedAnswer::Text(text)) => {
            free_text_matches(text, expected)
        }
    })
}

fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Case-insensitive substring match in either direction.
///
/// Lenient on purpose: "loop" matches "a for loop". Blank input never matches.
#[must_use]
pub fn free_text_matches(submitted: &str, expected: &str) -> bool {
    let submitted = normalize(submitted);
    let expected = normalize(expected);
    if submitted.is_empty() || expected.is_empty() {
        return false;
    }
    submitted.contains(&expected) || expected.contains(&submitted)
}

fn display_answer(question: &Question, answer: &SubmittedAnswer) -> String {
    match answer {
        SubmittedAnswer::Option(i) => question
            .options()
            .get(*i)
            .cloned()
            .unwrap_or_else(|| i.to_string()),
        SubmittedAnswer::Text(text) => text.trim().to_owned(),
    }
}
