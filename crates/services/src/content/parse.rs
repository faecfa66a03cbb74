//! Validated parse of generator output.
//!
//! Generated text is never trusted as-is: the JSON payload is pulled out of
//! any markdown fence, read into loose raw structs and then validated into
//! domain types.

use curriculum_core::model::{
    Chapter, ChapterDraft, Difficulty, Question, QuestionDraft, TopicDraft,
};
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::error::ContentGenerationError;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawChapter {
    #[serde(alias = "chapterTitle", alias = "name")]
    title: Option<String>,
    #[serde(alias = "sections")]
    topics: Vec<RawTopic>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawTopic {
    #[serde(alias = "topicTitle", alias = "name")]
    title: String,
    #[serde(alias = "explanation", alias = "body")]
    content: String,
    #[serde(alias = "links")]
    resources: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawQuestions {
    List(Vec<Value>),
    Wrapped { questions: Vec<Value> },
}

/// Strip a surrounding markdown code fence, with or without a language tag.
#[must_use]
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = rest.split_once('\n').map_or(rest, |(_, body)| body);
    body.strip_suffix("```").unwrap_or(body).trim()
}

fn malformed(e: impl std::fmt::Display) -> ContentGenerationError {
    ContentGenerationError::Malformed(e.to_string())
}

/// Parse a generated chapter.
///
/// # Errors
///
/// Returns `ContentGenerationError::EmptyResponse` for blank output and
/// `ContentGenerationError::Malformed` when the payload is not a chapter, has
/// no title, or has no valid topics.
pub fn parse_chapter(raw: &str) -> Result<Chapter, ContentGenerationError> {
    let payload = strip_code_fence(raw);
    if payload.is_empty() {
        return Err(ContentGenerationError::EmptyResponse);
    }
    let chapter: RawChapter = serde_json::from_str(payload).map_err(malformed)?;
    let title = chapter
        .title
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| malformed("chapter has no title"))?;

    let topics = chapter
        .topics
        .into_iter()
        .map(|topic| TopicDraft {
            title: topic.title,
            content: topic.content,
            resources: topic
                .resources
                .into_iter()
                .filter(|link| {
                    let ok = Url::parse(link.trim()).is_ok();
                    if !ok {
                        tracing::debug!(link = %link, "dropping invalid generated resource link");
                    }
                    ok
                })
                .collect(),
        })
        .collect();

    ChapterDraft::new(title, topics).validate().map_err(malformed)
}

/// Parse a generated question list, dropping questions that fail validation.
///
/// Accepts a bare array or an object with a `questions` array.
///
/// # Errors
///
/// Returns `ContentGenerationError::EmptyResponse` for blank output and
/// `ContentGenerationError::Malformed` when the payload is not a question list.
pub fn parse_questions(raw: &str) -> Result<Vec<Question>, ContentGenerationError> {
    let payload = strip_code_fence(raw);
    if payload.is_empty() {
        return Err(ContentGenerationError::EmptyResponse);
    }
    let values = match serde_json::from_str(payload).map_err(malformed)? {
        RawQuestions::List(values) | RawQuestions::Wrapped { questions: values } => values,
    };

    let drafts = values
        .into_iter()
        .enumerate()
        .filter_map(|(index, mut value)| {
            normalize_difficulty(&mut value);
            match serde_json::from_value::<QuestionDraft>(value) {
                Ok(draft) => Some(draft),
                Err(err) => {
                    tracing::warn!(index, error = %err, "dropping unreadable generated question");
                    None
                }
            }
        })
        .collect();
    Ok(validate_questions(drafts))
}

/// Validate question drafts, dropping any without a prompt or a usable answer.
#[must_use]
pub fn validate_questions(drafts: Vec<QuestionDraft>) -> Vec<Question> {
    drafts
        .into_iter()
        .enumerate()
        .filter_map(|(index, draft)| match Question::try_from(draft) {
            Ok(question) => Some(question),
            Err(err) => {
                tracing::warn!(index, error = %err, "dropping malformed question");
                None
            }
        })
        .collect()
}

/// Map free-form difficulty labels ("Easy", "moderate") onto the known set;
/// unknown labels become absent.
fn normalize_difficulty(value: &mut Value) {
    let Some(slot) = value.get_mut("difficulty") else {
        return;
    };
    let parsed = slot.as_str().and_then(Difficulty::parse);
    *slot = parsed.map_or(Value::Null, |d| Value::from(d.as_str()));
}
