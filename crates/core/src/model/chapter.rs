use thiserror::Error;
use url::Url;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ChapterError {
    #[error("chapter title cannot be empty")]
    EmptyTitle,

    #[error("chapter must contain at least one topic")]
    NoTopics,

    #[error("topic {index} has an empty title")]
    EmptyTopicTitle { index: usize },

    #[error("topic {index} has an invalid resource link: {raw}")]
    InvalidResourceUrl { index: usize, raw: String },
}

//
// ─── DRAFTS ────────────────────────────────────────────────────────────────────
//

/// Unvalidated topic content, as authored or as parsed from generated text.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TopicDraft {
    pub title: String,
    pub content: String,
    pub resources: Vec<String>,
}

impl TopicDraft {
    #[must_use]
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            resources: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_resource(mut self, link: impl Into<String>) -> Self {
        self.resources.push(link.into());
        self
    }
}

/// Unvalidated chapter content.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChapterDraft {
    pub title: String,
    pub topics: Vec<TopicDraft>,
    pub is_test_gate: bool,
    pub has_assignment: bool,
}

impl ChapterDraft {
    #[must_use]
    pub fn new(title: impl Into<String>, topics: Vec<TopicDraft>) -> Self {
        Self {
            title: title.into(),
            topics,
            is_test_gate: false,
            has_assignment: false,
        }
    }

    /// Marks the chapter's test as mandatory before the next chapter unlocks.
    #[must_use]
    pub fn test_gate(mut self) -> Self {
        self.is_test_gate = true;
        self
    }

    #[must_use]
    pub fn with_assignment(mut self) -> Self {
        self.has_assignment = true;
        self
    }

    /// Validate the draft into immutable chapter content.
    ///
    /// Titles are trimmed. Blank resource entries are skipped.
    ///
    /// # Errors
    ///
    /// Returns `ChapterError` if the title is blank, there are no topics,
    /// a topic title is blank, or a resource link is not an absolute URL.
    pub fn validate(self) -> Result<Chapter, ChapterError> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(ChapterError::EmptyTitle);
        }
        if self.topics.is_empty() {
            return Err(ChapterError::NoTopics);
        }

        let mut topics = Vec::with_capacity(self.topics.len());
        for (index, draft) in self.topics.into_iter().enumerate() {
            let topic_title = draft.title.trim();
            if topic_title.is_empty() {
                return Err(ChapterError::EmptyTopicTitle { index });
            }
            let mut resources = Vec::with_capacity(draft.resources.len());
            for raw in draft.resources {
                let raw = raw.trim();
                if raw.is_empty() {
                    continue;
                }
                let link = Url::parse(raw).map_err(|_| ChapterError::InvalidResourceUrl {
                    index,
                    raw: raw.to_owned(),
                })?;
                resources.push(link);
            }
            topics.push(Topic {
                title: topic_title.to_owned(),
                content: draft.content,
                resources,
            });
        }

        Ok(Chapter {
            title: title.to_owned(),
            topics,
            is_test_gate: self.is_test_gate,
            has_assignment: self.has_assignment,
        })
    }
}

//
// ─── CONTENT ───────────────────────────────────────────────────────────────────
//

/// Smallest completable unit of content. Immutable once validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topic {
    title: String,
    content: String,
    resources: Vec<Url>,
}

impl Topic {
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    #[must_use]
    pub fn resources(&self) -> &[Url] {
        &self.resources
    }
}

/// A titled, ordered group of topics. Immutable once validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    title: String,
    topics: Vec<Topic>,
    is_test_gate: bool,
    has_assignment: bool,
}

impl Chapter {
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn topics(&self) -> &[Topic] {
        &self.topics
    }

    #[must_use]
    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }

    /// When true, this chapter's test must be attempted before the next chapter unlocks.
    #[must_use]
    pub fn is_test_gate(&self) -> bool {
        self.is_test_gate
    }

    #[must_use]
    pub fn has_assignment(&self) -> bool {
        self.has_assignment
    }

    /// Turn the chapter back into a draft, e.g. for persistence.
    #[must_use]
    pub fn to_draft(&self) -> ChapterDraft {
        ChapterDraft {
            title: self.title.clone(),
            topics: self
                .topics
                .iter()
                .map(|t| TopicDraft {
                    title: t.title.clone(),
                    content: t.content.clone(),
                    resources: t.resources.iter().map(ToString::to_string).collect(),
                })
                .collect(),
            is_test_gate: self.is_test_gate,
            has_assignment: self.has_assignment,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_trims_titles_and_parses_links() {
        let chapter = ChapterDraft::new(
            "  Loops ",
            vec![TopicDraft::new(" for ", "iterate").with_resource("https://doc.rust-lang.org/book/")],
        )
        .test_gate()
        .validate()
        .unwrap();

        assert_eq!(chapter.title(), "Loops");
        assert_eq!(chapter.topics()[0].title(), "for");
        assert_eq!(chapter.topics()[0].resources().len(), 1);
        assert!(chapter.is_test_gate());
        assert!(!chapter.has_assignment());
    }

    #[test]
    fn validate_rejects_empty_title() {
        let err = ChapterDraft::new("   ", vec![TopicDraft::new("a", "b")])
            .validate()
            .unwrap_err();
        assert_eq!(err, ChapterError::EmptyTitle);
    }

    #[test]
    fn validate_rejects_missing_topics() {
        let err = ChapterDraft::new("Loops", Vec::new()).validate().unwrap_err();
        assert_eq!(err, ChapterError::NoTopics);
    }

    #[test]
    fn validate_rejects_relative_links() {
        let err = ChapterDraft::new(
            "Loops",
            vec![
                TopicDraft::new("a", ""),
                TopicDraft::new("b", "").with_resource("not a url"),
            ],
        )
        .validate()
        .unwrap_err();
        assert!(matches!(err, ChapterError::InvalidResourceUrl { index: 1, .. }));
    }

    #[test]
    fn to_draft_round_trips() {
        let chapter = ChapterDraft::new("Loops", vec![TopicDraft::new("for", "x")])
            .with_assignment()
            .validate()
            .unwrap();
        assert_eq!(chapter.to_draft().validate().unwrap(), chapter);
    }
}
