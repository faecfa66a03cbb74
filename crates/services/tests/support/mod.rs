#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use curriculum_core::model::{Answers, ChapterDraft, Question, SubmittedAnswer, TopicDraft};
use services::{ContentGenerationError, ContentGenerator};

/// One scripted generator reply.
pub enum Reply {
    Text(String),
    Fail,
    Hang,
}

/// Content generator that plays back scripted replies and counts calls.
#[derive(Clone, Default)]
pub struct ScriptedGenerator {
    replies: Arc<Mutex<VecDeque<Reply>>>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedGenerator {
    pub fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(replies.into())),
            calls: Arc::default(),
        }
    }

    pub fn push(&self, reply: Reply) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentGenerator for ScriptedGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String, ContentGenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let reply = self.replies.lock().unwrap().pop_front();
        match reply {
            Some(Reply::Text(text)) => Ok(text),
            Some(Reply::Hang) => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(String::new())
            }
            Some(Reply::Fail) | None => Err(ContentGenerationError::EmptyResponse),
        }
    }
}

pub fn remediation_json(title: &str) -> String {
    format!(
        "```json\n{{\"title\": \"{title}\", \"topics\": [{{\"title\": \"Recap\", \"content\": \"Once more.\"}}]}}\n```"
    )
}

/// Three chapters; the middle one gates the last and has an assignment.
pub fn course() -> Vec<ChapterDraft> {
    vec![
        ChapterDraft::new(
            "Ownership",
            vec![TopicDraft::new("Moves", ""), TopicDraft::new("Borrows", "")],
        ),
        ChapterDraft::new("Traits", vec![TopicDraft::new("Generics", "")])
            .test_gate()
            .with_assignment(),
        ChapterDraft::new("Async", vec![TopicDraft::new("Futures", "")]),
    ]
}

/// Ten multiple-choice questions; the first `wrong` are tagged with `concept`.
pub fn quiz(wrong: usize, concept: &str) -> (Vec<Question>, Answers) {
    let questions = (0..10)
        .map(|i| {
            let q = Question::multiple_choice(
                format!("q{i}"),
                vec!["right".into(), "wrong".into()],
                0,
            )
            .unwrap();
            if i < wrong { q.with_concept(concept) } else { q }
        })
        .collect();
    let answers = (0..10)
        .map(|i| (i, SubmittedAnswer::Option(usize::from(i < wrong))))
        .collect();
    (questions, answers)
}
