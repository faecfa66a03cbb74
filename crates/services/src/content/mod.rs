//! The external content producer and the validated parse of its output.

use std::sync::Arc;

use async_trait::async_trait;
use curriculum_core::model::{Chapter, Question};

use crate::error::ContentGenerationError;

pub mod http;
pub mod parse;
mod prompt;

pub use http::{ContentGeneratorConfig, HttpContentGenerator};

/// Anything that turns a prompt into unstructured text.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    /// # Errors
    ///
    /// Returns `ContentGenerationError` when nothing usable comes back.
    async fn generate(&self, prompt: &str) -> Result<String, ContentGenerationError>;
}

/// Typed access to generated remediation chapters and chapter tests.
#[derive(Clone)]
pub struct ContentStore {
    generator: Arc<dyn ContentGenerator>,
}

impl ContentStore {
    #[must_use]
    pub fn new(generator: Arc<dyn ContentGenerator>) -> Self {
        Self { generator }
    }

    /// Generate a chapter that revisits `concepts` from `parent`.
    ///
    /// # Errors
    ///
    /// Returns `ContentGenerationError` if generation fails or the output does
    /// not parse into a chapter with a title and at least one topic.
    pub async fn generate_remediation(
        &self,
        parent: &Chapter,
        concepts: &[String],
    ) -> Result<Chapter, ContentGenerationError> {
        let raw = self
            .generator
            .generate(&prompt::remediation(parent, concepts))
            .await?;
        parse::parse_chapter(&raw)
    }

    /// Generate test questions for `chapter`. Malformed questions are dropped,
    /// so the result may be empty.
    ///
    /// # Errors
    ///
    /// Returns `ContentGenerationError` if generation fails or the output is
    /// not a question list at all.
    pub async fn generate_test(
        &self,
        chapter: &Chapter,
    ) -> Result<Vec<Question>, ContentGenerationError> {
        let raw = self.generator.generate(&prompt::chapter_test(chapter)).await?;
        parse::parse_questions(&raw)
    }
}
