//! External capability contracts consumed by the quiz core.
//!
//! The core treats OCR and language-model generation as injected
//! collaborators behind these traits. Implementations live outside this
//! crate (see `snapquiz-mistral`); tests substitute in-memory fakes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Converts one encoded document image into extracted text.
///
/// The input is a base64-encoded image, with or without a `data:` URI
/// prefix. The core treats the result as opaque text.
#[async_trait]
pub trait TextExtraction: Send + Sync {
    /// Extracts text from the given encoded image.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::ExtractionError` when the extraction service
    /// fails or the image cannot be read.
    async fn extract(&self, encoded_image: &str) -> Result<String>;
}

/// Accepts a prompt and returns either free text or a schema-conforming
/// structure.
///
/// Every invocation is synchronous from the caller's perspective and
/// potentially high-latency; implementations are expected to bound each
/// call with a timeout. No retries: failures propagate immediately.
#[async_trait]
pub trait GenerationCapability: Send + Sync {
    /// Returns free-form completion text for the given prompts.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::GenerationError` on capability failure.
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String>;

    /// Returns a completion constrained to the [`QuestionsAnswers`] schema:
    /// two parallel lists of strings.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::GenerationError` on capability failure, or
    /// `QuizError::SchemaParseError` when the response does not match the
    /// declared schema.
    async fn complete_structured(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<QuestionsAnswers>;
}

/// The structured-output schema shared by all question-generating calls:
/// two parallel lists of equal intended length.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionsAnswers {
    /// Generated question texts.
    pub questions: Vec<String>,
    /// Right answers, index-aligned with `questions`.
    pub answers: Vec<String>,
}

impl QuestionsAnswers {
    /// Creates a new `QuestionsAnswers` from parallel lists.
    #[must_use]
    pub const fn new(questions: Vec<String>, answers: Vec<String>) -> Self {
        Self { questions, answers }
    }

    /// Returns `true` if both lists are empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty() && self.answers.is_empty()
    }
}
