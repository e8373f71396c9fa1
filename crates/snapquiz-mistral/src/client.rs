//! HTTP client for the Mistral API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use snapquiz_core::{
    Config, GenerationCapability, GenerationErrorKind, QuestionsAnswers, QuizError, Result,
    TextExtraction,
};

/// Environment variable holding the Mistral API key.
pub const API_KEY_ENV: &str = "MISTRAL_API_KEY";

/// Default base URL for the Mistral API.
const DEFAULT_BASE_URL: &str = "https://api.mistral.ai";

// ============================================================================
// Wire Types
// ============================================================================

/// Request body for `/v1/chat/completions`.
#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<serde_json::Value>,
}

/// One chat message.
#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

/// Response body for `/v1/chat/completions`.
#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}

/// Request body for `/v1/ocr`.
#[derive(Debug, Serialize)]
struct OcrRequest {
    model: String,
    document: OcrDocument,
}

#[derive(Debug, Serialize)]
struct OcrDocument {
    #[serde(rename = "type")]
    kind: &'static str,
    image_url: String,
}

/// Response body for `/v1/ocr`.
#[derive(Debug, Deserialize)]
struct OcrResponse {
    pages: Vec<OcrPage>,
}

#[derive(Debug, Deserialize)]
struct OcrPage {
    markdown: String,
}

// ============================================================================
// Client
// ============================================================================

/// Mistral API client implementing both Snapquiz capability traits.
#[derive(Debug, Clone)]
pub struct MistralClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    ocr_model: String,
}

impl MistralClient {
    /// Creates a client from the configuration and an explicit API key.
    ///
    /// Every request is bounded by the configured timeout.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::ConfigValidationError` when the API key is blank,
    /// or a generation error when the HTTP client cannot be constructed.
    pub fn new(config: &Config, api_key: String) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(QuizError::config_validation(
                "Mistral API key must not be empty",
                format!("Set the {API_KEY_ENV} environment variable"),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| {
                QuizError::generation(
                    GenerationErrorKind::Other,
                    format!("failed to build HTTP client: {e}"),
                )
            })?;

        Ok(Self {
            client,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: config.model.clone(),
            ocr_model: config.ocr_model.clone(),
        })
    }

    /// Creates a client reading the API key from `MISTRAL_API_KEY`.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::ConfigValidationError` when the variable is
    /// unset or blank.
    pub fn from_env(config: &Config) -> Result<Self> {
        let api_key = std::env::var(API_KEY_ENV).map_err(|_| {
            QuizError::config_validation(
                format!("{API_KEY_ENV} is not set"),
                format!("Export {API_KEY_ENV} with your Mistral API key"),
            )
        })?;
        Self::new(config, api_key)
    }

    /// Overrides the API base URL. Used to point the client at a stub
    /// server in tests.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn chat(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        temperature: f32,
        max_tokens: u32,
        response_format: Option<serde_json::Value>,
    ) -> Result<String> {
        let url = format!(
            "{}/v1/chat/completions",
            self.base_url.trim_end_matches('/')
        );
        let payload = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt.to_string(),
                },
            ],
            temperature,
            max_tokens,
            response_format,
        };

        debug!(model = %self.model, max_tokens, "Sending chat completion request");

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(QuizError::generation(
                classify_status(status),
                format!("chat completion returned {status}: {detail}"),
            ));
        }

        let body: ChatResponse = response.json().await.map_err(transport_error)?;
        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();

        if content.trim().is_empty() {
            return Err(QuizError::generation(
                GenerationErrorKind::Other,
                "chat completion returned empty content",
            ));
        }

        Ok(content)
    }
}

#[async_trait]
impl GenerationCapability for MistralClient {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String> {
        self.chat(system_prompt, user_prompt, temperature, max_tokens, None)
            .await
    }

    async fn complete_structured(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<QuestionsAnswers> {
        let content = self
            .chat(
                system_prompt,
                user_prompt,
                temperature,
                max_tokens,
                Some(questions_answers_format()),
            )
            .await?;

        serde_json::from_str(&content)
            .map_err(|e| QuizError::schema_parse(format!("invalid structured content: {e}")))
    }
}

#[async_trait]
impl TextExtraction for MistralClient {
    async fn extract(&self, encoded_image: &str) -> Result<String> {
        let url = format!("{}/v1/ocr", self.base_url.trim_end_matches('/'));
        let payload = OcrRequest {
            model: self.ocr_model.clone(),
            document: OcrDocument {
                kind: "image_url",
                image_url: to_data_uri(encoded_image),
            },
        };

        debug!(model = %self.ocr_model, "Sending OCR request");

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| QuizError::extraction(1, format!("OCR request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(QuizError::extraction(
                1,
                format!("OCR returned {status}: {detail}"),
            ));
        }

        let body: OcrResponse = response
            .json()
            .await
            .map_err(|e| QuizError::extraction(1, format!("invalid OCR response: {e}")))?;

        let text = body
            .pages
            .into_iter()
            .map(|page| page.markdown)
            .collect::<Vec<_>>()
            .join("\n");

        Ok(text)
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// JSON-schema response format constraining output to two parallel string
/// lists.
fn questions_answers_format() -> serde_json::Value {
    serde_json::json!({
        "type": "json_schema",
        "json_schema": {
            "name": "questions_answers",
            "schema": {
                "type": "object",
                "properties": {
                    "questions": {"type": "array", "items": {"type": "string"}},
                    "answers": {"type": "array", "items": {"type": "string"}}
                },
                "required": ["questions", "answers"],
                "additionalProperties": false
            },
            "strict": true
        }
    })
}

/// Normalizes a base64 image into the data URI the OCR endpoint expects.
///
/// Inputs arriving from the web client may already carry a `data:` prefix.
fn to_data_uri(encoded_image: &str) -> String {
    if encoded_image.starts_with("data:") {
        encoded_image.to_string()
    } else {
        format!("data:image/jpeg;base64,{encoded_image}")
    }
}

/// Maps an HTTP status to a generation error kind.
fn classify_status(status: StatusCode) -> GenerationErrorKind {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => GenerationErrorKind::Authentication,
        StatusCode::TOO_MANY_REQUESTS => GenerationErrorKind::RateLimit,
        s if s.is_server_error() => GenerationErrorKind::Server,
        _ => GenerationErrorKind::Other,
    }
}

/// Maps a transport-level failure to a generation error.
fn transport_error(e: reqwest::Error) -> QuizError {
    let kind = if e.is_timeout() {
        GenerationErrorKind::Timeout
    } else if e.is_connect() {
        GenerationErrorKind::Network
    } else {
        GenerationErrorKind::Other
    };
    QuizError::generation(kind, e.to_string())
}
