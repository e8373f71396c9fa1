//! Configuration types for Snapquiz.
//!
//! This module provides the configuration structure used to control quiz
//! generation: model selection, batch sizes for primary and follow-up
//! questions, sampling temperature, and the per-request timeout applied
//! to every capability call.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{QuizError, Result};

/// The default config file name.
const CONFIG_FILE_NAME: &str = "quiz.json";

/// Default chat model for question, feedback, and report generation.
fn default_model() -> String {
    "mistral-large-latest".to_string()
}

/// Default OCR model for document text extraction.
fn default_ocr_model() -> String {
    "mistral-ocr-latest".to_string()
}

/// Default number of questions in a primary batch.
const fn default_question_count() -> usize {
    4
}

/// Default number of questions in a follow-up batch.
const fn default_follow_up_count() -> usize {
    5
}

/// Default sampling temperature for generation calls.
///
/// Non-zero on purpose: questions should vary between sessions while
/// staying controllable.
const fn default_temperature() -> f32 {
    0.7
}

/// Default timeout in seconds for each capability request.
const fn default_request_timeout() -> u64 {
    60
}

/// Main configuration for Snapquiz.
///
/// Loaded from `quiz.json`; every field has a default so an empty or
/// missing file yields a working configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Chat model used for all generation calls.
    #[serde(default = "default_model")]
    pub model: String,

    /// OCR model used for document text extraction.
    #[serde(default = "default_ocr_model")]
    pub ocr_model: String,

    /// Number of questions generated per primary batch.
    #[serde(default = "default_question_count")]
    pub question_count: usize,

    /// Number of questions generated per follow-up batch.
    #[serde(default = "default_follow_up_count")]
    pub follow_up_count: usize,

    /// Sampling temperature for all generation calls.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Timeout in seconds applied to each capability request.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: default_model(),
            ocr_model: default_ocr_model(),
            question_count: default_question_count(),
            follow_up_count: default_follow_up_count(),
            temperature: default_temperature(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Config {
    /// Loads configuration from the current working directory.
    ///
    /// Looks for `quiz.json` in the current directory. If found, loads and
    /// validates the configuration. If not found, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but contains invalid JSON.
    pub fn load() -> Result<Self> {
        let current_dir = std::env::current_dir().map_err(|e| {
            QuizError::config_parse(
                "<current directory>",
                format!("cannot determine current directory: {e}"),
            )
        })?;
        Self::load_from_dir(&current_dir)
    }

    /// Loads configuration from a specific directory.
    ///
    /// # Errors
    ///
    /// Returns an error if `quiz.json` exists in the directory but contains
    /// invalid JSON.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let config_path = dir.join(CONFIG_FILE_NAME);
        Self::load_from_file(&config_path)
    }

    /// Loads configuration from a specific file path.
    ///
    /// If the file does not exist, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::ConfigParseError` if the file exists but contains
    /// invalid JSON.
    ///
    /// Returns `QuizError::ConfigValidationError` if the configuration values
    /// are invalid (e.g., zero question count, zero temperature).
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = Self::default();
                config.validate()?;
                return Ok(config);
            }
            Err(e) => {
                return Err(QuizError::config_parse(
                    path,
                    format!("failed to read file: {e}"),
                ));
            }
        };

        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| QuizError::config_parse(path, e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::ConfigValidationError` if any validation check
    /// fails.
    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(QuizError::config_validation(
                "model must not be empty",
                "Provide a chat model name in your quiz.json",
            ));
        }

        if self.ocr_model.trim().is_empty() {
            return Err(QuizError::config_validation(
                "ocrModel must not be empty",
                "Provide an OCR model name in your quiz.json",
            ));
        }

        if self.question_count == 0 {
            return Err(QuizError::config_validation(
                "questionCount must be greater than 0",
                "Set questionCount to at least 1 in your quiz.json",
            ));
        }

        if self.follow_up_count == 0 {
            return Err(QuizError::config_validation(
                "followUpCount must be greater than 0",
                "Set followUpCount to at least 1 in your quiz.json",
            ));
        }

        if self.temperature <= 0.0 {
            return Err(QuizError::config_validation(
                "temperature must be greater than 0",
                "Set temperature to a value above 0 (for example 0.7) in your quiz.json",
            ));
        }

        if self.request_timeout_secs == 0 {
            return Err(QuizError::config_validation(
                "requestTimeoutSecs must be greater than 0",
                "Set requestTimeoutSecs to at least 1 second in your quiz.json",
            ));
        }

        Ok(())
    }
}
