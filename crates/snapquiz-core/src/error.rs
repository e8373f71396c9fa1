//! Error types for the Snapquiz core.
//!
//! This module defines the error hierarchy for all quiz operations,
//! including configuration loading, document text extraction, question
//! generation, and session state preconditions.

use std::path::PathBuf;

/// A specialized `Result` type for Snapquiz operations.
pub type Result<T> = std::result::Result<T, QuizError>;

/// Errors that can occur while running a quiz session.
///
/// Error variants are organized by subsystem and include actionable suggestions
/// where possible to help users resolve issues.
#[derive(Debug, thiserror::Error)]
pub enum QuizError {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Invalid JSON syntax in configuration file.
    #[error("Invalid JSON in config file '{path}': {message}\n\nSuggestion: Validate your quiz.json with a JSON linter")]
    ConfigParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Description of the parse error.
        message: String,
    },

    /// Configuration validation failed.
    #[error("Invalid configuration: {message}\n\nSuggestion: {suggestion}")]
    ConfigValidationError {
        /// Description of the validation failure.
        message: String,
        /// Actionable suggestion for the user.
        suggestion: String,
    },

    // ========================================================================
    // Extraction Errors
    // ========================================================================
    /// Text extraction failed for an ingested document image.
    ///
    /// Fatal for the add-document call that triggered it; when a batch is
    /// being ingested, no document from the batch is kept.
    #[error("Text extraction failed for page {page}: {message}\n\nSuggestion: Check that the image is a readable scan and the OCR service is reachable")]
    ExtractionError {
        /// 1-based index of the failing image within the ingest call.
        page: usize,
        /// Description of the extraction failure.
        message: String,
    },

    // ========================================================================
    // Generation Errors
    // ========================================================================
    /// The generation capability failed or returned unusable content.
    ///
    /// Fatal for the triggering operation; no automatic retry.
    #[error("Generation failed ({kind}): {message}\n\nSuggestion: {suggestion}")]
    GenerationError {
        /// The kind of capability error (rate limit, authentication, etc.).
        kind: GenerationErrorKind,
        /// Detailed error message from the capability.
        message: String,
        /// Actionable suggestion for the user.
        suggestion: String,
    },

    /// A structured response did not conform to the expected shape.
    ///
    /// Treated as a generation failure at the session boundary.
    #[error("Structured response did not match the expected schema: {message}\n\nSuggestion: Retry the request; the model may have produced malformed output")]
    SchemaParseError {
        /// Description of the schema mismatch.
        message: String,
    },

    /// Generation succeeded but returned zero usable items when at least one
    /// was required.
    #[error("Generation returned no usable results\n\nSuggestion: Answer more questions or add more documents, then try again")]
    EmptyGenerationResult,

    // ========================================================================
    // Session Precondition Errors
    // ========================================================================
    /// Question generation was requested with zero ingested documents.
    #[error("No documents have been ingested for this session\n\nSuggestion: Add at least one document image before requesting questions")]
    EmptyCorpus,

    /// Follow-up generation was requested with zero prior answers.
    #[error("Follow-up questions require at least one answered question\n\nSuggestion: Answer a question first, then request follow-ups")]
    NoAnsweredQuestions,

    /// An answer was submitted while no question was being served.
    ///
    /// Caller contract violation: a next-question operation must precede
    /// every answer submission.
    #[error("No active question to answer\n\nSuggestion: Request the next question before submitting an answer")]
    NoActiveQuestion,

    /// Parallel history sequences passed to the generator had differing
    /// lengths.
    ///
    /// Caller contract violation: one entry per answered question is required
    /// in each of the question/answer/feedback sequences.
    #[error("History sequences have mismatched lengths: {questions} questions, {answers} answers, {feedback} feedback entries")]
    HistoryLengthMismatch {
        /// Number of prior questions supplied.
        questions: usize,
        /// Number of prior user answers supplied.
        answers: usize,
        /// Number of prior feedback entries supplied.
        feedback: usize,
    },

    // ========================================================================
    // General I/O Errors
    // ========================================================================
    /// General I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Categories of generation capability errors for structured error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationErrorKind {
    /// Authentication failure (invalid API key, expired credentials).
    Authentication,
    /// Rate limit exceeded.
    RateLimit,
    /// Server error (5xx responses).
    Server,
    /// Network connectivity issues.
    Network,
    /// The request exceeded the configured timeout.
    Timeout,
    /// Other unclassified errors.
    Other,
}

impl std::fmt::Display for GenerationErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Authentication => write!(f, "authentication"),
            Self::RateLimit => write!(f, "rate_limit"),
            Self::Server => write!(f, "server"),
            Self::Network => write!(f, "network"),
            Self::Timeout => write!(f, "timeout"),
            Self::Other => write!(f, "other"),
        }
    }
}

impl GenerationErrorKind {
    /// Returns a suggestion message for this error kind.
    #[must_use]
    pub const fn suggestion(&self) -> &'static str {
        match self {
            Self::Authentication => "Check your API key or credentials",
            Self::RateLimit => "Wait and retry, or reduce request frequency",
            Self::Server => "Retry later; the model service may be experiencing issues",
            Self::Network => "Check your network connection",
            Self::Timeout => "Retry, or raise requestTimeoutSecs in your quiz.json",
            Self::Other => "Check the model provider's status page",
        }
    }
}

impl QuizError {
    /// Creates a new `ConfigParseError` with the given path and message.
    #[must_use]
    pub fn config_parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ConfigParseError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new `ConfigValidationError` with the given message and suggestion.
    #[must_use]
    pub fn config_validation(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::ConfigValidationError {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Creates a new `ExtractionError` for the given 1-based page index.
    #[must_use]
    pub fn extraction(page: usize, message: impl Into<String>) -> Self {
        Self::ExtractionError {
            page,
            message: message.into(),
        }
    }

    /// Creates a new `GenerationError` with automatic suggestion based on error kind.
    #[must_use]
    pub fn generation(kind: GenerationErrorKind, message: impl Into<String>) -> Self {
        let suggestion = kind.suggestion().to_string();
        Self::GenerationError {
            kind,
            message: message.into(),
            suggestion,
        }
    }

    /// Creates a new `SchemaParseError`.
    #[must_use]
    pub fn schema_parse(message: impl Into<String>) -> Self {
        Self::SchemaParseError {
            message: message.into(),
        }
    }

    /// Creates a new `HistoryLengthMismatch` error.
    #[must_use]
    pub const fn history_mismatch(questions: usize, answers: usize, feedback: usize) -> Self {
        Self::HistoryLengthMismatch {
            questions,
            answers,
            feedback,
        }
    }

    /// Returns `true` if this error is a caller contract violation rather
    /// than a runtime/data failure.
    #[must_use]
    pub const fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::NoActiveQuestion | Self::HistoryLengthMismatch { .. }
        )
    }

    /// Returns `true` if this error originated in an external capability
    /// (extraction or generation) rather than in session state.
    #[must_use]
    pub const fn is_capability_failure(&self) -> bool {
        matches!(
            self,
            Self::ExtractionError { .. }
                | Self::GenerationError { .. }
                | Self::SchemaParseError { .. }
                | Self::EmptyGenerationResult
        )
    }
}
