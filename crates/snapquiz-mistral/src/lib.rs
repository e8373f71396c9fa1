//! Mistral API adapter for Snapquiz.
//!
//! Implements the core capability traits over the Mistral REST API:
//! chat completions (free text and JSON-schema structured output) back the
//! generation capability, and the OCR endpoint backs text extraction.
//!
//! The adapter performs no retries: every call is at-most-once, bounded by
//! the configured request timeout, and failures propagate to the caller
//! classified by [`snapquiz_core::GenerationErrorKind`].

pub mod client;

pub use client::MistralClient;
