//! Core library for Snapquiz, an adaptive quiz generator for scanned
//! documents.
//!
//! This crate contains the session state machine and the contracts of every
//! AI-backed operation:
//!
//! - **Session state machine** ([`Session`]) - document ingestion, FIFO
//!   question queues with follow-up priority, append-only answer history
//! - **Quiz generator** ([`QuizGenerator`]) - prompt construction and
//!   model-output parsing for questions, follow-ups, feedback, and reports
//! - **Capability traits** ([`TextExtraction`], [`GenerationCapability`]) -
//!   the injected seams behind which OCR and language-model providers live
//! - **HTTP API** ([`create_router`]) - the REST surface the web client
//!   drives a quiz through
//! - **Configuration** ([`Config`]) - `quiz.json` loading and validation
//! - **Error handling** ([`QuizError`]) - the error hierarchy shared by all
//!   of the above
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use snapquiz_core::{AppState, Config, create_router};
//! # use snapquiz_core::{GenerationCapability, TextExtraction};
//!
//! # async fn example(
//! #     generation: Arc<dyn GenerationCapability>,
//! #     extractor: Arc<dyn TextExtraction>,
//! # ) {
//! let config = Config::load().unwrap();
//! let state = AppState::new(config, generation, extractor);
//! let router = create_router(state);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
//! axum::serve(listener, router).await.unwrap();
//! # }
//! ```

pub mod api;
pub mod capability;
pub mod config;
pub mod error;
pub mod generator;
pub mod session;

pub use api::{AppState, create_router};
pub use capability::{GenerationCapability, QuestionsAnswers, TextExtraction};
pub use config::Config;
pub use error::{GenerationErrorKind, QuizError, Result};
pub use generator::QuizGenerator;
pub use session::{AnsweredRecord, Document, PendingQuestion, Session};
