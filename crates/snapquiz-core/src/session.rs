//! Per-user quiz session state machine.
//!
//! A [`Session`] owns everything belonging to one user's quiz run: the
//! ingested documents, the cached corpus text, the two question queues,
//! and the append-only answer history. Sessions are not internally
//! thread-safe; callers serialize access per session (the HTTP layer
//! wraps each one in a `tokio::sync::Mutex`). Different sessions are
//! fully independent.
//!
//! Queue discipline: both queues are strict FIFO, and whenever the
//! follow-up queue is non-empty it takes priority over the primary queue
//! in both the read path ([`Session::next_question`]) and the write path
//! ([`Session::submit_answer`]). An answer is therefore always attributed
//! to the question most recently served.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::capability::TextExtraction;
use crate::config::Config;
use crate::error::{QuizError, Result};
use crate::generator::QuizGenerator;

/// One ingested document image and the text extracted from it.
///
/// Extraction happens exactly once, at ingestion; the pair is immutable
/// afterwards.
#[derive(Debug, Clone)]
pub struct Document {
    /// The base64-encoded source image, kept as submitted.
    pub encoded_image: String,
    /// The text extracted from the image.
    pub extracted_text: String,
}

/// A generated question waiting to be served and answered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingQuestion {
    /// The question text shown to the user.
    pub question: String,
    /// The model-provided right answer, used when grading.
    pub right_answer: String,
}

/// One fully answered question: the question, both answers, and the
/// feedback given. Append-only; never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnsweredRecord {
    /// The question that was served.
    pub question: String,
    /// The right answer the grader compared against.
    pub right_answer: String,
    /// The answer the user submitted.
    pub user_answer: String,
    /// The feedback generated for the user's answer.
    pub feedback: String,
}

/// Aggregate root for one user's quiz run.
pub struct Session {
    id: Uuid,
    documents: Vec<Document>,
    corpus: Option<String>,
    primary_queue: VecDeque<PendingQuestion>,
    follow_up_queue: VecDeque<PendingQuestion>,
    answered: Vec<AnsweredRecord>,
    generator: Arc<QuizGenerator>,
    extractor: Arc<dyn TextExtraction>,
    question_count: usize,
    follow_up_count: usize,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Session {
    /// Creates an empty session with a fresh random identifier.
    ///
    /// Batch sizes come from the configuration; the capability handles are
    /// shared across sessions.
    #[must_use]
    pub fn new(
        generator: Arc<QuizGenerator>,
        extractor: Arc<dyn TextExtraction>,
        config: &Config,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            documents: Vec::new(),
            corpus: None,
            primary_queue: VecDeque::new(),
            follow_up_queue: VecDeque::new(),
            answered: Vec::new(),
            generator,
            extractor,
            question_count: config.question_count,
            follow_up_count: config.follow_up_count,
            created_at: now,
            updated_at: now,
        }
    }

    /// The session identifier.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Number of documents ingested so far.
    #[must_use]
    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    /// The answered history, in answer order.
    #[must_use]
    pub fn answered_records(&self) -> &[AnsweredRecord] {
        &self.answered
    }

    /// Creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Timestamp of the last state change.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Extracts text from one encoded image and appends the document.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::ExtractionError` when extraction fails; the
    /// session is left unchanged in that case.
    pub async fn add_document(&mut self, encoded_image: String) -> Result<()> {
        let extracted_text = self
            .extractor
            .extract(&encoded_image)
            .await
            .map_err(|e| match e {
                err @ QuizError::ExtractionError { .. } => err,
                other => QuizError::extraction(1, other.to_string()),
            })?;

        debug!(
            session_id = %self.id,
            chars = extracted_text.len(),
            "Extracted document text"
        );

        self.documents.push(Document {
            encoded_image,
            extracted_text,
        });
        self.touch();
        Ok(())
    }

    /// Extracts and appends a batch of encoded images, all-or-nothing.
    ///
    /// Every image is extracted first, in input order; documents are
    /// committed only once the whole batch has succeeded.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::ExtractionError` carrying the 1-based index of
    /// the first failing image; the session is left unchanged.
    pub async fn add_documents(&mut self, encoded_images: Vec<String>) -> Result<usize> {
        let mut extracted = Vec::with_capacity(encoded_images.len());
        for (index, encoded_image) in encoded_images.into_iter().enumerate() {
            let text = self
                .extractor
                .extract(&encoded_image)
                .await
                .map_err(|e| match e {
                    QuizError::ExtractionError { message, .. } => {
                        QuizError::extraction(index + 1, message)
                    }
                    other => QuizError::extraction(index + 1, other.to_string()),
                })?;
            extracted.push(Document {
                encoded_image,
                extracted_text: text,
            });
        }

        let pages = extracted.len();
        self.documents.extend(extracted);
        self.touch();

        info!(session_id = %self.id, pages, "Ingested document batch");
        Ok(pages)
    }

    /// Returns the corpus text, building and caching it on first demand.
    ///
    /// Each document contributes a 1-based `Page N:` header followed by its
    /// extracted text and a blank line. Once built, the cache is never
    /// recomputed.
    fn corpus_text(&mut self) -> String {
        if self.corpus.is_none() {
            let built: String = self
                .documents
                .iter()
                .enumerate()
                .map(|(i, doc)| format!("Page {}:\n{}\n\n", i + 1, doc.extracted_text))
                .collect();
            self.corpus = Some(built);
        }
        self.corpus.clone().unwrap_or_default()
    }

    /// Serves the question at the head of the active queue.
    ///
    /// The follow-up queue takes priority whenever it is non-empty. If both
    /// queues are empty, a primary batch is generated from the corpus and
    /// enqueued first. Repeated calls without an intervening
    /// [`Session::submit_answer`] return the same question and never invoke
    /// the capability again.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::EmptyCorpus` when no documents have been
    /// ingested, `QuizError::EmptyGenerationResult` when generation yields
    /// zero questions, or a generation error from the capability.
    pub async fn next_question(&mut self) -> Result<String> {
        if let Some(pending) = self.follow_up_queue.front() {
            return Ok(pending.question.clone());
        }
        if let Some(pending) = self.primary_queue.front() {
            return Ok(pending.question.clone());
        }

        if self.documents.is_empty() {
            return Err(QuizError::EmptyCorpus);
        }

        let corpus = self.corpus_text();
        let batch = self
            .generator
            .generate_questions(&corpus, self.question_count)
            .await?;
        if batch.is_empty() {
            return Err(QuizError::EmptyGenerationResult);
        }

        info!(
            session_id = %self.id,
            count = batch.len(),
            "Generated primary question batch"
        );

        self.primary_queue.extend(batch);
        self.touch();

        self.primary_queue
            .front()
            .map(|pending| pending.question.clone())
            .ok_or(QuizError::EmptyGenerationResult)
    }

    /// Serves the question at the head of the follow-up queue, generating
    /// a batch first when the queue is empty.
    ///
    /// Follow-ups are derived from the full answered history, so at least
    /// one answer must exist.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::NoAnsweredQuestions` when nothing has been
    /// answered yet, `QuizError::EmptyGenerationResult` when generation
    /// yields zero questions, or a generation error from the capability.
    pub async fn next_followup_question(&mut self) -> Result<String> {
        if let Some(pending) = self.follow_up_queue.front() {
            return Ok(pending.question.clone());
        }

        if self.answered.is_empty() {
            return Err(QuizError::NoAnsweredQuestions);
        }

        let corpus = self.corpus_text();
        let (questions, user_answers, feedback) = self.history_columns();
        let batch = self
            .generator
            .generate_follow_up_questions(
                &corpus,
                &questions,
                &user_answers,
                &feedback,
                self.follow_up_count,
            )
            .await?;
        if batch.is_empty() {
            return Err(QuizError::EmptyGenerationResult);
        }

        info!(
            session_id = %self.id,
            count = batch.len(),
            "Generated follow-up question batch"
        );

        self.follow_up_queue.extend(batch);
        self.touch();

        self.follow_up_queue
            .front()
            .map(|pending| pending.question.clone())
            .ok_or(QuizError::EmptyGenerationResult)
    }

    /// Grades `user_answer` against the question currently being served and
    /// returns the generated feedback.
    ///
    /// The active queue is the follow-up queue when non-empty, the primary
    /// queue otherwise. Feedback is generated first; only on success is the
    /// served question popped and exactly one [`AnsweredRecord`] appended.
    /// On failure the queues and history are untouched, so the same
    /// question is served again.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::NoActiveQuestion` when both queues are empty, or
    /// a generation error from the capability.
    pub async fn submit_answer(&mut self, user_answer: String) -> Result<String> {
        let from_follow_up = !self.follow_up_queue.is_empty();
        let active = if from_follow_up {
            self.follow_up_queue.front()
        } else {
            self.primary_queue.front()
        };

        let Some(pending) = active.cloned() else {
            return Err(QuizError::NoActiveQuestion);
        };

        let corpus = self.corpus_text();
        let feedback = self
            .generator
            .generate_feedback(&corpus, &pending.question, &pending.right_answer, &user_answer)
            .await?;

        if from_follow_up {
            self.follow_up_queue.pop_front();
        } else {
            self.primary_queue.pop_front();
        }

        self.answered.push(AnsweredRecord {
            question: pending.question,
            right_answer: pending.right_answer,
            user_answer,
            feedback: feedback.clone(),
        });
        self.touch();

        debug!(
            session_id = %self.id,
            answered = self.answered.len(),
            from_follow_up,
            "Recorded answer"
        );

        Ok(feedback)
    }

    /// The user's answers so far, in answer order.
    ///
    /// A derived view over the answered history; nothing is stored for it.
    #[must_use]
    pub fn previous_answers(&self) -> Vec<String> {
        self.answered
            .iter()
            .map(|record| record.user_answer.clone())
            .collect()
    }

    /// Generates a performance report over the full answered history.
    ///
    /// # Errors
    ///
    /// Returns a generation error from the capability. Callers that require
    /// at least one answer enforce that before calling.
    pub async fn generate_report(&self) -> Result<String> {
        let (questions, user_answers, feedback) = self.history_columns();
        self.generator
            .generate_report(&questions, &user_answers, &feedback)
            .await
    }

    /// Decomposes the answered history into parallel column vectors.
    fn history_columns(&self) -> (Vec<String>, Vec<String>, Vec<String>) {
        let questions = self
            .answered
            .iter()
            .map(|record| record.question.clone())
            .collect();
        let user_answers = self
            .answered
            .iter()
            .map(|record| record.user_answer.clone())
            .collect();
        let feedback = self
            .answered
            .iter()
            .map(|record| record.feedback.clone())
            .collect();
        (questions, user_answers, feedback)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("documents", &self.documents.len())
            .field("primary_queue", &self.primary_queue.len())
            .field("follow_up_queue", &self.follow_up_queue.len())
            .field("answered", &self.answered.len())
            .finish_non_exhaustive()
    }
}
