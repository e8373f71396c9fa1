//! Quiz generation: prompt construction and model-output parsing.
//!
//! `QuizGenerator` is the single place where prompts are built and model
//! responses are turned into typed results. It holds one handle to the
//! generation capability and is otherwise stateless: every method is a
//! pure function of its arguments plus that handle. The session never
//! constructs prompts, only assembles the typed arguments.

use std::sync::Arc;

use tracing::debug;

use crate::capability::{GenerationCapability, QuestionsAnswers};
use crate::error::{GenerationErrorKind, QuizError, Result};
use crate::session::PendingQuestion;

/// Output ceiling for a primary question batch.
const QUESTION_MAX_TOKENS: u32 = 10_000;

/// Output ceiling for a follow-up question batch.
const FOLLOW_UP_MAX_TOKENS: u32 = 1_000;

/// Output ceiling for a single feedback sentence.
const FEEDBACK_MAX_TOKENS: u32 = 500;

/// Output ceiling for the performance report.
const REPORT_MAX_TOKENS: u32 = 300;

/// System prompt for primary question generation.
const QUESTION_SYSTEM_PROMPT: &str =
    "You are a teacher assistant that generates educational questions from a student's lessons.";

/// System prompt for follow-up question generation.
const FOLLOW_UP_SYSTEM_PROMPT: &str = "You are an educational AI that generates targeted \
     follow-up questions based on previous answers and feedback.";

/// System prompt for answer feedback.
const FEEDBACK_SYSTEM_PROMPT: &str = "You are a supportive teacher providing personalized, \
     encouraging feedback on answers. Always include the correct answer when the user's answer \
     is wrong.";

/// System prompt for the performance report.
const REPORT_SYSTEM_PROMPT: &str =
    "You are an educational AI that generates concise, actionable performance reports.";

/// Builds all model prompts and parses all model outputs.
///
/// Holds a single handle to the generation capability; the sampling
/// temperature is fixed at construction (non-zero, so output varies
/// between batches while staying controllable).
pub struct QuizGenerator {
    capability: Arc<dyn GenerationCapability>,
    temperature: f32,
}

impl QuizGenerator {
    /// Creates a new `QuizGenerator` over the given capability handle.
    #[must_use]
    pub fn new(capability: Arc<dyn GenerationCapability>, temperature: f32) -> Self {
        Self {
            capability,
            temperature,
        }
    }

    /// Generates up to `count` question/answer pairs testing comprehension
    /// of `corpus_text`.
    ///
    /// The result length is `min(count, available)`: the model returning
    /// fewer pairs than requested is not an error, the surplus request is
    /// simply unmet. Pairs are returned in model order.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::GenerationError` when the capability fails, or
    /// `QuizError::SchemaParseError` when the response lists have
    /// mismatched lengths.
    pub async fn generate_questions(
        &self,
        corpus_text: &str,
        count: usize,
    ) -> Result<Vec<PendingQuestion>> {
        let prompt = build_question_prompt(corpus_text, count);

        let response = self
            .capability
            .complete_structured(
                QUESTION_SYSTEM_PROMPT,
                &prompt,
                self.temperature,
                QUESTION_MAX_TOKENS,
            )
            .await?;

        debug!(
            requested = count,
            returned = response.questions.len(),
            "Generated primary questions"
        );

        pair_questions(response, count)
    }

    /// Generates up to `count` follow-up questions targeting the gaps
    /// implied by `prior_feedback`, building on `prior_user_answers`,
    /// grounded in `corpus_text`.
    ///
    /// The three history slices must have one entry per previously answered
    /// question, in answer order.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::HistoryLengthMismatch` when the history slices
    /// differ in length, `QuizError::GenerationError` when the capability
    /// fails, or `QuizError::SchemaParseError` on a malformed response.
    pub async fn generate_follow_up_questions(
        &self,
        corpus_text: &str,
        prior_questions: &[String],
        prior_user_answers: &[String],
        prior_feedback: &[String],
        count: usize,
    ) -> Result<Vec<PendingQuestion>> {
        check_history_lengths(prior_questions, prior_user_answers, prior_feedback)?;

        let qa_context = build_history_context(prior_questions, prior_user_answers, prior_feedback);
        let prompt = build_follow_up_prompt(corpus_text, &qa_context, count);

        let response = self
            .capability
            .complete_structured(
                FOLLOW_UP_SYSTEM_PROMPT,
                &prompt,
                self.temperature,
                FOLLOW_UP_MAX_TOKENS,
            )
            .await?;

        debug!(
            requested = count,
            returned = response.questions.len(),
            "Generated follow-up questions"
        );

        pair_questions(response, count)
    }

    /// Generates a single sentence of feedback for a user's answer.
    ///
    /// The prompt mandates second-person phrasing, an encouraging opener
    /// conditioned on correctness, and the correct answer whenever the
    /// user's answer is wrong or incomplete.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::GenerationError` when the capability fails or
    /// returns empty response content.
    pub async fn generate_feedback(
        &self,
        corpus_text: &str,
        question: &str,
        right_answer: &str,
        user_answer: &str,
    ) -> Result<String> {
        let prompt = build_feedback_prompt(corpus_text, question, right_answer, user_answer);

        let response = self
            .capability
            .complete(
                FEEDBACK_SYSTEM_PROMPT,
                &prompt,
                self.temperature,
                FEEDBACK_MAX_TOKENS,
            )
            .await?;

        let feedback = response.trim();
        if feedback.is_empty() {
            return Err(QuizError::generation(
                GenerationErrorKind::Other,
                "capability returned empty feedback content",
            ));
        }

        Ok(feedback.to_string())
    }

    /// Generates a short report summarizing overall performance, naming
    /// 2-3 improvement areas with actionable suggestions.
    ///
    /// The three input slices must have one entry per answered question,
    /// in answer order.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::HistoryLengthMismatch` when the input slices
    /// differ in length, or `QuizError::GenerationError` when the
    /// capability fails or returns empty content.
    pub async fn generate_report(
        &self,
        questions: &[String],
        user_answers: &[String],
        feedback: &[String],
    ) -> Result<String> {
        check_history_lengths(questions, user_answers, feedback)?;

        let qa_summary = build_history_context(questions, user_answers, feedback);
        let prompt = build_report_prompt(&qa_summary);

        let response = self
            .capability
            .complete(
                REPORT_SYSTEM_PROMPT,
                &prompt,
                self.temperature,
                REPORT_MAX_TOKENS,
            )
            .await?;

        let report = response.trim();
        if report.is_empty() {
            return Err(QuizError::generation(
                GenerationErrorKind::Other,
                "capability returned empty report content",
            ));
        }

        Ok(report.to_string())
    }
}

/// Validates that the three parallel history sequences have equal lengths.
fn check_history_lengths(
    questions: &[String],
    user_answers: &[String],
    feedback: &[String],
) -> Result<()> {
    if questions.len() != user_answers.len() || questions.len() != feedback.len() {
        return Err(QuizError::history_mismatch(
            questions.len(),
            user_answers.len(),
            feedback.len(),
        ));
    }
    Ok(())
}

/// Pairs the parallel response lists into `PendingQuestion`s, truncated to
/// `count`.
///
/// Mismatched list lengths indicate the model ignored the schema.
fn pair_questions(response: QuestionsAnswers, count: usize) -> Result<Vec<PendingQuestion>> {
    if response.questions.len() != response.answers.len() {
        return Err(QuizError::schema_parse(format!(
            "parallel lists have different lengths: {} questions, {} answers",
            response.questions.len(),
            response.answers.len()
        )));
    }

    Ok(response
        .questions
        .into_iter()
        .zip(response.answers)
        .take(count)
        .map(|(question, right_answer)| PendingQuestion {
            question,
            right_answer,
        })
        .collect())
}

/// Renders answered history as a `Q:/A:/Feedback:` block, one entry per
/// answered question.
fn build_history_context(questions: &[String], user_answers: &[String], feedback: &[String]) -> String {
    questions
        .iter()
        .zip(user_answers)
        .zip(feedback)
        .map(|((q, a), f)| format!("Q: {q}\nA: {a}\nFeedback: {f}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Builds the user prompt for primary question generation.
fn build_question_prompt(corpus_text: &str, count: usize) -> String {
    format!(
        "Based on the following text, generate {count} engaging and fun questions that test \
         understanding of the content.\n\
         Guidelines for questions:\n\
         - Make questions interactive and engaging. Add a bit of context to the questions.\n\
         - Use creative formats like:\n\
         \x20 * \"How would you explain...\" challenges\n\
         \x20 * \"Compare and contrast...\" analysis\n\
         \x20 * \"What is...\" or \"Define...\" questions\n\
         - Make questions feel like a conversation rather than a test\n\
         - Include questions that require critical thinking\n\
         - Use active and engaging language\n\
         - Make questions short and concise.\n\n\
         Return parallel lists of question and answer strings.\n\n\
         Text:\n{corpus_text}\n\n\
         Questions and answer pairs:"
    )
}

/// Builds the user prompt for follow-up question generation.
fn build_follow_up_prompt(corpus_text: &str, qa_context: &str, count: usize) -> String {
    format!(
        "Based on the following context, previous questions/answers, and feedback, generate \
         {count} follow-up questions and answers.\n\
         The questions should address the specific areas where the user needs improvement based \
         on the feedback.\n\
         Focus on generating questions that will help the user better understand the concepts \
         they struggled with.\n\n\
         Original text:\n{corpus_text}\n\n\
         Previous Q&A and Feedback:\n{qa_context}\n\n\
         Generate follow-up questions and answers that:\n\
         1. Address specific misconceptions or gaps identified in the feedback\n\
         2. Build upon the user's previous answers and the feedback given\n\
         3. Help clarify concepts that were not fully understood\n\
         4. Are more specific and targeted based on the feedback\n\n\
         Return parallel lists of question and answer strings."
    )
}

/// Builds the user prompt for answer feedback.
fn build_feedback_prompt(
    corpus_text: &str,
    question: &str,
    right_answer: &str,
    user_answer: &str,
) -> String {
    format!(
        "Give a one-sentence personalized feedback on the answer. Use \"you\" and \"your\" to \
         make it more personal.\n\
         If the answer is correct, start with an encouraging phrase like \"Well done!\", \
         \"Great job!\", or \"Let's go!\" before giving the feedback.\n\
         If the answer is incorrect or incomplete, start with an encouraging phrase like \
         \"No worries!\", \"Keep going!\", or \"You're getting there!\" before explaining what \
         was wrong.\n\
         Include a precise answer when the user's answer is incorrect or incomplete, but explain \
         shortly why the user's answer is wrong. Do not complicate the answer.\n\
         If the answer is correct but too detailed, suggest how to make it more concise.\n\n\
         Context:\n{corpus_text}\n\n\
         Question: {question}\n\
         Correct answer: {right_answer}\n\
         Your answer: {user_answer}\n\n\
         Keep it to one sentence and make it encouraging. If the answer is wrong, include the \
         correct answer:"
    )
}

/// Builds the user prompt for the performance report.
fn build_report_prompt(qa_summary: &str) -> String {
    format!(
        "Based on the following questions, answers, and feedback, generate a concise report \
         that:\n\
         1. Summarizes the user's overall performance\n\
         2. Identifies 2-3 specific areas where the user needs improvement\n\
         3. Provides brief, actionable suggestions for improvement\n\n\
         Keep the report short and focused on actionable insights.\n\n\
         Questions and Answers:\n{qa_summary}\n\n\
         Generate a concise report:"
    )
}
