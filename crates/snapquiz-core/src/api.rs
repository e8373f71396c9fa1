//! HTTP API endpoints for the Snapquiz server.
//!
//! This module provides the REST API used by the web client to run a quiz:
//! create a session, ingest document images, pull questions, submit answers,
//! and fetch the final report.
//!
//! # Endpoints
//!
//! - `POST /api/sessions` - Create a new quiz session
//! - `POST /api/sessions/:id/documents` - Ingest document images
//! - `GET /api/sessions/:id/question` - Serve the next question
//! - `GET /api/sessions/:id/follow-up` - Serve the next follow-up question
//! - `POST /api/sessions/:id/answer` - Submit an answer, receive feedback
//! - `GET /api/sessions/:id/report` - Generate the performance report
//!
//! Sessions live in an in-memory map keyed by id. The map lock is held only
//! long enough to clone the session handle, never across a capability call,
//! so one slow generation cannot stall unrelated sessions.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::capability::{GenerationCapability, TextExtraction};
use crate::config::Config;
use crate::error::QuizError;
use crate::generator::QuizGenerator;
use crate::session::Session;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Response body for session creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionResponse {
    /// Identifier of the newly created session.
    pub session_id: Uuid,
}

/// Request body for document ingestion.
#[derive(Debug, Clone, Deserialize)]
pub struct IngestRequest {
    /// Base64-encoded document images, in page order.
    pub images: Vec<String>,
}

/// Response body for document ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestResponse {
    /// Number of pages ingested by this call.
    pub pages: usize,
}

/// Response body carrying a served question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionResponse {
    /// The question text to show the user.
    pub question: String,
}

/// Request body for answer submission.
#[derive(Debug, Clone, Deserialize)]
pub struct AnswerRequest {
    /// The user's answer to the question currently being served.
    pub answer: String,
}

/// Response body for answer submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerResponse {
    /// Feedback on the submitted answer.
    pub feedback: String,
}

/// Response body for the performance report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportResponse {
    /// The generated performance report.
    pub report: String,
}

/// Error response body returned on failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Description of the error.
    pub error: String,
}

// ============================================================================
// Application State
// ============================================================================

/// Shared application state for the HTTP server.
///
/// Holds the configuration, the session map, and the capability handles
/// shared by every session.
#[derive(Clone)]
pub struct AppState {
    /// Configuration for the quiz server.
    pub config: Config,
    /// All live sessions, keyed by id.
    pub sessions: Arc<Mutex<HashMap<Uuid, Arc<Mutex<Session>>>>>,
    /// Shared quiz generator over the generation capability.
    pub generator: Arc<QuizGenerator>,
    /// Shared text extraction capability.
    pub extractor: Arc<dyn TextExtraction>,
}

impl AppState {
    /// Creates a new `AppState` with an empty session map.
    #[must_use]
    pub fn new(
        config: Config,
        generation: Arc<dyn GenerationCapability>,
        extractor: Arc<dyn TextExtraction>,
    ) -> Self {
        let generator = Arc::new(QuizGenerator::new(generation, config.temperature));
        Self {
            config,
            sessions: Arc::new(Mutex::new(HashMap::new())),
            generator,
            extractor,
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// API Error Type
// ============================================================================

/// Internal error type for API handlers.
#[derive(Debug)]
enum ApiError {
    /// No session exists with the requested id.
    SessionNotFound(Uuid),
    /// A quiz operation failed.
    Quiz(QuizError),
}

impl From<QuizError> for ApiError {
    fn from(err: QuizError) -> Self {
        Self::Quiz(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::SessionNotFound(id) => {
                (StatusCode::NOT_FOUND, format!("No session with id {id}"))
            }
            Self::Quiz(err) => {
                let status = match &err {
                    QuizError::EmptyCorpus
                    | QuizError::NoAnsweredQuestions
                    | QuizError::NoActiveQuestion => StatusCode::CONFLICT,
                    e if e.is_capability_failure() => StatusCode::BAD_GATEWAY,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, err.to_string())
            }
        };

        let body = Json(ErrorResponse { error: message });
        (status, body).into_response()
    }
}

// ============================================================================
// Router Setup
// ============================================================================

/// Creates the HTTP router with all API endpoints.
///
/// # Returns
///
/// An axum `Router` configured with:
/// - All API routes under `/api`
/// - CORS middleware for development
/// - Tracing middleware for request logging
pub fn create_router(state: AppState) -> Router {
    // Configure CORS for development (allow all origins)
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build the API routes
    let api_routes = Router::new()
        .route("/sessions", post(handle_create_session))
        .route("/sessions/:id/documents", post(handle_add_documents))
        .route("/sessions/:id/question", get(handle_next_question))
        .route("/sessions/:id/follow-up", get(handle_next_followup))
        .route("/sessions/:id/answer", post(handle_submit_answer))
        .route("/sessions/:id/report", get(handle_report));

    // Combine with state and middleware
    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(Arc::new(state))
}

/// Looks up a session handle, holding the map lock only for the clone.
async fn session_handle(
    state: &AppState,
    id: Uuid,
) -> Result<Arc<Mutex<Session>>, ApiError> {
    let sessions = state.sessions.lock().await;
    sessions
        .get(&id)
        .cloned()
        .ok_or(ApiError::SessionNotFound(id))
}

// ============================================================================
// Handlers
// ============================================================================

/// Handler for `POST /api/sessions`.
///
/// Creates a fresh session and returns its id.
async fn handle_create_session(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<CreateSessionResponse>) {
    let session = Session::new(
        Arc::clone(&state.generator),
        Arc::clone(&state.extractor),
        &state.config,
    );
    let session_id = session.id();

    state
        .sessions
        .lock()
        .await
        .insert(session_id, Arc::new(Mutex::new(session)));

    info!(%session_id, "Created session");

    (
        StatusCode::CREATED,
        Json(CreateSessionResponse { session_id }),
    )
}

/// Handler for `POST /api/sessions/:id/documents`.
///
/// Ingests a batch of document images, all-or-nothing.
async fn handle_add_documents(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(request): Json<IngestRequest>,
) -> Result<Json<IngestResponse>, ApiError> {
    let handle = session_handle(&state, id).await?;
    let mut session = handle.lock().await;

    let pages = session.add_documents(request.images).await.map_err(|e| {
        warn!(session_id = %id, error = %e, "Document ingestion failed");
        e
    })?;

    Ok(Json(IngestResponse { pages }))
}

/// Handler for `GET /api/sessions/:id/question`.
///
/// Serves the question at the head of the active queue, generating the
/// primary batch first when needed.
async fn handle_next_question(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<QuestionResponse>, ApiError> {
    let handle = session_handle(&state, id).await?;
    let mut session = handle.lock().await;

    let question = session.next_question().await?;
    Ok(Json(QuestionResponse { question }))
}

/// Handler for `GET /api/sessions/:id/follow-up`.
///
/// Serves the next follow-up question, generating a batch from the answered
/// history when the follow-up queue is empty.
async fn handle_next_followup(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<QuestionResponse>, ApiError> {
    let handle = session_handle(&state, id).await?;
    let mut session = handle.lock().await;

    let question = session.next_followup_question().await?;
    Ok(Json(QuestionResponse { question }))
}

/// Handler for `POST /api/sessions/:id/answer`.
///
/// Grades the answer against the question currently being served.
async fn handle_submit_answer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(request): Json<AnswerRequest>,
) -> Result<Json<AnswerResponse>, ApiError> {
    let handle = session_handle(&state, id).await?;
    let mut session = handle.lock().await;

    let feedback = session.submit_answer(request.answer).await?;

    info!(
        session_id = %id,
        answered = session.answered_records().len(),
        "Answer recorded"
    );

    Ok(Json(AnswerResponse { feedback }))
}

/// Handler for `GET /api/sessions/:id/report`.
///
/// Generates the performance report. Requires at least one answered
/// question.
async fn handle_report(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ReportResponse>, ApiError> {
    let handle = session_handle(&state, id).await?;
    let session = handle.lock().await;

    if session.answered_records().is_empty() {
        return Err(ApiError::Quiz(QuizError::NoAnsweredQuestions));
    }

    let report = session.generate_report().await?;
    Ok(Json(ReportResponse { report }))
}

// ============================================================================
// Tests
// ============================================================================
