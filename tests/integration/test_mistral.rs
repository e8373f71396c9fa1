//! Integration tests for the Mistral adapter.
//!
//! These tests point `MistralClient` at a local stub server that mimics the
//! Mistral REST API, covering the request shapes on the way out, the
//! response parsing on the way back, and the error classification for each
//! failure mode.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use snapquiz_core::{
    Config, GenerationCapability, GenerationErrorKind, QuizError, TextExtraction,
};
use snapquiz_mistral::MistralClient;

/// How the stub server should behave for the next request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StubMode {
    /// Respond normally.
    Ok,
    /// Respond 401.
    Unauthorized,
    /// Respond 429.
    RateLimited,
    /// Respond 500.
    ServerError,
    /// Sleep past the client timeout before responding.
    Slow,
    /// Return content that does not match the structured schema.
    MalformedStructured,
}

struct StubState {
    mode: Mutex<StubMode>,
    last_chat_body: Mutex<Option<serde_json::Value>>,
    last_ocr_body: Mutex<Option<serde_json::Value>>,
}

impl StubState {
    fn set_mode(&self, mode: StubMode) {
        *self.mode.lock().expect("lock poisoned") = mode;
    }

    fn last_chat_body(&self) -> serde_json::Value {
        self.last_chat_body
            .lock()
            .expect("lock poisoned")
            .clone()
            .expect("No chat request recorded")
    }

    fn last_ocr_body(&self) -> serde_json::Value {
        self.last_ocr_body
            .lock()
            .expect("lock poisoned")
            .clone()
            .expect("No OCR request recorded")
    }
}

async fn stub_chat(
    State(state): State<Arc<StubState>>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> impl IntoResponse {
    *state.last_chat_body.lock().expect("lock poisoned") = Some(body.clone());

    let mode = *state.mode.lock().expect("lock poisoned");
    match mode {
        StubMode::Unauthorized => {
            return (StatusCode::UNAUTHORIZED, "invalid api key").into_response();
        }
        StubMode::RateLimited => {
            return (StatusCode::TOO_MANY_REQUESTS, "slow down").into_response();
        }
        StubMode::ServerError => {
            return (StatusCode::INTERNAL_SERVER_ERROR, "upstream broke").into_response();
        }
        StubMode::Slow => {
            tokio::time::sleep(Duration::from_secs(5)).await;
        }
        StubMode::Ok | StubMode::MalformedStructured => {}
    }

    if !headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("Bearer "))
    {
        return (StatusCode::UNAUTHORIZED, "missing bearer token").into_response();
    }

    let structured = body.get("response_format").is_some();
    let content = if mode == StubMode::MalformedStructured {
        "not json at all".to_string()
    } else if structured {
        r#"{"questions": ["What is OCR?"], "answers": ["Optical character recognition"]}"#
            .to_string()
    } else {
        "Well done! Exactly right.".to_string()
    };

    Json(serde_json::json!({
        "choices": [
            {"message": {"role": "assistant", "content": content}}
        ]
    }))
    .into_response()
}

async fn stub_ocr(
    State(state): State<Arc<StubState>>,
    Json(body): Json<serde_json::Value>,
) -> impl IntoResponse {
    *state.last_ocr_body.lock().expect("lock poisoned") = Some(body);

    let mode = *state.mode.lock().expect("lock poisoned");
    if mode == StubMode::ServerError {
        return (StatusCode::INTERNAL_SERVER_ERROR, "ocr broke").into_response();
    }

    Json(serde_json::json!({
        "pages": [
            {"index": 0, "markdown": "Paris is the capital of France."},
            {"index": 1, "markdown": "It sits on the Seine."}
        ]
    }))
    .into_response()
}

/// Spawns the stub Mistral API and returns a client pointed at it.
async fn stub_client(timeout_secs: u64) -> (MistralClient, Arc<StubState>) {
    let state = Arc::new(StubState {
        mode: Mutex::new(StubMode::Ok),
        last_chat_body: Mutex::new(None),
        last_ocr_body: Mutex::new(None),
    });

    let router = Router::new()
        .route("/v1/chat/completions", post(stub_chat))
        .route("/v1/ocr", post(stub_ocr))
        .with_state(Arc::clone(&state));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind listener");
    let addr = listener.local_addr().expect("Failed to read local addr");

    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("Stub failed");
    });

    let config = Config {
        request_timeout_secs: timeout_secs,
        ..Config::default()
    };
    let client = MistralClient::new(&config, "test-key".to_string())
        .expect("Failed to build client")
        .with_base_url(format!("http://{addr}"));

    (client, state)
}

#[tokio::test]
async fn test_complete_returns_content() {
    let (client, state) = stub_client(10).await;

    let content = client
        .complete("system prompt", "user prompt", 0.7, 500)
        .await
        .expect("Completion failed");

    assert_eq!(content, "Well done! Exactly right.");

    let body = state.last_chat_body();
    assert_eq!(body["model"], "mistral-large-latest");
    assert_eq!(body["messages"][0]["role"], "system");
    assert_eq!(body["messages"][0]["content"], "system prompt");
    assert_eq!(body["messages"][1]["role"], "user");
    assert_eq!(body["max_tokens"], 500);
    assert!(body.get("response_format").is_none());
}

#[tokio::test]
async fn test_complete_structured_parses_parallel_lists() {
    let (client, state) = stub_client(10).await;

    let qa = client
        .complete_structured("system", "user", 0.7, 1000)
        .await
        .expect("Structured completion failed");

    assert_eq!(qa.questions, vec!["What is OCR?"]);
    assert_eq!(qa.answers, vec!["Optical character recognition"]);

    // The request constrained the output to the parallel-list schema
    let body = state.last_chat_body();
    assert_eq!(body["response_format"]["type"], "json_schema");
    let schema = &body["response_format"]["json_schema"]["schema"];
    assert_eq!(schema["properties"]["questions"]["type"], "array");
    assert_eq!(schema["properties"]["answers"]["type"], "array");
}

#[tokio::test]
async fn test_complete_structured_malformed_content_is_schema_error() {
    let (client, state) = stub_client(10).await;
    state.set_mode(StubMode::MalformedStructured);

    let err = client
        .complete_structured("system", "user", 0.7, 1000)
        .await
        .expect_err("Expected schema error");

    assert!(matches!(err, QuizError::SchemaParseError { .. }));
}

#[tokio::test]
async fn test_extract_joins_page_markdown() {
    let (client, state) = stub_client(10).await;

    let text = client.extract("aGVsbG8=").await.expect("Extraction failed");

    assert_eq!(
        text,
        "Paris is the capital of France.\nIt sits on the Seine."
    );

    // Bare base64 is normalized to a data URI
    let body = state.last_ocr_body();
    assert_eq!(body["model"], "mistral-ocr-latest");
    assert_eq!(body["document"]["type"], "image_url");
    assert_eq!(
        body["document"]["image_url"],
        "data:image/jpeg;base64,aGVsbG8="
    );
}

#[tokio::test]
async fn test_extract_keeps_existing_data_uri() {
    let (client, state) = stub_client(10).await;

    client
        .extract("data:image/png;base64,aGVsbG8=")
        .await
        .expect("Extraction failed");

    let body = state.last_ocr_body();
    assert_eq!(
        body["document"]["image_url"],
        "data:image/png;base64,aGVsbG8="
    );
}

#[tokio::test]
async fn test_unauthorized_is_authentication_error() {
    let (client, state) = stub_client(10).await;
    state.set_mode(StubMode::Unauthorized);

    let err = client
        .complete("system", "user", 0.7, 500)
        .await
        .expect_err("Expected auth error");

    assert!(matches!(
        err,
        QuizError::GenerationError {
            kind: GenerationErrorKind::Authentication,
            ..
        }
    ));
}

#[tokio::test]
async fn test_rate_limit_is_classified() {
    let (client, state) = stub_client(10).await;
    state.set_mode(StubMode::RateLimited);

    let err = client
        .complete("system", "user", 0.7, 500)
        .await
        .expect_err("Expected rate limit error");

    assert!(matches!(
        err,
        QuizError::GenerationError {
            kind: GenerationErrorKind::RateLimit,
            ..
        }
    ));
}

#[tokio::test]
async fn test_server_error_is_classified() {
    let (client, state) = stub_client(10).await;
    state.set_mode(StubMode::ServerError);

    let err = client
        .complete("system", "user", 0.7, 500)
        .await
        .expect_err("Expected server error");

    assert!(matches!(
        err,
        QuizError::GenerationError {
            kind: GenerationErrorKind::Server,
            ..
        }
    ));
}

#[tokio::test]
async fn test_server_error_during_ocr_is_extraction_error() {
    let (client, state) = stub_client(10).await;
    state.set_mode(StubMode::ServerError);

    let err = client.extract("aGVsbG8=").await.expect_err("Expected error");

    assert!(matches!(err, QuizError::ExtractionError { .. }));
}

#[tokio::test]
async fn test_timeout_is_classified() {
    let (client, state) = stub_client(1).await;
    state.set_mode(StubMode::Slow);

    let err = client
        .complete("system", "user", 0.7, 500)
        .await
        .expect_err("Expected timeout error");

    assert!(matches!(
        err,
        QuizError::GenerationError {
            kind: GenerationErrorKind::Timeout,
            ..
        }
    ));
}
