//! End-to-end integration tests for the Snapquiz HTTP API.
//!
//! These tests spawn the real server over a TCP listener and drive it with
//! an HTTP client. The OCR and generation capabilities are replaced with
//! scripted fakes so the full session flow runs without network access.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use snapquiz_core::{
    create_router, AppState, Config, GenerationCapability, GenerationErrorKind, QuestionsAnswers,
    QuizError, TextExtraction,
};

/// Extraction fake returning canned text per image.
#[derive(Default)]
struct FakeExtractor {
    fail: AtomicBool,
}

#[async_trait]
impl TextExtraction for FakeExtractor {
    async fn extract(&self, encoded_image: &str) -> snapquiz_core::Result<String> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(QuizError::extraction(1, "unreadable scan"));
        }
        Ok(format!("text of {encoded_image}"))
    }
}

/// Generation fake replaying scripted responses in call order.
#[derive(Default)]
struct FakeGeneration {
    structured: Mutex<VecDeque<QuestionsAnswers>>,
    text: Mutex<VecDeque<String>>,
    fail: AtomicBool,
}

impl FakeGeneration {
    fn push_structured(&self, questions: &[&str], answers: &[&str]) {
        self.structured
            .lock()
            .expect("lock poisoned")
            .push_back(QuestionsAnswers::new(
                questions.iter().map(ToString::to_string).collect(),
                answers.iter().map(ToString::to_string).collect(),
            ));
    }

    fn push_text(&self, response: &str) {
        self.text
            .lock()
            .expect("lock poisoned")
            .push_back(response.to_string());
    }
}

#[async_trait]
impl GenerationCapability for FakeGeneration {
    async fn complete(
        &self,
        _system_prompt: &str,
        _user_prompt: &str,
        _temperature: f32,
        _max_tokens: u32,
    ) -> snapquiz_core::Result<String> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(QuizError::generation(
                GenerationErrorKind::Server,
                "scripted failure",
            ));
        }
        Ok(self
            .text
            .lock()
            .expect("lock poisoned")
            .pop_front()
            .unwrap_or_else(|| "Well done!".to_string()))
    }

    async fn complete_structured(
        &self,
        _system_prompt: &str,
        _user_prompt: &str,
        _temperature: f32,
        _max_tokens: u32,
    ) -> snapquiz_core::Result<QuestionsAnswers> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(QuizError::generation(
                GenerationErrorKind::Server,
                "scripted failure",
            ));
        }
        Ok(self
            .structured
            .lock()
            .expect("lock poisoned")
            .pop_front()
            .unwrap_or_default())
    }
}

/// Spawns the API server on an ephemeral port and returns its base URL
/// plus handles to the scripted capabilities.
async fn spawn_server() -> (String, Arc<FakeGeneration>, Arc<FakeExtractor>) {
    let generation = Arc::new(FakeGeneration::default());
    let extractor = Arc::new(FakeExtractor::default());
    let state = AppState::new(
        Config::default(),
        Arc::clone(&generation) as _,
        Arc::clone(&extractor) as _,
    );
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind listener");
    let addr = listener.local_addr().expect("Failed to read local addr");

    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("Server failed");
    });

    (format!("http://{addr}"), generation, extractor)
}

async fn create_session(client: &reqwest::Client, base: &str) -> String {
    let response = client
        .post(format!("{base}/api/sessions"))
        .send()
        .await
        .expect("Request failed");
    assert_eq!(response.status(), 201);

    let body: serde_json::Value = response.json().await.expect("Invalid JSON");
    body["sessionId"]
        .as_str()
        .expect("Missing sessionId")
        .to_string()
}

/// Runs the complete quiz loop over HTTP: ingest, primary questions with
/// FIFO serving, answer feedback, follow-up priority, and the final report.
#[tokio::test]
async fn test_full_quiz_loop() {
    let (base, generation, _) = spawn_server().await;
    let client = reqwest::Client::new();
    let session = create_session(&client, &base).await;

    // Ingest two pages
    let response = client
        .post(format!("{base}/api/sessions/{session}/documents"))
        .json(&serde_json::json!({"images": ["img-1", "img-2"]}))
        .send()
        .await
        .expect("Request failed");
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.expect("Invalid JSON");
    assert_eq!(body["pages"], 2);

    // Primary batch
    generation.push_structured(&["Q1", "Q2"], &["A1", "A2"]);

    // The same head is served until answered
    for _ in 0..2 {
        let body: serde_json::Value = client
            .get(format!("{base}/api/sessions/{session}/question"))
            .send()
            .await
            .expect("Request failed")
            .json()
            .await
            .expect("Invalid JSON");
        assert_eq!(body["question"], "Q1");
    }

    // Answer Q1
    generation.push_text("Well done! Exactly right.");
    let body: serde_json::Value = client
        .post(format!("{base}/api/sessions/{session}/answer"))
        .json(&serde_json::json!({"answer": "my answer"}))
        .send()
        .await
        .expect("Request failed")
        .json()
        .await
        .expect("Invalid JSON");
    assert_eq!(body["feedback"], "Well done! Exactly right.");

    // Follow-up batch generated from the answered history
    generation.push_structured(&["F1"], &["FA1"]);
    let body: serde_json::Value = client
        .get(format!("{base}/api/sessions/{session}/follow-up"))
        .send()
        .await
        .expect("Request failed")
        .json()
        .await
        .expect("Invalid JSON");
    assert_eq!(body["question"], "F1");

    // Follow-up takes priority over the remaining primary question
    let body: serde_json::Value = client
        .get(format!("{base}/api/sessions/{session}/question"))
        .send()
        .await
        .expect("Request failed")
        .json()
        .await
        .expect("Invalid JSON");
    assert_eq!(body["question"], "F1");

    // Answering pops the follow-up; the primary queue resumes after
    generation.push_text("Keep going! Almost there.");
    client
        .post(format!("{base}/api/sessions/{session}/answer"))
        .json(&serde_json::json!({"answer": "f answer"}))
        .send()
        .await
        .expect("Request failed");

    let body: serde_json::Value = client
        .get(format!("{base}/api/sessions/{session}/question"))
        .send()
        .await
        .expect("Request failed")
        .json()
        .await
        .expect("Invalid JSON");
    assert_eq!(body["question"], "Q2");

    // Report over the answered history
    generation.push_text("Solid work; review the second page more closely.");
    let response = client
        .get(format!("{base}/api/sessions/{session}/report"))
        .send()
        .await
        .expect("Request failed");
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.expect("Invalid JSON");
    assert_eq!(
        body["report"],
        "Solid work; review the second page more closely."
    );
}

/// Each session has its own queues and history.
#[tokio::test]
async fn test_sessions_are_independent() {
    let (base, generation, _) = spawn_server().await;
    let client = reqwest::Client::new();

    let first = create_session(&client, &base).await;
    let second = create_session(&client, &base).await;
    assert_ne!(first, second);

    // Ingest into the first session only
    client
        .post(format!("{base}/api/sessions/{first}/documents"))
        .json(&serde_json::json!({"images": ["img-1"]}))
        .send()
        .await
        .expect("Request failed");

    generation.push_structured(&["Q1"], &["A1"]);
    let response = client
        .get(format!("{base}/api/sessions/{first}/question"))
        .send()
        .await
        .expect("Request failed");
    assert_eq!(response.status(), 200);

    // The second session still has no corpus
    let response = client
        .get(format!("{base}/api/sessions/{second}/question"))
        .send()
        .await
        .expect("Request failed");
    assert_eq!(response.status(), 409);
}

/// Error statuses: unknown session, missing preconditions, and capability
/// failures.
#[tokio::test]
async fn test_error_status_mapping() {
    let (base, generation, extractor) = spawn_server().await;
    let client = reqwest::Client::new();

    // Unknown session
    let response = client
        .get(format!(
            "{base}/api/sessions/00000000-0000-0000-0000-000000000000/question"
        ))
        .send()
        .await
        .expect("Request failed");
    assert_eq!(response.status(), 404);

    let session = create_session(&client, &base).await;

    // No documents ingested
    let response = client
        .get(format!("{base}/api/sessions/{session}/question"))
        .send()
        .await
        .expect("Request failed");
    assert_eq!(response.status(), 409);

    // No answers yet
    for path in ["follow-up", "report"] {
        let response = client
            .get(format!("{base}/api/sessions/{session}/{path}"))
            .send()
            .await
            .expect("Request failed");
        assert_eq!(response.status(), 409, "for {path}");
    }

    // No active question
    let response = client
        .post(format!("{base}/api/sessions/{session}/answer"))
        .json(&serde_json::json!({"answer": "a"}))
        .send()
        .await
        .expect("Request failed");
    assert_eq!(response.status(), 409);

    // Extraction failure
    extractor.fail.store(true, Ordering::SeqCst);
    let response = client
        .post(format!("{base}/api/sessions/{session}/documents"))
        .json(&serde_json::json!({"images": ["img-1"]}))
        .send()
        .await
        .expect("Request failed");
    assert_eq!(response.status(), 502);
    extractor.fail.store(false, Ordering::SeqCst);

    // Generation failure after successful ingestion
    client
        .post(format!("{base}/api/sessions/{session}/documents"))
        .json(&serde_json::json!({"images": ["img-1"]}))
        .send()
        .await
        .expect("Request failed");

    generation.fail.store(true, Ordering::SeqCst);
    let response = client
        .get(format!("{base}/api/sessions/{session}/question"))
        .send()
        .await
        .expect("Request failed");
    assert_eq!(response.status(), 502);

    let body: serde_json::Value = response.json().await.expect("Invalid JSON");
    assert!(body["error"].as_str().expect("Missing error").contains("Generation failed"));
}

/// A mid-batch extraction failure keeps none of the batch.
#[tokio::test]
async fn test_failed_ingestion_keeps_no_documents() {
    let (base, generation, extractor) = spawn_server().await;
    let client = reqwest::Client::new();
    let session = create_session(&client, &base).await;

    extractor.fail.store(true, Ordering::SeqCst);
    let response = client
        .post(format!("{base}/api/sessions/{session}/documents"))
        .json(&serde_json::json!({"images": ["img-1", "img-2"]}))
        .send()
        .await
        .expect("Request failed");
    assert_eq!(response.status(), 502);

    // No partial corpus: the session still reports EmptyCorpus
    generation.push_structured(&["Q1"], &["A1"]);
    let response = client
        .get(format!("{base}/api/sessions/{session}/question"))
        .send()
        .await
        .expect("Request failed");
    assert_eq!(response.status(), 409);
}

/// The sample config fixture loads and overrides the defaults.
#[test]
fn test_sample_config_loads() {
    let fixture_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures");
    let config = Config::load_from_dir(&fixture_dir).expect("Failed to load config");

    assert_eq!(config.question_count, 2);
    assert_eq!(config.follow_up_count, 3);
    assert_eq!(config.model, "mistral-small-latest");
    // Defaults apply for missing fields
    assert_eq!(config.request_timeout_secs, 60);
}
