use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use askpdf_ai::embeddings::Embedder;
use askpdf_ai::index::IndexStore;
use askpdf_ai::knowledge_base::KnowledgeBase;
use askpdf_ai::llm::Llm;
use askpdf_core::error::AppError;
use askpdf_core::extract::TextExtractor;
use askpdf_core::upload::UploadStore;
use askpdf_lib::{handle_chat, handle_status, handle_upload, router, ApiReply, AppState, ChatRequest};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use pretty_assertions::assert_eq;
use tempfile::{tempdir, TempDir};
use tower::ServiceExt;

/// Treats the uploaded bytes as the document text.
struct PlainTextExtractor {
    calls: Arc<AtomicUsize>,
}

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, path: &Path) -> Result<String, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let bytes = fs::read(path).map_err(|e| {
            AppError::new("PDF_EXTRACTION_FAILED", "Failed to read PDF").with_details(e.to_string())
        })?;
        String::from_utf8(bytes)
            .map_err(|e| AppError::new("PDF_EXTRACTION_FAILED", "PDF text is not UTF-8").with_details(e.to_string()))
    }
}

/// Counts a/b/c occurrences (case-insensitive).
struct LetterEmbedder;

impl Embedder for LetterEmbedder {
    fn model(&self) -> &str {
        "letters-v1"
    }

    fn embed(&self, input: &str) -> Result<Vec<f32>, AppError> {
        let mut v = vec![0.0f32; 3];
        for ch in input.chars().map(|c| c.to_ascii_lowercase()) {
            match ch {
                'a' => v[0] += 1.0,
                'b' => v[1] += 1.0,
                'c' => v[2] += 1.0,
                _ => {}
            }
        }
        Ok(v)
    }
}

/// Replies with exactly the context block it was given.
struct EchoContextLlm;

impl Llm for EchoContextLlm {
    fn chat(&self, _system: &str, user: &str) -> Result<String, AppError> {
        Ok(user
            .strip_prefix("Context:\n")
            .and_then(|rest| rest.split("\n\nUser Question: ").next())
            .unwrap_or_default()
            .to_string())
    }
}

fn setup() -> (TempDir, AppState, Arc<AtomicUsize>) {
    let dir = tempdir().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let state = AppState {
        kb: KnowledgeBase::with_defaults(IndexStore::open(dir.path().join("kb_index"))),
        uploads: UploadStore::open(dir.path().join("uploads")),
        extractor: Arc::new(PlainTextExtractor {
            calls: Arc::clone(&calls),
        }),
        embedder: Arc::new(LetterEmbedder),
        llm: Arc::new(EchoContextLlm),
    };
    (dir, state, calls)
}

fn chat(message: &str) -> ChatRequest {
    ChatRequest {
        message: message.to_string(),
    }
}

#[test]
fn chat_before_upload_is_a_client_error_not_a_crash() {
    let (_dir, state, _) = setup();
    let (status, reply) = handle_chat(&state, &chat("what does it say?"));

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        reply,
        ApiReply {
            success: false,
            message: None,
            answer: None,
            error: Some("No knowledge base available. Please upload a PDF first.".to_string()),
            details: None,
        }
    );
}

#[test]
fn non_pdf_upload_is_rejected_without_extraction() {
    let (dir, state, calls) = setup();

    let (status, reply) = handle_upload(&state, Some("notes.txt"), b"aaaa", "2026-02-10T00:00:00Z");
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(!reply.success);
    assert_eq!(reply.error.as_deref(), Some("Please upload a PDF file."));

    let (status, _) = handle_upload(&state, None, b"", "2026-02-10T00:00:00Z");
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(!dir.path().join("uploads").exists());
}

#[test]
fn upload_then_chat_answers_from_retrieved_chunks() {
    let (dir, state, calls) = setup();
    let text = "A".repeat(310);

    let (status, reply) = handle_upload(&state, Some("letters.PDF"), text.as_bytes(), "2026-02-10T00:00:00Z");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply.message.as_deref(), Some("PDF uploaded and knowledge base created."));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(dir.path().join("uploads").join("letters.PDF").exists());
    assert!(dir.path().join("kb_index").join("index.json").exists());

    let st = handle_status(&state).expect("status");
    assert!(st.ready && st.loaded);
    assert_eq!(st.chunk_count, 2);
    assert_eq!(st.source_label.as_deref(), Some("letters.PDF"));

    let (status, reply) = handle_chat(&state, &chat("a a"));
    assert_eq!(status, StatusCode::OK);
    assert!(reply.success);
    let answer = reply.answer.expect("answer");
    assert!(!answer.is_empty());
    assert_eq!(answer, format!("{}\n\n{}", "A".repeat(60), "A".repeat(300)));
}

#[test]
fn extraction_failure_is_a_server_error_and_keeps_previous_index() {
    let (_dir, state, _) = setup();
    let (status, _) = handle_upload(&state, Some("first.pdf"), b"abc abc", "2026-02-10T00:00:00Z");
    assert_eq!(status, StatusCode::OK);

    // Invalid UTF-8 makes the stand-in extractor fail.
    let (status, reply) = handle_upload(&state, Some("second.pdf"), &[0xff, 0xfe, 0xfd], "2026-02-11T00:00:00Z");
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!reply.success);
    assert_eq!(reply.error.as_deref(), Some("PDF text is not UTF-8"));
    assert!(reply.details.unwrap_or_default().contains("invalid utf-8"));

    let st = handle_status(&state).expect("status");
    assert_eq!(st.source_label.as_deref(), Some("first.pdf"));
}

#[test]
fn empty_question_is_a_client_error_once_a_document_exists() {
    let (_dir, state, _) = setup();
    let (status, _) = handle_upload(&state, Some("doc.pdf"), b"abc", "2026-02-10T00:00:00Z");
    assert_eq!(status, StatusCode::OK);

    let (status, reply) = handle_chat(&state, &ChatRequest::default());
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.error.as_deref(), Some("Question must not be empty"));
}

#[test]
fn reply_serializes_only_present_fields() {
    let (_dir, state, _) = setup();
    let (_, reply) = handle_chat(&state, &chat("hi"));
    let json = serde_json::to_value(&reply).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "success": false,
            "error": "No knowledge base available. Please upload a PDF first."
        })
    );
}

const BOUNDARY: &str = "askpdf-test-boundary";

fn multipart_upload(field: &str, filename: &str, content: &[u8]) -> Request<Body> {
    let mut body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: application/pdf\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    Request::builder()
        .method("POST")
        .uri("/upload")
        .header("content-type", format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(body))
        .unwrap()
}

fn chat_post(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/chat")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn send(state: &Arc<AppState>, req: Request<Body>) -> (StatusCode, ApiReply) {
    let resp = router(Arc::clone(state)).oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn upload_route_reads_the_pdf_field() {
    let (dir, state, calls) = setup();
    let state = Arc::new(state);

    let (status, reply) = send(&state, multipart_upload("pdf", "letters.pdf", "A".repeat(310).as_bytes())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply.message.as_deref(), Some("PDF uploaded and knowledge base created."));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(dir.path().join("uploads").join("letters.pdf").exists());

    let (status, reply) = send(&state, chat_post(r#"{"message":"a a"}"#)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        reply.answer.as_deref(),
        Some(format!("{}\n\n{}", "A".repeat(60), "A".repeat(300)).as_str())
    );
}

#[tokio::test]
async fn upload_route_ignores_fields_not_named_pdf() {
    let (dir, state, calls) = setup();
    let state = Arc::new(state);

    let (status, reply) = send(&state, multipart_upload("file", "letters.pdf", b"abc")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(!reply.success);
    assert_eq!(reply.error.as_deref(), Some("Please upload a PDF file."));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(!dir.path().join("uploads").exists());
}

#[tokio::test]
async fn chat_route_rejects_bodies_that_are_not_json() {
    let (_dir, state, _) = setup();
    let state = Arc::new(state);

    let (status, reply) = send(&state, chat_post("what does it say?")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        reply.error.as_deref(),
        Some("Request body must be JSON with a message field")
    );
}

#[tokio::test]
async fn chat_route_treats_missing_message_as_empty_question() {
    let (_dir, state, _) = setup();
    let state = Arc::new(state);
    let (status, _) = send(&state, multipart_upload("pdf", "doc.pdf", b"abc")).await;
    assert_eq!(status, StatusCode::OK);

    let (status, reply) = send(&state, chat_post("{}")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.error.as_deref(), Some("Question must not be empty"));
}
