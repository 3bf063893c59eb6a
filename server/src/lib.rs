use std::sync::Arc;

use askpdf_ai::azure::AzureOpenAiClient;
use askpdf_ai::embeddings::azure_embed::AzureEmbedder;
use askpdf_ai::embeddings::Embedder;
use askpdf_ai::index::IndexStore;
use askpdf_ai::knowledge_base::{KnowledgeBase, KnowledgeBaseStatus};
use askpdf_ai::llm::azure_llm::AzureChatLlm;
use askpdf_ai::llm::Llm;
use askpdf_core::config::Settings;
use askpdf_core::error::AppError;
use askpdf_core::extract::{PdftotextExtractor, TextExtractor};
use askpdf_core::upload::{validate_pdf_filename, UploadStore};
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

pub struct AppState {
    pub kb: KnowledgeBase,
    pub uploads: UploadStore,
    pub extractor: Arc<dyn TextExtractor>,
    pub embedder: Arc<dyn Embedder>,
    pub llm: Arc<dyn Llm>,
}

impl AppState {
    pub fn from_settings(settings: &Settings) -> Result<Self, AppError> {
        let client = AzureOpenAiClient::from_settings(&settings.azure)?;
        Ok(Self {
            kb: KnowledgeBase::new(
                IndexStore::open(settings.index_dir.clone()),
                settings.chunking,
                settings.top_k,
            ),
            uploads: UploadStore::open(settings.upload_dir.clone()),
            extractor: Arc::new(PdftotextExtractor::new()),
            embedder: Arc::new(AzureEmbedder::new(client.clone(), &settings.embedding)),
            llm: Arc::new(AzureChatLlm::new(client, &settings.chat)),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiReply {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Diagnostic context, only sent for server-side failures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiReply {
    fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            answer: None,
            error: None,
            details: None,
        }
    }

    fn answer(answer: String) -> Self {
        Self {
            success: true,
            message: None,
            answer: Some(answer),
            error: None,
            details: None,
        }
    }

    fn failure(err: &AppError) -> Self {
        Self {
            success: false,
            message: None,
            answer: None,
            error: Some(err.message.clone()),
            details: if err.is_client_error() {
                None
            } else {
                err.details.clone()
            },
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
}

fn status_for(err: &AppError) -> StatusCode {
    StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

fn reply_error(err: AppError) -> (StatusCode, ApiReply) {
    if !err.is_client_error() {
        tracing::warn!("request failed: {} ({})", err, err.details.as_deref().unwrap_or("-"));
    } else {
        tracing::info!("request rejected: {}", err);
    }
    (status_for(&err), ApiReply::failure(&err))
}

pub fn now_rfc3339_utc() -> Result<String, AppError> {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .map_err(|e| AppError::new("CLOCK_FORMAT_FAILED", "Failed to format time").with_details(e.to_string()))
}

fn ingest_upload(
    state: &AppState,
    filename: Option<&str>,
    bytes: &[u8],
    received_at: &str,
) -> Result<(), AppError> {
    let filename = filename.unwrap_or_default();
    validate_pdf_filename(filename)?;
    let staged = state.uploads.stage(filename, bytes)?;
    let text = state.extractor.extract(staged.path())?;
    let label = staged.name().to_string();
    staged.commit()?;
    state
        .kb
        .ingest(state.embedder.as_ref(), &text, Some(label), received_at)?;
    Ok(())
}

/// Save, extract, chunk, embed, persist and publish one uploaded PDF.
pub fn handle_upload(
    state: &AppState,
    filename: Option<&str>,
    bytes: &[u8],
    received_at: &str,
) -> (StatusCode, ApiReply) {
    tracing::info!(
        "upload received: {} ({} bytes)",
        filename.unwrap_or("<none>"),
        bytes.len()
    );
    match ingest_upload(state, filename, bytes, received_at) {
        Ok(()) => (
            StatusCode::OK,
            ApiReply::message("PDF uploaded and knowledge base created."),
        ),
        Err(e) => reply_error(e),
    }
}

pub fn handle_chat(state: &AppState, req: &ChatRequest) -> (StatusCode, ApiReply) {
    match state
        .kb
        .answer(state.embedder.as_ref(), state.llm.as_ref(), &req.message)
    {
        Ok(answer) => (StatusCode::OK, ApiReply::answer(answer)),
        Err(e) => reply_error(e),
    }
}

pub fn handle_status(state: &AppState) -> Result<KnowledgeBaseStatus, (StatusCode, ApiReply)> {
    state.kb.status().map_err(reply_error)
}

async fn run_blocking<F>(f: F) -> (StatusCode, Json<ApiReply>)
where
    F: FnOnce() -> (StatusCode, ApiReply) + Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok((status, reply)) => (status, Json(reply)),
        Err(e) => {
            let (status, reply) = reply_error(
                AppError::new("WORKER_FAILED", "Request worker failed").with_details(e.to_string()),
            );
            (status, Json(reply))
        }
    }
}

async fn upload_route(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> (StatusCode, Json<ApiReply>) {
    let mut file: Option<(String, Vec<u8>)> = None;
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                if field.name() != Some("pdf") {
                    continue;
                }
                let name = field.file_name().unwrap_or_default().to_string();
                match field.bytes().await {
                    Ok(b) => file = Some((name, b.to_vec())),
                    Err(e) => {
                        let (status, reply) = reply_error(
                            AppError::new("UPLOAD_INVALID", "Failed to read uploaded file")
                                .with_details(e.to_string()),
                        );
                        return (status, Json(reply));
                    }
                }
            }
            Ok(None) => break,
            Err(e) => {
                let (status, reply) = reply_error(
                    AppError::new("UPLOAD_INVALID", "Malformed upload request").with_details(e.to_string()),
                );
                return (status, Json(reply));
            }
        }
    }

    let received_at = match now_rfc3339_utc() {
        Ok(t) => t,
        Err(e) => {
            let (status, reply) = reply_error(e);
            return (status, Json(reply));
        }
    };
    run_blocking(move || match file {
        Some((name, bytes)) => handle_upload(&state, Some(&name), &bytes, &received_at),
        None => handle_upload(&state, None, &[], &received_at),
    })
    .await
}

async fn chat_route(
    State(state): State<Arc<AppState>>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> (StatusCode, Json<ApiReply>) {
    let req = match body {
        Ok(Json(req)) => req,
        Err(e) => {
            let (status, reply) = reply_error(
                AppError::new("QUERY_INVALID", "Request body must be JSON with a message field")
                    .with_details(e.body_text()),
            );
            return (status, Json(reply));
        }
    };
    run_blocking(move || handle_chat(&state, &req)).await
}

async fn status_route(
    State(state): State<Arc<AppState>>,
) -> Result<Json<KnowledgeBaseStatus>, (StatusCode, Json<ApiReply>)> {
    match tokio::task::spawn_blocking(move || handle_status(&state)).await {
        Ok(Ok(st)) => Ok(Json(st)),
        Ok(Err((status, reply))) => Err((status, Json(reply))),
        Err(e) => {
            let (status, reply) = reply_error(
                AppError::new("WORKER_FAILED", "Request worker failed").with_details(e.to_string()),
            );
            Err((status, Json(reply)))
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/upload", post(upload_route))
        .route("/chat", post(chat_route))
        .route("/status", get(status_route))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}
