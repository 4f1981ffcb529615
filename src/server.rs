//! JSON HTTP API.
//!
//! Thin transport over [`Services`]: every handler validates its payload,
//! calls one pipeline operation, and maps typed outcomes to status codes.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `POST` | `/ingest` | Index a file under a scope |
//! | `POST` | `/chat` | Answer a question from scoped documents |
//! | `POST` | `/summarize` | Summarize documents by content hash |
//! | `POST` | `/quiz` | Generate a multiple-choice quiz |
//! | `DELETE` | `/documents/{hash}` | Remove a document |
//! | `GET`  | `/documents` | List ingested documents |
//! | `GET`  | `/stats` | Ingestion statistics |
//! | `GET`  | `/chat/history` | Role-filtered chat log |
//! | `GET`  | `/debug/document/{hash}` | Stored document details |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "question must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `unprocessable`
//! (422), `unavailable` (503), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so browser front-ends
//! can call the API directly.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use campus_rag_core::models::{
    BloomLevel, ChatExchange, DetailLevel, DocumentInfo, HistoryFilter, IngestedDocument,
    IngestionStats, QuizQuestion, Scope,
};
use campus_rag_core::{QuizError, RagError};

use crate::assistant::Summary;
use crate::config::Config;
use crate::ingest::{DeleteReport, IngestOutcome, IngestStatus};
use crate::services::Services;

type AppState = Arc<Services>;

/// Starts the HTTP server on `[server].bind` and runs until terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let services = Arc::new(Services::build(config).await?);
    let bind_addr = config.server.bind.clone();

    let app = router(services);

    info!(bind = %bind_addr, "server listening");
    println!("campus server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

pub fn router(services: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/ingest", post(handle_ingest))
        .route("/chat", post(handle_chat))
        .route("/summarize", post(handle_summarize))
        .route("/quiz", post(handle_quiz))
        .route("/documents", get(handle_documents))
        .route("/documents/{hash}", delete(handle_delete))
        .route("/stats", get(handle_stats))
        .route("/chat/history", get(handle_history))
        .route("/debug/document/{hash}", get(handle_document_info))
        .layer(cors)
        .with_state(services)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

#[derive(Debug)]
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn app_error(status: StatusCode, code: &str, message: impl Into<String>) -> AppError {
    AppError {
        status,
        code: code.to_string(),
        message: message.into(),
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    app_error(StatusCode::BAD_REQUEST, "bad_request", message)
}

fn not_found(message: impl Into<String>) -> AppError {
    app_error(StatusCode::NOT_FOUND, "not_found", message)
}

fn unprocessable(message: impl Into<String>) -> AppError {
    app_error(StatusCode::UNPROCESSABLE_ENTITY, "unprocessable", message)
}

fn unavailable(message: impl Into<String>) -> AppError {
    app_error(StatusCode::SERVICE_UNAVAILABLE, "unavailable", message)
}

fn internal(message: impl Into<String>) -> AppError {
    app_error(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
}

impl From<RagError> for AppError {
    fn from(e: RagError) -> Self {
        let message = e.to_string();
        match e {
            RagError::InvalidInput(_) => bad_request(message),
            RagError::Processing(_) => unprocessable(message),
            RagError::StorageUnavailable(_) | RagError::BackendUnavailable(_) => {
                unavailable(message)
            }
            RagError::Embedding(_) => internal(message),
        }
    }
}

impl From<QuizError> for AppError {
    fn from(e: QuizError) -> Self {
        let message = e.to_string();
        match e {
            QuizError::NoDocument => not_found(message),
            QuizError::MalformedOutput { .. } | QuizError::Validation { .. } => {
                unprocessable(message)
            }
            QuizError::BackendUnavailable(_) | QuizError::StorageUnavailable(_) => {
                unavailable(message)
            }
        }
    }
}

fn require_hashes(hashes: &[String]) -> Result<(), AppError> {
    if hashes.is_empty() || hashes.iter().any(|h| h.trim().is_empty()) {
        return Err(bad_request("content_hashes must be a non-empty list of hashes"));
    }
    Ok(())
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /ingest ============

#[derive(Deserialize)]
struct IngestRequest {
    base_filename: String,
    file_path: PathBuf,
    scope: Scope,
    #[serde(default)]
    force: bool,
}

async fn handle_ingest(
    State(services): State<AppState>,
    Json(req): Json<IngestRequest>,
) -> Result<(StatusCode, Json<IngestStatus>), AppError> {
    if req.base_filename.trim().is_empty() {
        return Err(bad_request("base_filename must not be empty"));
    }
    let outcome = services
        .ingestor
        .ingest_file(&req.base_filename, &req.file_path, req.scope, req.force)
        .await;
    let status = match outcome {
        IngestOutcome::Indexed { .. } => StatusCode::OK,
        IngestOutcome::Duplicate { .. } => StatusCode::CONFLICT,
        IngestOutcome::Failed { .. } => StatusCode::UNPROCESSABLE_ENTITY,
    };
    Ok((
        status,
        Json(outcome.to_status(&req.file_path.display().to_string())),
    ))
}

// ============ POST /chat ============

#[derive(Deserialize)]
struct ChatRequest {
    question: String,
    scope: Scope,
}

#[derive(Serialize)]
struct ChatResponse {
    answer: String,
    /// `primary`, `fallback`, or `unavailable`.
    source: &'static str,
}

async fn handle_chat(
    State(services): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    if req.question.trim().is_empty() {
        return Err(bad_request("question must not be empty"));
    }
    let generation = services.assistant.answer(&req.question, &req.scope).await;
    Ok(Json(ChatResponse {
        answer: generation.text(),
        source: generation.source(),
    }))
}

// ============ POST /summarize ============

#[derive(Deserialize)]
struct SummarizeRequest {
    content_hashes: Vec<String>,
    #[serde(default)]
    level: DetailLevel,
}

async fn handle_summarize(
    State(services): State<AppState>,
    Json(req): Json<SummarizeRequest>,
) -> Result<Json<Summary>, AppError> {
    require_hashes(&req.content_hashes)?;
    match services
        .assistant
        .summarize(&req.content_hashes, req.level)
        .await
    {
        Summary::Failed(message) => Err(unavailable(message)),
        summary => Ok(Json(summary)),
    }
}

// ============ POST /quiz ============

#[derive(Deserialize)]
struct QuizRequest {
    content_hashes: Vec<String>,
    #[serde(default = "default_num_questions")]
    num_questions: usize,
    #[serde(default)]
    bloom_level: Option<String>,
}

fn default_num_questions() -> usize {
    5
}

#[derive(Serialize)]
struct QuizResponse {
    questions: Vec<QuizQuestion>,
}

async fn handle_quiz(
    State(services): State<AppState>,
    Json(req): Json<QuizRequest>,
) -> Result<Json<QuizResponse>, AppError> {
    require_hashes(&req.content_hashes)?;
    if req.num_questions == 0 {
        return Err(bad_request("num_questions must be >= 1"));
    }
    let bloom = req
        .bloom_level
        .as_deref()
        .map(str::parse::<BloomLevel>)
        .transpose()?;
    let questions = services
        .assistant
        .generate_quiz(&req.content_hashes, req.num_questions, bloom)
        .await?;
    Ok(Json(QuizResponse { questions }))
}

// ============ Documents ============

#[derive(Serialize)]
struct DocumentsResponse {
    documents: Vec<IngestedDocument>,
}

async fn handle_documents(
    State(services): State<AppState>,
) -> Result<Json<DocumentsResponse>, AppError> {
    let documents = services.assistant.documents().await?;
    Ok(Json(DocumentsResponse { documents }))
}

async fn handle_delete(
    State(services): State<AppState>,
    Path(hash): Path<String>,
) -> Result<Json<DeleteReport>, AppError> {
    let report = services.ingestor.delete_document(&hash).await?;
    if report.vectors_deleted == 0 && report.metadata_deleted == 0 {
        return Err(not_found(format!("no document with hash: {}", hash)));
    }
    Ok(Json(report))
}

async fn handle_document_info(
    State(services): State<AppState>,
    Path(hash): Path<String>,
) -> Result<Json<DocumentInfo>, AppError> {
    services
        .assistant
        .document_info(&hash)
        .await?
        .map(Json)
        .ok_or_else(|| not_found(format!("no document with hash: {}", hash)))
}

async fn handle_stats(State(services): State<AppState>) -> Result<Json<IngestionStats>, AppError> {
    Ok(Json(services.assistant.stats().await?))
}

// ============ GET /chat/history ============

#[derive(Deserialize)]
struct HistoryQuery {
    profile_id: i64,
    department_id: Option<i64>,
    program_id: Option<i64>,
}

#[derive(Serialize)]
struct HistoryResponse {
    history: Vec<ChatExchange>,
}

async fn handle_history(
    State(services): State<AppState>,
    Query(q): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, AppError> {
    let filter = HistoryFilter::for_profile(q.profile_id, q.department_id, q.program_id);
    let history = services.assistant.history(filter).await?;
    Ok(Json(HistoryResponse { history }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rag_error_status_mapping() {
        let cases = [
            (RagError::InvalidInput("x".into()), StatusCode::BAD_REQUEST),
            (RagError::Processing("x".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (RagError::StorageUnavailable("x".into()), StatusCode::SERVICE_UNAVAILABLE),
            (RagError::BackendUnavailable("x".into()), StatusCode::SERVICE_UNAVAILABLE),
            (RagError::Embedding("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(AppError::from(err).status, status);
        }
    }

    #[test]
    fn test_quiz_error_status_mapping() {
        assert_eq!(AppError::from(QuizError::NoDocument).status, StatusCode::NOT_FOUND);
        let invalid = QuizError::Validation {
            question: 2,
            rule: "must have exactly 4 options, got 3".into(),
        };
        let err = AppError::from(invalid);
        assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.code, "unprocessable");
        assert!(err.message.contains("question 2"));
    }

    #[test]
    fn test_require_hashes() {
        assert!(require_hashes(&[]).is_err());
        assert!(require_hashes(&["  ".to_string()]).is_err());
        assert!(require_hashes(&["abc".to_string()]).is_ok());
    }

    #[test]
    fn test_quiz_request_defaults() {
        let req: QuizRequest =
            serde_json::from_str(r#"{"content_hashes": ["abc"], "bloom_level": "understanding"}"#)
                .unwrap();
        assert_eq!(req.num_questions, 5);
        assert_eq!(
            req.bloom_level.as_deref().map(str::parse::<BloomLevel>).transpose().unwrap(),
            Some(BloomLevel::Comprehension)
        );
    }
}
