//! HTTP boundary: multipart intake, batch dispatch, ZIP or JSON error out.
//!
//! ## Routes
//!
//! | Method | Path | Response |
//! |--------|------|----------|
//! | `POST` | `/convert`, `/convert/` | `200 application/zip` or JSON error |
//! | `GET`  | `/health` | `200` when the engine answers `--version`, else `503` |
//!
//! Uploads are read from every multipart part named `files[]`. Other parts
//! are ignored. Each request runs its own batch; nothing is shared between
//! requests except the engine handle and the batch settings.
//!
//! ## Error body
//!
//! ```json
//! {"error": "No files were successfully converted (2 failed)",
//!  "kind": "AllConversionsFailed",
//!  "details": "a.docx: ...\nb.docx: ..."}
//! ```

use crate::batch::{convert_batch, UploadItem};
use crate::config::BatchConfig;
use crate::error::BatchError;
use crate::output::ArchivePayload;
use crate::pipeline::engine::ConversionEngine;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

/// Multipart field name carrying the uploaded files.
pub const UPLOAD_FIELD: &str = "files[]";

/// Default request body limit: 64 MiB.
pub const DEFAULT_BODY_LIMIT: usize = 64 * 1024 * 1024;

// ── Config & state ───────────────────────────────────────────────────────

/// Listener settings for [`serve`].
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Largest accepted request body in bytes.
    pub body_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 5000,
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }
}

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<dyn ConversionEngine>,
    pub config: Arc<BatchConfig>,
}

impl AppState {
    pub fn new(engine: Arc<dyn ConversionEngine>, config: BatchConfig) -> Self {
        Self {
            engine,
            config: Arc::new(config),
        }
    }
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("engine", &self.engine.name())
            .field("config", &self.config)
            .finish()
    }
}

// ── Router ───────────────────────────────────────────────────────────────

/// Build the application router.
pub fn build_router(state: AppState, server: &ServerConfig) -> Router {
    Router::new()
        .route("/convert", post(convert_handler))
        .route("/convert/", post(convert_handler))
        .route("/health", get(health_handler))
        .layer(DefaultBodyLimit::max(server.body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `server.host:server.port` and serve until Ctrl-C.
pub async fn serve(server: ServerConfig, state: AppState) -> std::io::Result<()> {
    let router = build_router(state, &server);
    let listener = tokio::net::TcpListener::bind((server.host.as_str(), server.port)).await?;
    let addr: SocketAddr = listener.local_addr()?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Cannot listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

// ── Handlers ─────────────────────────────────────────────────────────────

async fn convert_handler(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, BatchError> {
    let multipart = multipart.map_err(|e| BatchError::InvalidMultipart(e.body_text()))?;
    let items = read_uploads(multipart).await?;

    let archive = convert_batch(items, Arc::clone(&state.engine), &state.config).await?;
    let disposition = format!("attachment; filename=\"{}\"", ArchivePayload::FILENAME);

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, ArchivePayload::CONTENT_TYPE.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        archive.into_bytes(),
    )
        .into_response())
}

/// Collect every `files[]` part, in request order.
///
/// # Errors
/// - [`BatchError::NoFilePart`] if no part used the upload field name
/// - [`BatchError::NoFilesSelected`] if none of those parts named a file
/// - [`BatchError::InvalidMultipart`] if the body could not be decoded
async fn read_uploads(mut multipart: Multipart) -> Result<Vec<UploadItem>, BatchError> {
    let mut items = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| BatchError::InvalidMultipart(e.body_text()))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            debug!("Ignoring multipart field {:?}", field.name());
            continue;
        }
        let filename = field.file_name().map(str::to_owned);
        let content = field
            .bytes()
            .await
            .map_err(|e| BatchError::InvalidMultipart(e.body_text()))?;
        items.push(UploadItem { filename, content });
    }

    if items.is_empty() {
        return Err(BatchError::NoFilePart);
    }
    if items.iter().all(|item| item.selected_name().is_none()) {
        return Err(BatchError::NoFilesSelected);
    }
    Ok(items)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    engine: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let engine = state.engine.name().to_string();
    match state.engine.probe().await {
        Ok(version) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok",
                engine,
                version: Some(version),
                error: None,
            }),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse {
                status: "degraded",
                engine,
                version: None,
                error: Some(e.to_string()),
            }),
        ),
    }
}

// ── Error rendering ──────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl BatchError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            BatchError::NoFilePart
            | BatchError::NoFilesSelected
            | BatchError::NoFilesProvided
            | BatchError::InvalidMultipart(_)
            | BatchError::AllConversionsFailed { .. } => StatusCode::BAD_REQUEST,
            BatchError::EngineUnavailable { .. }
            | BatchError::ArchiveFailed(_)
            | BatchError::InvalidConfig(_)
            | BatchError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for BatchError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("{} {}: {}", status.as_u16(), self.kind(), self);
        } else {
            debug!("{} {}: {}", status.as_u16(), self.kind(), self);
        }

        let body = ErrorBody {
            error: self.to_string(),
            kind: self.kind(),
            details: self.details(),
        };
        (status, Json(body)).into_response()
    }
}
