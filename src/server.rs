//! HTTP front end.
//!
//! | Method | Path | Handler |
//! |---|---|---|
//! | `POST` | `/api/images/optimize` | multipart upload → [`OptimizeResponse`] |
//! | `GET` | `/health` | `{"status":"ok"}` |
//! | `GET` | `/presets` | the preset table |
//! | `GET` | `/assets/*` | stored files (filesystem sink only) |
//!
//! Errors are `{"error": "..."}` with 400 for client mistakes and 500 for
//! failures on an acceptable request. A client that disconnects mid-request
//! drops the handler future, which cancels its transcode job.

use crate::config::{ServiceConfig, StorageBackend};
use crate::presets::Preset;
use crate::process::{Pipeline, PipelineError, UploadRequest, parse_requested_format};
use crate::types::OptimizeResponse;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use std::num::IntErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Room for multipart boundaries and the small text fields.
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        if err.is_client_error() {
            warn!(error = %err, "rejected upload");
            Self::bad_request(err.to_string())
        } else {
            error!(error = %err, "optimization failed");
            Self::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

/// Build the router. `assets_dir` is served at `/assets` when set.
pub fn router(pipeline: Arc<Pipeline>, assets_dir: Option<PathBuf>) -> Router {
    let body_limit = pipeline.max_upload_bytes() + MULTIPART_OVERHEAD;
    let mut app = Router::new()
        .route("/api/images/optimize", post(optimize_image))
        .route("/health", get(health))
        .route("/presets", get(list_presets));
    if let Some(dir) = assets_dir {
        app = app.nest_service("/assets", ServeDir::new(dir));
    }
    app.layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { pipeline })
}

/// Bind and serve until Ctrl-C.
pub async fn serve(config: &ServiceConfig, pipeline: Arc<Pipeline>) -> std::io::Result<()> {
    let assets_dir = match config.storage.backend {
        StorageBackend::Filesystem => Some(PathBuf::from(&config.storage.root)),
        StorageBackend::S3 => None,
    };
    let app = router(pipeline, assets_dir);
    let addr = config.server.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn list_presets(State(state): State<AppState>) -> Json<Vec<Preset>> {
    Json(state.pipeline.presets().iter().copied().collect())
}

/// Raw multipart fields before interpretation.
#[derive(Default)]
struct UploadForm {
    file: Option<(Vec<u8>, String)>,
    preset: Option<String>,
    format: Option<String>,
    convert: Option<String>,
    quality: Option<String>,
}

async fn read_form(mut multipart: Multipart, limit: usize) -> Result<UploadForm, ApiError> {
    let mut form = UploadForm::default();
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return Err(multipart_error(e.status(), &e.body_text(), limit)),
        };
        let name = field.name().unwrap_or_default().to_string();
        if name == "file" {
            let mime = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| multipart_error(e.status(), &e.body_text(), limit))?;
            form.file = Some((bytes.to_vec(), mime));
            continue;
        }
        let slot = match name.as_str() {
            "preset" => &mut form.preset,
            "format" => &mut form.format,
            "convert" => &mut form.convert,
            "quality" => &mut form.quality,
            _ => continue,
        };
        let text = field
            .text()
            .await
            .map_err(|e| multipart_error(e.status(), &e.body_text(), limit))?;
        *slot = Some(text);
    }
    Ok(form)
}

fn multipart_error(status: StatusCode, detail: &str, limit: usize) -> ApiError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::bad_request(format!(
            "File too large: upload exceeds the {limit} byte limit"
        ))
    } else {
        ApiError::bad_request(format!("Malformed upload: {detail}"))
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn interpret(form: UploadForm, state: &AppState) -> Result<UploadRequest, PipelineError> {
    let (bytes, declared_mime) = form
        .file
        .ok_or_else(|| PipelineError::InvalidRequest("No file provided".into()))?;
    let preset = state
        .pipeline
        .presets()
        .resolve(non_empty(&form.preset).unwrap_or("large"))?
        .name;
    let requested_format = parse_requested_format(
        form.format.as_deref(),
        state.pipeline.unknown_format_policy(),
    )?;
    let convert = !non_empty(&form.convert).is_some_and(|v| v.eq_ignore_ascii_case("false"));
    let quality_override = non_empty(&form.quality).map(parse_quality).transpose()?;

    Ok(UploadRequest {
        bytes,
        declared_mime,
        preset,
        convert,
        requested_format,
        quality_override,
    })
}

/// Parse a `quality` field. Integers beyond `i64` saturate so they are
/// clamped like any other out-of-range value; non-integers are rejected.
fn parse_quality(raw: &str) -> Result<i64, PipelineError> {
    raw.parse::<i64>().or_else(|e| match e.kind() {
        IntErrorKind::PosOverflow => Ok(i64::MAX),
        IntErrorKind::NegOverflow => Ok(i64::MIN),
        _ => Err(PipelineError::InvalidRequest(format!(
            "quality must be an integer, got {raw:?}"
        ))),
    })
}

async fn optimize_image(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<OptimizeResponse>, ApiError> {
    let multipart = multipart.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let form = read_form(multipart, state.pipeline.max_upload_bytes()).await?;
    let request = interpret(form, &state)?;
    let result = state.pipeline.optimize(request).await?;
    Ok(Json(OptimizeResponse::from(&result)))
}
