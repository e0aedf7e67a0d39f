//! HTTP surface — routes, multipart decoding, and outcome-to-status mapping.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tracing::warn;

use crate::error::{Error, ValidationError};
use crate::submission::{FieldMap, Processor, Submission, Upload};

/// Name of the multipart part carrying the résumé file.
pub const UPLOAD_FIELD: &str = "cv";

/// Headroom above the attachment ceiling for form fields and multipart
/// framing, so oversize uploads reach the stager's own ceiling check instead
/// of dying as an opaque 413.
const BODY_LIMIT_HEADROOM: usize = 2 * 1024 * 1024;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub processor: Arc<Processor>,
}

/// Caller-visible result object.
#[derive(Debug, Serialize)]
pub struct ApiResponse {
    pub success: bool,
    pub message: String,
}

/// Build the Axum router for the intake service.
pub fn intake_routes(processor: Arc<Processor>) -> Router {
    let body_limit = processor.config().max_attachment_bytes as usize + BODY_LIMIT_HEADROOM;

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/submit-form", post(submit_form))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .with_state(AppState { processor })
}

// ── Probes ──────────────────────────────────────────────────────────────

async fn root() -> &'static str {
    "Email API is running..."
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "careers-intake"
    }))
}

// ── Submission ──────────────────────────────────────────────────────────

async fn submit_form(State(state): State<AppState>, multipart: Multipart) -> Response {
    let submission = match decode_submission(multipart).await {
        Ok(submission) => submission,
        Err(e) => return reject(Error::Validation(e)),
    };

    match state.processor.process(submission).await {
        Ok(message) => (
            StatusCode::OK,
            Json(ApiResponse {
                success: true,
                message,
            }),
        )
            .into_response(),
        Err(e) => reject(e),
    }
}

/// Decode the multipart body into an ordered field map plus the optional
/// upload. Text parts become fields; the part named `cv` is the résumé.
async fn decode_submission(mut multipart: Multipart) -> Result<Submission, ValidationError> {
    let mut fields = FieldMap::new();
    let mut upload: Option<Upload> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ValidationError::MalformedPayload(e.to_string()))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            return Err(ValidationError::MalformedPayload("unnamed form part".into()));
        };

        if name == UPLOAD_FIELD {
            if upload.is_some() {
                return Err(ValidationError::InvalidField(name));
            }
            let file_name = field.file_name().unwrap_or("resume").to_string();
            let media_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ValidationError::MalformedPayload(e.to_string()))?;
            upload = Some(Upload {
                file_name,
                media_type,
                bytes: bytes.to_vec(),
            });
        } else {
            let value = field
                .text()
                .await
                .map_err(|_| ValidationError::InvalidField(name.clone()))?;
            fields.insert(name, value)?;
        }
    }

    Ok(Submission::new(fields, upload))
}

/// Map a pipeline error to its caller-visible rejection.
///
/// Validation and attachment problems are the caller's to fix (400); a
/// delivery failure means the upstream mail service let us down (502). The
/// payload carries only the error's display text — safe, human-readable, no
/// transport internals or credentials.
fn reject(error: Error) -> Response {
    let status = match &error {
        Error::Validation(_) | Error::Attachment(_) => StatusCode::BAD_REQUEST,
        Error::Delivery(_) => StatusCode::BAD_GATEWAY,
        Error::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    warn!(status = %status, reason = %error, "Submission rejected");

    (
        status,
        Json(ApiResponse {
            success: false,
            message: error.to_string(),
        }),
    )
        .into_response()
}
