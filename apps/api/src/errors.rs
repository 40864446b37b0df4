use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::chunking::ChunkError;
use crate::llm_client::LlmError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Analysis timed out after {0}ms")]
    Timeout(u128),

    #[error("Upstream returned an invalid response: {0}")]
    UpstreamMalformed(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<LlmError> for AppError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Timeout(t) => AppError::Timeout(t.0.as_millis()),
            e if e.is_malformed() => AppError::UpstreamMalformed(e.to_string()),
            e => AppError::Llm(e.to_string()),
        }
    }
}

impl From<ChunkError<LlmError>> for AppError {
    fn from(err: ChunkError<LlmError>) -> Self {
        match err {
            ChunkError::Timeout { elapsed_ms, .. } => AppError::Timeout(elapsed_ms),
            ChunkError::Processor { source, .. } => source.into(),
            ChunkError::Worker(msg) => AppError::Internal(anyhow::anyhow!(msg)),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Timeout(ms) => {
                tracing::warn!("Analysis timed out after {ms}ms");
                (
                    StatusCode::GATEWAY_TIMEOUT,
                    "TIMEOUT",
                    format!("Analysis timed out after {ms}ms. Try a smaller file or a shorter job description."),
                )
            }
            AppError::UpstreamMalformed(msg) => {
                tracing::error!("Upstream malformed response: {msg}");
                (
                    StatusCode::BAD_GATEWAY,
                    "UPSTREAM_MALFORMED",
                    "The AI provider returned an incomplete or malformed response".to_string(),
                )
            }
            AppError::Llm(msg) => {
                tracing::error!("LLM error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "LLM_ERROR",
                    "An AI processing error occurred".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": message,
            "code": code
        }));

        (status, body).into_response()
    }
}
