pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    http::Uri,
    routing::{get, post},
    Router,
};

use crate::analysis::handlers;
use crate::analysis::intake::MAX_RESUME_BYTES;
use crate::errors::AppError;
use crate::state::AppState;

/// Resume limit plus room for the job description and multipart framing.
const MAX_BODY_BYTES: usize = MAX_RESUME_BYTES + 1024 * 1024;

async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(format!("No route for {uri}"))
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/health", get(health::health_handler))
        .route("/api/analyze", post(handlers::handle_analyze))
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}
