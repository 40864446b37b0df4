use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// GET /health, GET /api/health
/// Reports `degraded` when no LLM is configured; analysis still works locally.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    let llm = if state.enhancer.is_some() {
        "configured"
    } else {
        "not_configured"
    };
    let status = if state.enhancer.is_some() { "ok" } else { "degraded" };

    Json(json!({
        "status": status,
        "version": env!("CARGO_PKG_VERSION"),
        "service": "skillmatch-api",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptimeSecs": state.started_at.elapsed().as_secs(),
        "services": { "llm": llm }
    }))
}
