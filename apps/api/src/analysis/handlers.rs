use std::time::Instant;

use axum::{
    extract::{Multipart, State},
    Json,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::analysis::enhancer::Enhancer;
use crate::analysis::intake::{
    extract_text, read_submission, validate_job_description, validate_resume,
};
use crate::errors::AppError;
use crate::matching::engine::analyze;
use crate::matching::models::Analysis;
use crate::state::AppState;

/// POST /api/analyze
pub async fn handle_analyze(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<Analysis>, AppError> {
    let request_id = Uuid::new_v4();
    let started = Instant::now();

    let submission = read_submission(multipart).await?;
    let format = validate_resume(&submission.resume)?;
    validate_job_description(&submission.job_description)?;
    info!(
        %request_id,
        "Analysis request: file='{}' format={format:?} size={} bytes",
        submission.resume.file_name,
        submission.resume.bytes.len()
    );

    let resume_text = extract_text(&submission.resume, format).await?;
    info!(%request_id, "Extracted resume text: {} chars", resume_text.chars().count());

    let local = analyze(&resume_text, &submission.job_description);
    info!(
        %request_id,
        "Local analysis: score={} matched={} missing={}",
        local.score,
        local.matched_count(),
        local.missing_skills.len()
    );

    let analysis = match &state.enhancer {
        Some(enhancer) => {
            enhance_or_fallback(
                &state,
                enhancer,
                &resume_text,
                &submission.job_description,
                local,
                request_id,
            )
            .await?
        }
        None => local,
    };

    info!(
        %request_id,
        "Analysis completed in {:.2}s (source: {:?})",
        started.elapsed().as_secs_f64(),
        analysis.analysis_source
    );
    Ok(Json(analysis))
}

/// Runs enhancement under the request deadline. Failures either fall back to the
/// local result or surface as an `AppError`, depending on `LLM_FALLBACK`.
async fn enhance_or_fallback(
    state: &AppState,
    enhancer: &Enhancer,
    resume_text: &str,
    job_description: &str,
    local: Analysis,
    request_id: Uuid,
) -> Result<Analysis, AppError> {
    let deadline = state.config.analysis_timeout;
    let failure = match tokio::time::timeout(
        deadline,
        enhancer.enhance(resume_text, job_description, &local),
    )
    .await
    {
        Ok(Ok(enhanced)) => return Ok(enhanced),
        Ok(Err(e)) => AppError::from(e),
        Err(_) => AppError::Timeout(deadline.as_millis()),
    };

    if state.config.llm_fallback {
        warn!(%request_id, "Enhancement failed, returning local analysis: {failure}");
        Ok(local)
    } else {
        Err(failure)
    }
}
