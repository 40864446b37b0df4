/// Score reported when the job description yields no taxonomy skills.
pub const NEUTRAL_SCORE: u32 = 0;

/// Percentage of job-description skills found in the resume, rounded to an integer.
///
/// `total == 0` returns [`NEUTRAL_SCORE`]; callers flag such analyses as low confidence.
pub fn compute_score(matched: usize, total: usize) -> u32 {
    if total == 0 {
        return NEUTRAL_SCORE;
    }
    let score = ((matched as f64 / total as f64) * 100.0).round();
    score.clamp(0.0, 100.0) as u32
}
