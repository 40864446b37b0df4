use serde::{Deserialize, Serialize};

/// A skill drawn from the job description and whether the resume mentions it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillMatch {
    pub name: String,
    #[serde(rename = "match")]
    pub is_match: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendations {
    pub improvements: Vec<String>,
    pub strengths: Vec<String>,
    pub skill_gaps: Vec<String>,
    pub format: Vec<String>,
}

/// Which path produced an [`Analysis`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisSource {
    #[default]
    Local,
    Enhanced,
}

/// Result of matching a resume against a job description. Serialized directly
/// as the `/api/analyze` response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    /// 0 – 100
    pub score: u32,
    pub matched_skills: Vec<SkillMatch>,
    /// Names of `matched_skills` entries with `is_match == false`, in the same order.
    pub missing_skills: Vec<String>,
    pub recommendations: Recommendations,
    pub detailed_analysis: String,
    /// Set when the job description contained no recognizable skills.
    pub low_confidence: bool,
    pub analysis_source: AnalysisSource,
}

impl Analysis {
    pub fn matched_count(&self) -> usize {
        self.matched_skills.iter().filter(|s| s.is_match).count()
    }
}
