//! Recommendation synthesis: turns matched/missing skills and the score into
//! improvements, strengths, skill gaps and formatting tips.

use crate::matching::models::{Recommendations, SkillMatch};
use crate::matching::taxonomy::{SkillTaxonomy, OTHER_CATEGORY};

const FUNDAMENTALS_IMPROVEMENTS: &[&str] = &[
    "Your resume needs significant alignment with the job requirements",
    "Focus on acquiring and highlighting relevant skills",
    "Consider taking courses or certifications in the missing skills",
    "Mirror the job description's terminology where it honestly reflects your experience",
];

const ENHANCE_IMPROVEMENTS: &[&str] = &[
    "Your resume shows good potential but could use some enhancement",
    "Try to highlight more specific examples of using the required skills",
];

const STRONG_ALIGNMENT_STRENGTHS: &[&str] = &[
    "Your resume shows strong alignment with the job requirements",
    "You have a good foundation of relevant skills",
];

pub const FORMAT_TIPS: &[&str] = &[
    "Consider using a clear, professional format",
    "Make sure your contact information is prominent",
    "Use bullet points to highlight achievements",
    "Include relevant metrics and results where possible",
    "Tailor your summary section to the role you are applying for",
];

/// Builds recommendations. Category groups follow taxonomy order; skills not in the
/// taxonomy are grouped last under "other".
pub fn synthesize(
    taxonomy: &SkillTaxonomy,
    missing_skills: &[String],
    matched_skills: &[SkillMatch],
    score: u32,
) -> Recommendations {
    let mut improvements = Vec::new();
    let mut strengths = Vec::new();
    let mut skill_gaps = Vec::new();

    for (key, skills) in group_by_category(taxonomy, missing_skills.iter().map(String::as_str)) {
        let list = skills.join(", ");
        skill_gaps.push(format!("{}: consider adding experience with {list}", label_for(taxonomy, key)));

        if let Some(template) = taxonomy.category(key).and_then(|c| c.improvement_template) {
            improvements.push(template.replace("{skills}", &list));
        }
    }

    if score < 50 {
        improvements.extend(FUNDAMENTALS_IMPROVEMENTS.iter().map(|s| s.to_string()));
    } else if score < 75 {
        improvements.extend(ENHANCE_IMPROVEMENTS.iter().map(|s| s.to_string()));
    } else {
        strengths.extend(STRONG_ALIGNMENT_STRENGTHS.iter().map(|s| s.to_string()));
    }

    let matched = matched_skills
        .iter()
        .filter(|s| s.is_match)
        .map(|s| s.name.as_str());
    for (key, skills) in group_by_category(taxonomy, matched) {
        strengths.push(format!(
            "Strong {} background in: {}",
            label_for(taxonomy, key),
            skills.join(", ")
        ));
    }

    Recommendations {
        improvements,
        strengths,
        skill_gaps,
        format: FORMAT_TIPS.iter().map(|s| s.to_string()).collect(),
    }
}

/// Groups skills by taxonomy category, in taxonomy order, dropping empty groups.
pub fn group_by_category<'a>(
    taxonomy: &SkillTaxonomy,
    skills: impl Iterator<Item = &'a str>,
) -> Vec<(&'static str, Vec<&'a str>)> {
    let mut groups: Vec<(&'static str, Vec<&'a str>)> = taxonomy
        .categories()
        .iter()
        .map(|c| (c.key, Vec::new()))
        .collect();
    groups.push((OTHER_CATEGORY, Vec::new()));

    for skill in skills {
        let key = taxonomy.category_of(skill);
        if let Some((_, bucket)) = groups.iter_mut().find(|(k, _)| *k == key) {
            bucket.push(skill);
        }
    }

    groups.retain(|(_, bucket)| !bucket.is_empty());
    groups
}

pub fn label_for(taxonomy: &SkillTaxonomy, key: &str) -> &'static str {
    taxonomy
        .category(key)
        .map(|c| c.label)
        .unwrap_or("Other")
}
