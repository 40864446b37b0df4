//! Matching engine: runs skill detection over a resume and job description and
//! assembles the [`Analysis`] record plus its text report.
//!
//! Pure and synchronous: no I/O, no clock, no randomness. Safe to call from any
//! number of concurrent requests; the only shared data is the static taxonomy.

use crate::matching::matcher::find_matches;
use crate::matching::models::{Analysis, AnalysisSource, Recommendations, SkillMatch};
use crate::matching::recommendations::{group_by_category, label_for, synthesize};
use crate::matching::score::compute_score;
use crate::matching::taxonomy::{SkillTaxonomy, DEFAULT_TAXONOMY};

/// Analyzes `resume_text` against `job_description` using the default taxonomy.
/// Never fails; empty inputs produce a low-confidence analysis.
pub fn analyze(resume_text: &str, job_description: &str) -> Analysis {
    analyze_with(&DEFAULT_TAXONOMY, resume_text, job_description)
}

pub fn analyze_with(taxonomy: &SkillTaxonomy, resume_text: &str, job_description: &str) -> Analysis {
    let all_skills = taxonomy.all_skills();
    let job_skills = find_matches(job_description, &all_skills);
    let present = find_matches(resume_text, &job_skills);

    let matched_skills: Vec<SkillMatch> = job_skills
        .iter()
        .map(|skill| SkillMatch {
            name: skill.to_string(),
            is_match: present.contains(skill),
        })
        .collect();

    let missing_skills: Vec<String> = matched_skills
        .iter()
        .filter(|s| !s.is_match)
        .map(|s| s.name.clone())
        .collect();

    let matched_count = matched_skills.iter().filter(|s| s.is_match).count();
    let score = compute_score(matched_count, job_skills.len());
    let low_confidence = job_skills.is_empty();

    let recommendations = synthesize(taxonomy, &missing_skills, &matched_skills, score);
    let detailed_analysis = render_report(
        taxonomy,
        score,
        low_confidence,
        &matched_skills,
        &recommendations,
    );

    Analysis {
        score,
        matched_skills,
        missing_skills,
        recommendations,
        detailed_analysis,
        low_confidence,
        analysis_source: AnalysisSource::Local,
    }
}

/// Renders the multi-section text report. Section order is fixed; empty sections are omitted.
fn render_report(
    taxonomy: &SkillTaxonomy,
    score: u32,
    low_confidence: bool,
    matched_skills: &[SkillMatch],
    recommendations: &Recommendations,
) -> String {
    let matched_count = matched_skills.iter().filter(|s| s.is_match).count();
    let missing_count = matched_skills.len() - matched_count;

    let mut sections: Vec<String> = Vec::new();

    let mut summary = vec![
        format!("Overall match score: {score}%"),
        format!(
            "Matched {matched_count} of {} skills from the job description ({missing_count} missing)",
            matched_skills.len()
        ),
    ];
    if low_confidence {
        summary.push(
            "No recognizable skills were found in the job description; the score is low confidence"
                .to_string(),
        );
    }
    sections.push(summary.join("\n"));

    let matched = group_by_category(
        taxonomy,
        matched_skills.iter().filter(|s| s.is_match).map(|s| s.name.as_str()),
    );
    let missing = group_by_category(
        taxonomy,
        matched_skills.iter().filter(|s| !s.is_match).map(|s| s.name.as_str()),
    );
    let all = group_by_category(taxonomy, matched_skills.iter().map(|s| s.name.as_str()));

    if !all.is_empty() {
        let mut lines = vec!["Skills by category:".to_string()];
        for (key, skills) in &all {
            let hits = lookup(&matched, key);
            let misses = lookup(&missing, key);
            let rate = compute_score(hits.len(), skills.len());
            lines.push(format!(
                "{} ({rate}% match)",
                label_for(taxonomy, key).to_uppercase()
            ));
            if !hits.is_empty() {
                lines.push(format!("  Matched: {}", hits.join(", ")));
            }
            if !misses.is_empty() {
                lines.push(format!("  Missing: {}", misses.join(", ")));
            }
        }
        sections.push(lines.join("\n"));
    }

    push_list(&mut sections, "Skill development priorities:", &recommendations.skill_gaps);
    push_list(&mut sections, "Key strengths:", &recommendations.strengths);
    push_list(&mut sections, "Recommended actions:", &recommendations.improvements);
    push_list(&mut sections, "Format recommendations:", &recommendations.format);

    sections.join("\n\n")
}

fn lookup<'a, 'b>(groups: &'b [(&'static str, Vec<&'a str>)], key: &str) -> &'b [&'a str] {
    groups
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, skills)| skills.as_slice())
        .unwrap_or(&[])
}

fn push_list(sections: &mut Vec<String>, heading: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    let mut lines = vec![heading.to_string()];
    lines.extend(items.iter().map(|item| format!("- {item}")));
    sections.push(lines.join("\n"));
}
