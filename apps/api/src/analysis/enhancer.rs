//! Analysis enhancement: augments a local [`Analysis`] with LLM insights.
//!
//! The local result is never replaced: insights are appended to the report and
//! suggestions appended to the recommendation lists. Score, skill lists, skill gaps
//! and format tips are left exactly as the matching engine produced them.
//!
//! Flow: short-input check → chunk resume text → per-chunk LLM call (parallel,
//! bounded, timed) → shape validation → merge.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::analysis::prompts::{ENHANCE_PROMPT_TEMPLATE, ENHANCE_SYSTEM};
use crate::chunking::{process_in_chunks, ChunkError, ChunkOptions};
use crate::config::Config;
use crate::llm_client::prompts::{JSON_ONLY_SYSTEM, NO_RESCORING_INSTRUCTION};
use crate::llm_client::{
    retry_options, strip_json_fences, ChatMessage, CompletionClient, CompletionOptions, LlmError,
};
use crate::matching::models::{Analysis, AnalysisSource};

#[derive(Debug, Clone)]
pub struct EnhancerOptions {
    pub chunk: ChunkOptions,
    /// Inputs shorter than this (either one) skip enhancement.
    pub min_input_chars: usize,
    pub job_excerpt_chars: usize,
    pub completion: CompletionOptions,
}

impl Default for EnhancerOptions {
    fn default() -> Self {
        Self {
            chunk: ChunkOptions {
                parallel: true,
                ..ChunkOptions::default()
            },
            min_input_chars: 100,
            job_excerpt_chars: 500,
            completion: CompletionOptions::default(),
        }
    }
}

impl EnhancerOptions {
    pub fn from_config(config: &Config) -> Self {
        // A chunk's call may use every retry attempt and backoff before it counts as timed out.
        let timeout_per_chunk = config
            .llm
            .as_ref()
            .and_then(|llm| retry_options(llm).worst_case())
            .unwrap_or(config.analysis_timeout);

        Self {
            chunk: ChunkOptions {
                max_chunk_size: config.chunk_max_chars,
                parallel: true,
                concurrency: config.chunk_concurrency,
                timeout_per_chunk,
            },
            ..Self::default()
        }
    }
}

/// Validated LLM contribution for one resume chunk.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Enhancement {
    pub insights: String,
    #[serde(default)]
    pub improvements: Vec<String>,
    #[serde(default)]
    pub strengths: Vec<String>,
}

/// Validates an LLM reply against the enhancement schema.
pub fn parse_enhancement(reply: &str) -> Result<Enhancement, LlmError> {
    let json = strip_json_fences(reply);
    let parsed: Enhancement = serde_json::from_str(json)
        .map_err(|e| LlmError::Malformed(format!("enhancement does not match schema: {e}")))?;

    let insights = parsed.insights.trim().to_string();
    if insights.is_empty() {
        return Err(LlmError::Malformed("enhancement has empty insights".to_string()));
    }

    Ok(Enhancement {
        insights,
        improvements: clean_list(parsed.improvements),
        strengths: clean_list(parsed.strengths),
    })
}

fn clean_list(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|s| s.trim().trim_start_matches('-').trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

pub struct Enhancer {
    client: Arc<dyn CompletionClient>,
    options: EnhancerOptions,
}

impl Enhancer {
    pub fn new(client: Arc<dyn CompletionClient>, options: EnhancerOptions) -> Self {
        Self { client, options }
    }

    /// Returns `local` augmented with LLM insights, or `local` unchanged when the
    /// inputs are too short to be worth a call.
    pub async fn enhance(
        &self,
        resume_text: &str,
        job_description: &str,
        local: &Analysis,
    ) -> Result<Analysis, ChunkError<LlmError>> {
        let min = self.options.min_input_chars;
        if resume_text.chars().count() < min || job_description.chars().count() < min {
            debug!("Content too short for AI enhancement, using local analysis");
            return Ok(local.clone());
        }

        let context = Arc::new(PromptContext::new(
            local,
            job_description,
            self.options.job_excerpt_chars,
        ));
        let system = format!("{ENHANCE_SYSTEM} {JSON_ONLY_SYSTEM}");
        let client = Arc::clone(&self.client);
        let completion = self.options.completion.clone();

        let processor = move |chunk: String, index: usize, total: usize| {
            let client = Arc::clone(&client);
            let completion = completion.clone();
            let messages = vec![
                ChatMessage::system(system.clone()),
                ChatMessage::user(context.render(&chunk, index + 1, total)),
            ];
            async move {
                let reply = client.complete(&messages, &completion).await?;
                parse_enhancement(&reply)
            }
        };

        info!("Starting AI enhancement");
        let enhancements = process_in_chunks(resume_text, processor, &self.options.chunk)
            .await
            .map_err(|e| {
                match e.chunk() {
                    Some(chunk) => warn!("AI enhancement failed at chunk {chunk}: {e}"),
                    None => warn!("AI enhancement failed: {e}"),
                }
                e
            })?;
        info!("AI enhancement produced {} insight block(s)", enhancements.len());

        Ok(merge(local, enhancements))
    }
}

/// Per-request prompt values shared by every chunk.
struct PromptContext {
    job_excerpt: String,
    score: String,
    matched: String,
    missing: String,
}

impl PromptContext {
    fn new(local: &Analysis, job_description: &str, excerpt_chars: usize) -> Self {
        let matched: Vec<&str> = local
            .matched_skills
            .iter()
            .filter(|s| s.is_match)
            .map(|s| s.name.as_str())
            .collect();

        Self {
            job_excerpt: excerpt(job_description, excerpt_chars),
            score: local.score.to_string(),
            matched: or_none(&matched.join(", ")),
            missing: or_none(&local.missing_skills.join(", ")),
        }
    }

    fn render(&self, chunk: &str, part: usize, total: usize) -> String {
        let (part, total) = (part.to_string(), total.to_string());
        fill_template(
            ENHANCE_PROMPT_TEMPLATE,
            &[
                ("{job_excerpt}", self.job_excerpt.as_str()),
                ("{score}", self.score.as_str()),
                ("{matched}", self.matched.as_str()),
                ("{missing}", self.missing.as_str()),
                ("{no_rescoring}", NO_RESCORING_INSTRUCTION),
                ("{part}", part.as_str()),
                ("{total}", total.as_str()),
                ("{resume_chunk}", chunk),
            ],
        )
    }
}

/// Substitutes placeholders in a single left-to-right pass. Inserted values are
/// never rescanned, so user text containing `{score}` and the like stays literal.
fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        match values.iter().find(|(placeholder, _)| tail.starts_with(placeholder)) {
            Some((placeholder, value)) => {
                out.push_str(value);
                rest = &tail[placeholder.len()..];
            }
            None => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn excerpt(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{cut}...")
}

fn or_none(list: &str) -> String {
    if list.is_empty() {
        "none".to_string()
    } else {
        list.to_string()
    }
}

fn merge(local: &Analysis, enhancements: Vec<Enhancement>) -> Analysis {
    let mut enhanced = local.clone();

    let insights: Vec<&str> = enhancements.iter().map(|e| e.insights.as_str()).collect();
    enhanced.detailed_analysis = format!(
        "{}\n\nAI-Enhanced Insights:\n{}",
        local.detailed_analysis,
        insights.join("\n\n")
    );

    for enhancement in enhancements {
        push_unique(&mut enhanced.recommendations.improvements, enhancement.improvements);
        push_unique(&mut enhanced.recommendations.strengths, enhancement.strengths);
    }

    enhanced.analysis_source = AnalysisSource::Enhanced;
    enhanced
}

fn push_unique(target: &mut Vec<String>, items: Vec<String>) {
    for item in items {
        if !target.iter().any(|existing| existing.eq_ignore_ascii_case(&item)) {
            target.push(item);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use crate::chunking::retry::with_retry;
    use crate::llm_client::test_support::ScriptedClient;
    use crate::matching::engine::analyze;

    const REPLY: &str = r#"{
        "insights": "The candidate's React work lines up with the frontend focus of the role.",
        "improvements": ["- Quantify the impact of the React migration", "Add AWS certification progress"],
        "strengths": ["Hands-on JavaScript delivery"]
    }"#;

    fn long_resume() -> String {
        "Jane Roe. Senior engineer with eight years of JavaScript and React experience, \
         building design systems and leading frontend teams across three product launches."
            .to_string()
    }

    fn long_job() -> String {
        "We are seeking a frontend engineer with JavaScript, React and AWS experience to build \
         customer-facing dashboards and mentor a small team in an agile environment."
            .to_string()
    }

    #[test]
    fn test_parse_enhancement_accepts_fenced_json() {
        let reply = format!("```json\n{REPLY}\n```");
        let enhancement = parse_enhancement(&reply).unwrap();
        assert_eq!(
            enhancement.improvements,
            vec![
                "Quantify the impact of the React migration".to_string(),
                "Add AWS certification progress".to_string(),
            ]
        );
        assert_eq!(enhancement.strengths.len(), 1);
    }

    #[test]
    fn test_parse_enhancement_rejects_free_text() {
        let err = parse_enhancement("Here are some thoughts about the resume...").unwrap_err();
        assert!(matches!(err, LlmError::Malformed(_)));
    }

    #[test]
    fn test_parse_enhancement_rejects_blank_insights() {
        let err = parse_enhancement(r#"{"insights": "   ", "improvements": []}"#).unwrap_err();
        assert!(err.to_string().contains("empty insights"));
    }

    #[test]
    fn test_parse_enhancement_defaults_missing_lists() {
        let enhancement = parse_enhancement(r#"{"insights": "Solid match overall."}"#).unwrap();
        assert!(enhancement.improvements.is_empty());
        assert!(enhancement.strengths.is_empty());
    }

    #[test]
    fn test_excerpt_truncates_on_characters() {
        assert_eq!(excerpt("short", 10), "short");
        assert_eq!(excerpt("ééééé", 3), "ééé...");
    }

    #[tokio::test]
    async fn test_short_inputs_skip_llm() {
        let client = ScriptedClient::replying(REPLY);
        let enhancer = Enhancer::new(client.clone(), EnhancerOptions::default());
        let local = analyze("React", "React developer");

        let result = enhancer.enhance("React", "React developer", &local).await.unwrap();

        assert_eq!(result, local);
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test]
    async fn test_enhancement_augments_without_replacing() {
        let client = ScriptedClient::replying(REPLY);
        let enhancer = Enhancer::new(client.clone(), EnhancerOptions::default());
        let (resume, job) = (long_resume(), long_job());
        let local = analyze(&resume, &job);

        let enhanced = enhancer.enhance(&resume, &job, &local).await.unwrap();

        assert_eq!(enhanced.analysis_source, AnalysisSource::Enhanced);
        assert_eq!(enhanced.score, local.score);
        assert_eq!(enhanced.matched_skills, local.matched_skills);
        assert_eq!(enhanced.missing_skills, local.missing_skills);
        assert_eq!(enhanced.recommendations.skill_gaps, local.recommendations.skill_gaps);
        assert_eq!(enhanced.recommendations.format, local.recommendations.format);
        assert!(enhanced.detailed_analysis.starts_with(&local.detailed_analysis));
        assert!(enhanced.detailed_analysis.contains("AI-Enhanced Insights:"));

        let improvements = &enhanced.recommendations.improvements;
        assert_eq!(&improvements[..local.recommendations.improvements.len()], &local.recommendations.improvements[..]);
        assert!(improvements.contains(&"Add AWS certification progress".to_string()));
        assert!(enhanced
            .recommendations
            .strengths
            .contains(&"Hands-on JavaScript delivery".to_string()));
    }

    #[tokio::test]
    async fn test_prompt_carries_local_findings() {
        let client = ScriptedClient::replying(REPLY);
        let enhancer = Enhancer::new(client.clone(), EnhancerOptions::default());
        let (resume, job) = (long_resume(), long_job());
        let local = analyze(&resume, &job);

        enhancer.enhance(&resume, &job, &local).await.unwrap();

        let prompts = client.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains(&format!("Match Score: {}%", local.score)));
        assert!(prompts[0].contains("Missing Skills: aws"));
        assert!(prompts[0].contains("Resume (part 1 of 1)"));
        assert!(prompts[0].contains("Jane Roe"));
    }

    #[test]
    fn test_fill_template_leaves_unknown_braces() {
        let filled = fill_template("{a} {b} {\n} {", &[("{a}", "1")]);
        assert_eq!(filled, "1 {b} {\n} {");
    }

    #[tokio::test]
    async fn test_placeholders_in_user_text_stay_literal() {
        let client = ScriptedClient::replying(REPLY);
        let enhancer = Enhancer::new(client.clone(), EnhancerOptions::default());
        let resume = format!("{} UNIQUE_RESUME_MARKER", long_resume());
        let job = format!(
            "{} The posting literally says {{score}} and {{resume_chunk}} here.",
            long_job()
        );
        let local = analyze(&resume, &job);

        enhancer.enhance(&resume, &job, &local).await.unwrap();

        let prompt = &client.prompts()[0];
        assert!(prompt.contains("literally says {score} and {resume_chunk} here"));
        assert_eq!(prompt.matches("UNIQUE_RESUME_MARKER").count(), 1);
        assert!(prompt.contains(&format!("Match Score: {}%", local.score)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_chunk_deadline_outlasts_retry_exhaustion() {
        let config = Config::from_lookup(|key| match key {
            "DEEPSEEK_API_KEY" => Some("sk-test123".to_string()),
            _ => None,
        })
        .unwrap();
        let retry = retry_options(config.llm.as_ref().unwrap());
        let options = EnhancerOptions::from_config(&config);

        let err = process_in_chunks(
            "a resume that never gets an answer",
            move |_chunk, _index, _total| {
                let retry = retry.clone();
                async move {
                    with_retry(
                        |_| std::future::pending::<Result<Enhancement, LlmError>>(),
                        &retry,
                    )
                    .await
                }
            },
            &options.chunk,
        )
        .await
        .unwrap_err();

        match err {
            ChunkError::Processor {
                chunk,
                elapsed_ms,
                source: LlmError::Timeout(_),
            } => {
                assert_eq!(chunk, 1);
                // three 30s attempts plus backoff
                assert!(elapsed_ms >= 90_000, "elapsed {elapsed_ms}ms");
            }
            other => panic!("expected the last LLM timeout, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_long_resume_is_chunked_and_deduplicated() {
        let client = ScriptedClient::replying(REPLY);
        let options = EnhancerOptions {
            chunk: ChunkOptions {
                max_chunk_size: 120,
                parallel: true,
                concurrency: 2,
                timeout_per_chunk: Duration::from_secs(5),
            },
            ..EnhancerOptions::default()
        };
        let enhancer = Enhancer::new(client.clone(), options);
        let resume = format!("{}\n\n{}\n\n{}", long_resume(), long_resume(), long_resume());
        let job = long_job();
        let local = analyze(&resume, &job);

        let enhanced = enhancer.enhance(&resume, &job, &local).await.unwrap();

        assert!(client.call_count() >= 3);
        let added = enhanced
            .recommendations
            .improvements
            .iter()
            .filter(|s| s.as_str() == "Add AWS certification progress")
            .count();
        assert_eq!(added, 1);
    }

    #[tokio::test]
    async fn test_malformed_reply_is_reported_with_chunk() {
        let client = ScriptedClient::replying("This is not JSON but it is long enough to pass.");
        let enhancer = Enhancer::new(client, EnhancerOptions::default());
        let (resume, job) = (long_resume(), long_job());
        let local = analyze(&resume, &job);

        let err = enhancer.enhance(&resume, &job, &local).await.unwrap_err();

        assert_eq!(err.chunk(), Some(1));
        assert!(matches!(
            err,
            ChunkError::Processor { source: LlmError::Malformed(_), .. }
        ));
    }
}
