use std::time::Duration;

use anyhow::{bail, Context, Result};

/// Application configuration loaded from environment variables.
/// Fails at startup if a variable is present but malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    /// `None` when no API key is configured; the service then runs local analysis only.
    pub llm: Option<LlmConfig>,
    /// Deadline for the whole enhancement step of one request.
    pub analysis_timeout: Duration,
    /// Return the local analysis when enhancement fails or times out.
    pub llm_fallback: bool,
    pub chunk_max_chars: usize,
    pub chunk_concurrency: usize,
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub request_timeout: Duration,
    pub max_attempts: u32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key → value lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let request_timeout = Duration::from_millis(parse_or(&lookup, "LLM_TIMEOUT_MS", 30_000u64)?);

        let llm = match lookup("DEEPSEEK_API_KEY").filter(|k| !k.trim().is_empty()) {
            Some(api_key) => {
                validate_api_key(&api_key)?;
                Some(LlmConfig {
                    api_key,
                    base_url: lookup("LLM_BASE_URL")
                        .unwrap_or_else(|| "https://api.deepseek.com".to_string()),
                    model: lookup("LLM_MODEL").unwrap_or_else(|| "deepseek-chat".to_string()),
                    request_timeout,
                    max_attempts: parse_or(&lookup, "LLM_MAX_ATTEMPTS", 3u32)?,
                })
            }
            None => None,
        };

        Ok(Config {
            port: parse_or(&lookup, "PORT", 8080u16)?,
            rust_log: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            llm,
            analysis_timeout: Duration::from_millis(parse_or(
                &lookup,
                "ANALYSIS_TIMEOUT_MS",
                90_000u64,
            )?),
            llm_fallback: parse_bool_or(&lookup, "LLM_FALLBACK", true)?,
            chunk_max_chars: parse_or(&lookup, "CHUNK_MAX_CHARS", 5000usize)?,
            chunk_concurrency: parse_or(&lookup, "CHUNK_CONCURRENCY", 3usize)?,
        })
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' must be a number, got '{raw}'")),
        None => Ok(default),
    }
}

fn parse_bool_or(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: bool) -> Result<bool> {
    match lookup(key).map(|v| v.trim().to_lowercase()) {
        Some(v) if v == "true" => Ok(true),
        Some(v) if v == "false" => Ok(false),
        Some(v) => bail!("Environment variable '{key}' must be 'true' or 'false', got '{v}'"),
        None => Ok(default),
    }
}

fn validate_api_key(key: &str) -> Result<()> {
    if key.len() < 6 || !key.chars().any(|c| c.is_ascii_digit()) {
        bail!("DEEPSEEK_API_KEY looks invalid (expected at least 6 characters including a digit)");
    }
    Ok(())
}
