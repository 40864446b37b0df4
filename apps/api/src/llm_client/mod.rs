//! LLM Client: the single point of entry for chat-completion calls.
//!
//! ARCHITECTURAL RULE: No other module may call the provider API directly.
//! Callers depend on the `CompletionClient` trait; `LlmClient` is the HTTP
//! implementation, constructed once at startup and injected through `AppState`.
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::chunking::retry::{with_retry_if, RetryOptions, TimedOut};
use crate::config::LlmConfig;

pub mod prompts;

/// Replies shorter than this are treated as cut off.
const MIN_CONTENT_CHARS: usize = 50;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("LLM returned empty content")]
    EmptyContent,

    #[error("LLM response appears truncated ({len} chars)")]
    Truncated { len: usize },

    #[error("Invalid response from LLM: {0}")]
    Malformed(String),

    #[error("LLM request timed out: {0}")]
    Timeout(#[from] TimedOut),
}

impl LlmError {
    /// True for failures a later attempt may not repeat: network errors, timeouts,
    /// rate limiting (429) and server errors (5xx).
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::Http(_) | LlmError::Timeout(_) => true,
            LlmError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// True for replies that arrived but could not be used.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            LlmError::Parse(_)
                | LlmError::EmptyContent
                | LlmError::Truncated { .. }
                | LlmError::Malformed(_)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompletionOptions {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 2000,
        }
    }
}

/// Anything that can turn a conversation into a single reply.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<String, LlmError>;
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// Retry policy applied to every completion call made with `config`.
pub fn retry_options(config: &LlmConfig) -> RetryOptions {
    RetryOptions {
        max_attempts: config.max_attempts,
        timeout: Some(config.request_timeout),
        ..RetryOptions::default()
    }
}

/// OpenAI-compatible chat-completions client with retry and per-attempt timeout.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
    endpoint: String,
    model: String,
    retry: RetryOptions,
}

impl LlmClient {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        Ok(Self {
            client: Client::builder().build()?,
            api_key: config.api_key.clone(),
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            retry: retry_options(config),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn send_once(
        &self,
        request: &ChatCompletionRequest<'_>,
        attempt: u32,
    ) -> Result<String, LlmError> {
        debug!("LLM call attempt {attempt} to {}", self.endpoint);

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorEnvelope>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let completion: ChatCompletionResponse = response.json().await?;
        if let Some(usage) = &completion.usage {
            debug!(
                "LLM call succeeded: prompt_tokens={}, completion_tokens={}",
                usage.prompt_tokens, usage.completion_tokens
            );
        }

        extract_content(completion)
    }
}

#[async_trait]
impl CompletionClient for LlmClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<String, LlmError> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
        };

        with_retry_if(
            |attempt| self.send_once(&request, attempt),
            &self.retry,
            LlmError::is_retryable,
        )
        .await
    }
}

fn extract_content(completion: ChatCompletionResponse) -> Result<String, LlmError> {
    let content = completion
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|c| !c.trim().is_empty())
        .ok_or(LlmError::EmptyContent)?;

    let len = content.chars().count();
    if len < MIN_CONTENT_CHARS {
        return Err(LlmError::Truncated { len });
    }
    Ok(content)
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
pub fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}

/// Canned `CompletionClient` for exercising callers without a network.
#[cfg(test)]
pub mod test_support {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use super::*;

    pub struct ScriptedClient {
        reply: String,
        delay: Duration,
        calls: AtomicUsize,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedClient {
        pub fn replying(reply: &str) -> Arc<Self> {
            Self::slow(reply, Duration::ZERO)
        }

        pub fn slow(reply: &str, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.to_string(),
                delay,
                calls: AtomicUsize::new(0),
                prompts: Mutex::new(Vec::new()),
            })
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        /// User-message contents received so far.
        pub fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CompletionClient for ScriptedClient {
        async fn complete(
            &self,
            messages: &[ChatMessage],
            _options: &CompletionOptions,
        ) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            {
                let mut prompts = self.prompts.lock().unwrap();
                prompts.extend(
                    messages
                        .iter()
                        .filter(|m| m.role == Role::User)
                        .map(|m| m.content.clone()),
                );
            }
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            Ok(self.reply.clone())
        }
    }
}
