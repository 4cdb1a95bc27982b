//! Generation backend: the `GenerationClient` seam and its OpenAI implementation.
//!
//! We only call chat.completions (non-streaming) and return the raw reply text.
//! Calls are instrumented and log model names, latencies, and response sizes (not contents).
//! Transient failures are retried here with exponential backoff and jitter; this is
//! independent from the orchestrator regenerating a whole unit after a quality failure.
//!
//! NOTE: We never log the API key.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use rand::Rng;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::config::CallPolicy;
use crate::error::{ClientError, GenerationError};
use crate::orchestrator::CancelSignal;

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct ChatMessage {
  pub role: String,
  pub content: String,
}

impl ChatMessage {
  pub fn system(content: impl Into<String>) -> Self {
    Self { role: "system".into(), content: content.into() }
  }

  pub fn user(content: impl Into<String>) -> Self {
    Self { role: "user".into(), content: content.into() }
  }
}

#[derive(Clone, Debug, Default)]
pub struct ChatOptions {
  pub stream: bool,
  pub max_tokens: Option<u32>,
}

/// Anything that can turn a conversation into one reply.
#[async_trait]
pub trait GenerationClient: Send + Sync {
  async fn chat(&self, messages: &[ChatMessage], opts: &ChatOptions) -> Result<String, ClientError>;
}

#[derive(Clone)]
pub struct OpenAI {
  pub client: reqwest::Client,
  pub api_key: String,
  pub base_url: String,
  pub model: String,
}

impl OpenAI {
  /// Construct the client if we find OPENAI_API_KEY; otherwise return None.
  pub fn from_env() -> Option<Self> {
    let api_key = std::env::var("OPENAI_API_KEY").ok()?;
    let base_url =
      std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".into());
    let model = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o".into());

    // Overall call duration is bounded by CallPolicy::timeout_secs.
    let client = reqwest::Client::builder()
      .connect_timeout(Duration::from_secs(20))
      .build()
      .ok()?;

    Some(Self { client, api_key, base_url, model })
  }
}

#[async_trait]
impl GenerationClient for OpenAI {
  #[instrument(level = "info", skip(self, messages, opts), fields(model = %self.model, messages = messages.len()))]
  async fn chat(&self, messages: &[ChatMessage], opts: &ChatOptions) -> Result<String, ClientError> {
    let url = format!("{}/chat/completions", self.base_url);
    let req = ChatCompletionRequest {
      model: &self.model,
      messages,
      temperature: 0.7,
      stream: opts.stream,
      max_tokens: opts.max_tokens,
    };

    let start = Instant::now();
    let res = self.client.post(&url)
      .header(USER_AGENT, "thinkgen/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&req).send().await.map_err(|e| ClientError::Transport(e.to_string()))?;

    if !res.status().is_success() {
      let status = res.status().as_u16();
      let body = res.text().await.unwrap_or_default();
      let message = extract_openai_error(&body).unwrap_or(body);
      return Err(ClientError::Http { status, message });
    }

    let body: ChatCompletionResponse = res.json().await.map_err(|e| ClientError::Decode(e.to_string()))?;
    if let Some(usage) = &body.usage {
      info!(prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "OpenAI usage");
    }
    let text = body.choices.into_iter().next()
      .and_then(|c| c.message.content)
      .unwrap_or_default();
    info!(elapsed = ?start.elapsed(), reply_len = text.len(), "Model response received");
    Ok(text)
  }
}

/// Delay before retry number `attempt` (1-based), without jitter.
pub fn backoff_base(policy: &CallPolicy, attempt: u32) -> Duration {
  let factor = 1u64.checked_shl(attempt.saturating_sub(1)).unwrap_or(u64::MAX);
  Duration::from_millis(policy.base_delay_ms.saturating_mul(factor).min(policy.max_delay_ms))
}

fn backoff_delay(policy: &CallPolicy, attempt: u32) -> Duration {
  let jitter = if policy.jitter_ms == 0 { 0 } else { rand::thread_rng().gen_range(0..=policy.jitter_ms) };
  backoff_base(policy, attempt) + Duration::from_millis(jitter)
}

/// One logical backend call: per-call timeout, transient retries, cancellation checks.
pub async fn chat_with_policy(
  client: &dyn GenerationClient,
  messages: &[ChatMessage],
  opts: &ChatOptions,
  policy: &CallPolicy,
  cancel: &CancelSignal,
) -> Result<String, GenerationError> {
  let attempts = policy.max_attempts.max(1);
  let mut attempt = 1;
  loop {
    if cancel.is_cancelled() {
      return Err(GenerationError::Cancelled);
    }
    let call = client.chat(messages, opts);
    let outcome = match tokio::time::timeout(Duration::from_secs(policy.timeout_secs), call).await {
      Ok(res) => res,
      Err(_) => Err(ClientError::Timeout(policy.timeout_secs)),
    };
    match outcome {
      Ok(text) => return Ok(text),
      Err(e) if e.is_transient() && attempt < attempts => {
        let delay = backoff_delay(policy, attempt);
        warn!(target: "pipeline", attempt, ?delay, error = %e, "Transient backend failure; backing off");
        tokio::time::sleep(delay).await;
        attempt += 1;
      }
      Err(e) => return Err(e.into()),
    }
  }
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
  model: &'a str,
  messages: &'a [ChatMessage],
  temperature: f32,
  stream: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  max_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp { content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}

/// Try to extract a clean error message from OpenAI error body.
fn extract_openai_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error.message)
}
