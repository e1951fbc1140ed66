use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::types::{ApiErrorEnvelope, ChatRequest, ChatResponse, Completion};
use crate::{ChatCompleter, ChatError, Result};

// ─── ClientConfig ─────────────────────────────────────────────────────────

/// Connection settings for [`OpenAiClient`].
#[derive(Clone)]
pub struct ClientConfig {
    /// API root, e.g. `https://api.openai.com/v1`. A trailing `/` is ignored.
    pub base_url: String,
    pub api_key: String,
    pub timeout: Duration,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ClientConfig {
    /// Build a config reading the API key from the environment variable
    /// `api_key_env`. Fails with [`ChatError::MissingApiKey`] when the
    /// variable is unset or blank.
    pub fn from_env(
        base_url: impl Into<String>,
        api_key_env: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let api_key = std::env::var(api_key_env)
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ChatError::MissingApiKey(api_key_env.to_string()))?;
        Ok(Self {
            base_url: base_url.into(),
            api_key,
            timeout,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

// ─── OpenAiClient ─────────────────────────────────────────────────────────

/// HTTP implementation of [`ChatCompleter`] for OpenAI-compatible servers.
///
/// One request per call: no retries, no streaming.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl OpenAiClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self { http, config })
    }
}

#[async_trait::async_trait]
impl ChatCompleter for OpenAiClient {
    async fn complete(&self, request: ChatRequest) -> Result<Completion> {
        let started = Instant::now();
        debug!(
            model = %request.model,
            messages = request.messages.len(),
            prompt_chars = request.prompt_chars(),
            "sending chat completion"
        );

        let response = self
            .http
            .post(self.config.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = api_error_message(&body);
            warn!(status = status.as_u16(), %message, "chat completion rejected");
            return Err(ChatError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: ChatResponse =
            serde_json::from_str(&body).map_err(|source| ChatError::Parse {
                body: truncate(&body, 500),
                source,
            })?;

        let text = parsed
            .first_text()
            .ok_or(ChatError::EmptyResponse)?
            .to_string();
        let finish_reason = parsed.choices.first().and_then(|c| c.finish_reason.clone());

        info!(
            model = parsed.model.as_deref().unwrap_or(&request.model),
            latency_ms = started.elapsed().as_millis() as u64,
            completion_tokens = parsed.usage.as_ref().map(|u| u.completion_tokens),
            "chat completion received"
        );

        Ok(Completion {
            text,
            model: parsed.model.unwrap_or(request.model),
            usage: parsed.usage,
            finish_reason,
        })
    }
}

/// Pull a human-readable message out of an error body. Falls back to the raw
/// (truncated) body when it is not the standard envelope.
fn api_error_message(body: &str) -> String {
    match serde_json::from_str::<ApiErrorEnvelope>(body) {
        Ok(env) => match env.error.kind {
            Some(kind) => format!("{} ({kind})", env.error.message),
            None => env.error.message,
        },
        Err(_) if body.trim().is_empty() => "empty error body".to_string(),
        Err(_) => truncate(body, 300),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &s[..end])
}

// ─── Tests ────────────────────────────────────────────────────────────────
