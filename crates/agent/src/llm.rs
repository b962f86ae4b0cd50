use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use nestplan_core::retry::Transient;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("llm rate limited")]
    RateLimited { retry_after: Option<Duration> },
    #[error("llm api error (status {status}): {message}")]
    Api { status: u16, message: String },
    #[error("llm network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("invalid llm response: {0}")]
    InvalidResponse(String),
}

impl Transient for LlmError {
    fn is_transient(&self) -> bool {
        match self {
            LlmError::RateLimited { .. } | LlmError::Network(_) => true,
            LlmError::Api { status, .. } => *status >= 500,
            LlmError::InvalidResponse(_) => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            LlmError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;
}

/// Extracts the first JSON object or array from a completion and
/// deserializes it. Tolerates markdown code fences and surrounding prose.
pub fn parse_structured<T: DeserializeOwned>(completion: &str) -> Result<T, LlmError> {
    let trimmed = completion.trim();

    let start = trimmed
        .find(['{', '['])
        .ok_or_else(|| LlmError::InvalidResponse("no JSON payload in completion".to_string()))?;
    let end = trimmed
        .rfind(['}', ']'])
        .filter(|end| *end >= start)
        .ok_or_else(|| LlmError::InvalidResponse("unterminated JSON payload".to_string()))?;

    serde_json::from_str(&trimmed[start..=end])
        .map_err(|e| LlmError::InvalidResponse(e.to_string()))
}

/// Chat-completions client for OpenAI-compatible endpoints.
pub struct OpenAiChatClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: SecretString,
}

impl OpenAiChatClient {
    pub fn new(model: &str, api_key: SecretString, timeout: Duration) -> Result<Self, LlmError> {
        Self::with_base_url("https://api.openai.com", model, api_key, timeout)
    }

    pub fn with_base_url(
        base_url: &str,
        model: &str,
        api_key: SecretString,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key,
        })
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

fn retry_after_header(response: &reqwest::Response) -> Option<Duration> {
    response
        .headers()
        .get("retry-after")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

#[async_trait]
impl LlmClient for OpenAiChatClient {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = json!({
            "model": self.model,
            "temperature": 0,
            "messages": [{ "role": "user", "content": prompt }],
        });

        let response = self
            .http
            .post(&url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(LlmError::RateLimited { retry_after: retry_after_header(&response) });
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::Api { status: status.as_u16(), message });
        }

        let parsed: ChatResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| LlmError::InvalidResponse("completion has no choices".to_string()))
    }
}
