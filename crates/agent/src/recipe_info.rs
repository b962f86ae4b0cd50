use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use thiserror::Error;

use nestplan_core::domain::recipe::LiveRecipe;
use nestplan_core::retry::{RetryPolicy, Transient};

#[derive(Debug, Error)]
pub enum ProviderError {
    /// Daily quota exhausted (HTTP 402). Retryable, but on a much longer
    /// clock than an ordinary rate limit.
    #[error("recipe provider quota exceeded")]
    QuotaExceeded { retry_after: Option<Duration> },
    #[error("recipe provider rate limited")]
    RateLimited { retry_after: Option<Duration> },
    #[error("recipe provider api error (status {status}): {message}")]
    Api { status: u16, message: String },
    #[error("recipe provider network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("invalid recipe provider response: {0}")]
    InvalidResponse(String),
}

impl Transient for ProviderError {
    fn is_transient(&self) -> bool {
        match self {
            ProviderError::QuotaExceeded { .. }
            | ProviderError::RateLimited { .. }
            | ProviderError::Network(_) => true,
            ProviderError::Api { status, .. } => *status >= 500,
            ProviderError::InvalidResponse(_) => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            ProviderError::QuotaExceeded { retry_after }
            | ProviderError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

#[async_trait]
pub trait RecipeInfoProvider: Send + Sync {
    async fn recipe_information(&self, provider_id: i64) -> Result<LiveRecipe, ProviderError>;
}

/// Retries a live recipe lookup with a policy per failure class: quota
/// exhaustion gets its own (longer) budget, everything else transient uses
/// the rate-limit budget. Permanent errors return immediately.
pub async fn fetch_with_retries(
    provider: &dyn RecipeInfoProvider,
    provider_id: i64,
    rate_policy: RetryPolicy,
    quota_policy: RetryPolicy,
) -> Result<LiveRecipe, ProviderError> {
    let mut rate_attempts = 0u32;
    let mut quota_attempts = 0u32;

    loop {
        let error = match provider.recipe_information(provider_id).await {
            Ok(recipe) => return Ok(recipe),
            Err(error) => error,
        };

        if !error.is_transient() {
            return Err(error);
        }

        let (policy, attempts) = match &error {
            ProviderError::QuotaExceeded { .. } => (&quota_policy, &mut quota_attempts),
            _ => (&rate_policy, &mut rate_attempts),
        };
        *attempts += 1;
        if *attempts > policy.max_retries {
            return Err(error);
        }

        let backoff = policy.backoff(*attempts);
        let delay = match error.retry_after() {
            Some(suggested) => suggested.max(backoff).min(policy.max_delay),
            None => backoff,
        };
        tracing::warn!(
            provider_id,
            attempt = *attempts,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "recipe lookup failed, retrying"
        );
        tokio::time::sleep(delay).await;
    }
}

/// Spoonacular-compatible recipe information client.
pub struct HttpRecipeInfoClient {
    http: reqwest::Client,
    base_url: String,
    api_key: SecretString,
}

impl HttpRecipeInfoClient {
    pub fn new(
        base_url: &str,
        api_key: SecretString,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, base_url: base_url.trim_end_matches('/').to_string(), api_key })
    }
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
impl RecipeInfoProvider for HttpRecipeInfoClient {
    async fn recipe_information(&self, provider_id: i64) -> Result<LiveRecipe, ProviderError> {
        let url = format!("{}/recipes/{provider_id}/information", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[
                ("includeNutrition", "true"),
                ("apiKey", self.api_key.expose_secret()),
            ])
            .send()
            .await?;

        let status = response.status();
        match status.as_u16() {
            402 => {
                return Err(ProviderError::QuotaExceeded {
                    retry_after: retry_after_header(&response),
                })
            }
            429 => {
                return Err(ProviderError::RateLimited {
                    retry_after: retry_after_header(&response),
                })
            }
            _ if !status.is_success() => {
                let message = response.text().await.unwrap_or_default();
                return Err(ProviderError::Api { status: status.as_u16(), message });
            }
            _ => {}
        }

        let payload: Value = response.json().await?;
        live_recipe_from_json(provider_id, &payload)
    }
}

/// Maps a provider information payload to a [`LiveRecipe`]. Pure so the
/// quirks of the payload shape stay unit-testable.
pub fn live_recipe_from_json(
    provider_id: i64,
    payload: &Value,
) -> Result<LiveRecipe, ProviderError> {
    let title = payload
        .get("title")
        .and_then(Value::as_str)
        .ok_or_else(|| ProviderError::InvalidResponse("payload has no title".to_string()))?
        .to_string();

    let ingredients = payload
        .get("extendedIngredients")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get("original").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    // Structured steps when present, otherwise the flat instruction text
    // split into lines.
    let structured_steps: Vec<String> = payload
        .get("analyzedInstructions")
        .and_then(Value::as_array)
        .and_then(|blocks| blocks.first())
        .and_then(|block| block.get("steps"))
        .and_then(Value::as_array)
        .map(|steps| {
            steps
                .iter()
                .filter_map(|step| step.get("step").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    let instructions = if structured_steps.is_empty() {
        payload
            .get("instructions")
            .and_then(Value::as_str)
            .map(|text| {
                text.lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    } else {
        structured_steps
    };

    Ok(LiveRecipe {
        provider_id,
        title,
        ingredients,
        instructions,
        image_url: payload.get("image").and_then(Value::as_str).map(str::to_string),
        nutrition: payload.get("nutrition").cloned(),
    })
}
