//! # chronicle-summarizer
//!
//! Turns the passages retrieved for an event into a short prose summary.
//!
//! - [`ApiSummarizer`]: OpenAI chat completions, Anthropic messages or Gemini
//!   `generateContent`, with exponential-backoff retries
//! - [`MockSummarizer`]: deterministic output for tests and offline runs
//!
//! Every implementation rejects an empty passage list with
//! [`SummarizerError::NoPassages`].

mod api;
mod mock;

pub use api::{ApiProvider, ApiSummarizer, ApiSummarizerConfig};
pub use mock::MockSummarizer;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chronicle_types::SummarizerSettings;
use thiserror::Error;
use tracing::info;

/// Error type for summarization operations.
#[derive(Debug, Error)]
pub enum SummarizerError {
    #[error("API request failed: {0}")]
    ApiError(String),

    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Timeout waiting for response")]
    Timeout,

    #[error("No passages to summarize")]
    NoPassages,
}

impl SummarizerError {
    /// Whether another attempt could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SummarizerError::ApiError(_)
                | SummarizerError::RateLimitExceeded
                | SummarizerError::Timeout
        )
    }
}

/// Pluggable summarizer.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Summarize `passages` retrieved for `event_id`, most relevant first.
    async fn summarize(&self, event_id: &str, passages: &[String])
        -> Result<String, SummarizerError>;

    /// Short name for logs.
    fn name(&self) -> &str;
}

/// Prompt sent to every API provider.
pub fn build_prompt(passages: &[String]) -> String {
    let text = passages.join(" ");
    format!(
        "Summarize the following historical event concisely:\n\n{text}\n\nProvide a clear and factual summary in about 150 words."
    )
}

/// Build the summarizer named by `settings.provider`.
pub fn from_settings(
    settings: &SummarizerSettings,
    timeout: Duration,
) -> Result<Arc<dyn Summarizer>, SummarizerError> {
    let provider = match settings.provider.as_str() {
        "mock" => {
            info!("Using mock summarizer");
            return Ok(Arc::new(MockSummarizer::new()));
        }
        "gemini" => ApiProvider::Gemini,
        "openai" => ApiProvider::OpenAi,
        "anthropic" => ApiProvider::Anthropic,
        other => {
            return Err(SummarizerError::ConfigError(format!(
                "unknown summarizer provider '{}'",
                other
            )))
        }
    };

    let api_key = settings.resolved_api_key().ok_or_else(|| {
        SummarizerError::ConfigError(format!(
            "no API key for '{}'; set summarizer.api_key or {}",
            settings.provider,
            settings.api_key_env_var().unwrap_or("the provider's key variable")
        ))
    })?;

    let mut config = ApiSummarizerConfig::new(provider, api_key, settings.model.clone());
    if let Some(base_url) = &settings.api_base_url {
        config = config.with_base_url(base_url.clone());
    }
    config.timeout = timeout;

    info!(provider = %settings.provider, model = %settings.model, "Using API summarizer");
    Ok(Arc::new(ApiSummarizer::new(config)?))
}
