//! API-based summarizer for OpenAI, Anthropic and Gemini endpoints.

use std::time::Duration;

use async_trait::async_trait;
use backoff::{backoff::Backoff, ExponentialBackoff};
use reqwest::{Client, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use super::{build_prompt, Summarizer, SummarizerError};

/// Wire protocol spoken by the endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiProvider {
    OpenAi,
    Anthropic,
    Gemini,
}

impl ApiProvider {
    fn default_base_url(self) -> &'static str {
        match self {
            ApiProvider::OpenAi => "https://api.openai.com/v1",
            ApiProvider::Anthropic => "https://api.anthropic.com/v1",
            ApiProvider::Gemini => "https://generativelanguage.googleapis.com/v1beta",
        }
    }

    fn name(self) -> &'static str {
        match self {
            ApiProvider::OpenAi => "openai",
            ApiProvider::Anthropic => "anthropic",
            ApiProvider::Gemini => "gemini",
        }
    }
}

/// Configuration for API-based summarizer.
#[derive(Debug, Clone)]
pub struct ApiSummarizerConfig {
    pub provider: ApiProvider,

    /// API base URL (e.g., "https://api.openai.com/v1")
    pub base_url: String,

    /// Model to use (e.g., "gemini-1.5-pro", "gpt-4o-mini")
    pub model: String,

    pub api_key: SecretString,

    /// Request timeout
    pub timeout: Duration,

    /// Maximum attempts, including the first
    pub max_retries: u32,

    /// Output token cap (Anthropic requires one)
    pub max_tokens: u32,
}

impl ApiSummarizerConfig {
    pub fn new(
        provider: ApiProvider,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            base_url: provider.default_base_url().to_string(),
            model: model.into(),
            api_key: SecretString::from(api_key.into()),
            timeout: Duration::from_secs(60),
            max_retries: 3,
            max_tokens: 512,
        }
    }

    /// Create config for OpenAI API.
    pub fn openai(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::new(ApiProvider::OpenAi, api_key, model)
    }

    /// Create config for Claude API.
    pub fn claude(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::new(ApiProvider::Anthropic, api_key, model)
    }

    /// Create config for Gemini API.
    pub fn gemini(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::new(ApiProvider::Gemini, api_key, model)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }
}

/// API-based summarizer implementation.
pub struct ApiSummarizer {
    client: Client,
    config: ApiSummarizerConfig,
}

impl ApiSummarizer {
    pub fn new(config: ApiSummarizerConfig) -> Result<Self, SummarizerError> {
        if config.model.is_empty() {
            return Err(SummarizerError::ConfigError("model name is empty".to_string()));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SummarizerError::ConfigError(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Call the API, retrying transient failures with exponential backoff.
    async fn call_api(&self, prompt: &str) -> Result<String, SummarizerError> {
        let mut backoff = ExponentialBackoff {
            initial_interval: Duration::from_millis(500),
            max_elapsed_time: Some(Duration::from_secs(120)),
            ..Default::default()
        };

        let mut attempts = 0;

        loop {
            attempts += 1;
            debug!(attempt = attempts, provider = self.config.provider.name(), "Calling summarization API");

            match self.make_request(prompt).await {
                Ok(response) => return Ok(response),
                Err(e) if !e.is_transient() => {
                    error!(error = %e, "Summarization failed");
                    return Err(e);
                }
                Err(e) => {
                    if attempts >= self.config.max_retries {
                        error!(error = %e, "Max retries exceeded");
                        return Err(e);
                    }

                    match backoff.next_backoff() {
                        Some(duration) => {
                            warn!(
                                error = %e,
                                retry_in_ms = duration.as_millis(),
                                "API call failed, retrying"
                            );
                            tokio::time::sleep(duration).await;
                        }
                        None => {
                            error!(error = %e, "Backoff exhausted");
                            return Err(e);
                        }
                    }
                }
            }
        }
    }

    async fn make_request(&self, prompt: &str) -> Result<String, SummarizerError> {
        match self.config.provider {
            ApiProvider::OpenAi => self.make_openai_request(prompt).await,
            ApiProvider::Anthropic => self.make_anthropic_request(prompt).await,
            ApiProvider::Gemini => self.make_gemini_request(prompt).await,
        }
    }

    /// Send a request and map transport and HTTP status failures.
    async fn send(&self, request: RequestBuilder) -> Result<reqwest::Response, SummarizerError> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                SummarizerError::Timeout
            } else {
                SummarizerError::ApiError(e.to_string())
            }
        })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(SummarizerError::RateLimitExceeded);
        }

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(SummarizerError::ConfigError(format!(
                "{} rejected the API key (HTTP {})",
                self.config.provider.name(),
                status
            )));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SummarizerError::ApiError(format!(
                "HTTP {}: {}",
                status, body
            )));
        }

        Ok(response)
    }

    /// Make OpenAI-compatible API request.
    async fn make_openai_request(&self, prompt: &str) -> Result<String, SummarizerError> {
        #[derive(Serialize)]
        struct OpenAIRequest<'a> {
            model: &'a str,
            messages: Vec<OpenAIMessage<'a>>,
        }

        #[derive(Serialize)]
        struct OpenAIMessage<'a> {
            role: &'a str,
            content: &'a str,
        }

        #[derive(Deserialize)]
        struct OpenAIResponse {
            choices: Vec<OpenAIChoice>,
        }

        #[derive(Deserialize)]
        struct OpenAIChoice {
            message: OpenAIMessageResponse,
        }

        #[derive(Deserialize)]
        struct OpenAIMessageResponse {
            content: Option<String>,
        }

        let request = OpenAIRequest {
            model: &self.config.model,
            messages: vec![OpenAIMessage {
                role: "user",
                content: prompt,
            }],
        };

        let url = format!("{}/chat/completions", self.config.base_url);
        let response = self
            .send(
                self.client
                    .post(&url)
                    .bearer_auth(self.config.api_key.expose_secret())
                    .json(&request),
            )
            .await?;

        let body: OpenAIResponse = response
            .json()
            .await
            .map_err(|e| SummarizerError::ParseError(e.to_string()))?;

        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| SummarizerError::ParseError("No choices in response".to_string()))
    }

    /// Make Anthropic API request.
    async fn make_anthropic_request(&self, prompt: &str) -> Result<String, SummarizerError> {
        #[derive(Serialize)]
        struct AnthropicRequest<'a> {
            model: &'a str,
            max_tokens: u32,
            messages: Vec<AnthropicMessage<'a>>,
        }

        #[derive(Serialize)]
        struct AnthropicMessage<'a> {
            role: &'a str,
            content: &'a str,
        }

        #[derive(Deserialize)]
        struct AnthropicResponse {
            content: Vec<AnthropicContent>,
        }

        #[derive(Deserialize)]
        struct AnthropicContent {
            #[serde(default)]
            text: String,
        }

        let request = AnthropicRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            messages: vec![AnthropicMessage {
                role: "user",
                content: prompt,
            }],
        };

        let url = format!("{}/messages", self.config.base_url);
        let response = self
            .send(
                self.client
                    .post(&url)
                    .header("x-api-key", self.config.api_key.expose_secret())
                    .header("anthropic-version", "2023-06-01")
                    .json(&request),
            )
            .await?;

        let body: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| SummarizerError::ParseError(e.to_string()))?;

        let text: String = body.content.into_iter().map(|c| c.text).collect();
        if text.is_empty() {
            return Err(SummarizerError::ParseError("No content in response".to_string()));
        }
        Ok(text)
    }

    /// Make Gemini `generateContent` request.
    async fn make_gemini_request(&self, prompt: &str) -> Result<String, SummarizerError> {
        #[derive(Serialize)]
        struct GeminiRequest<'a> {
            contents: Vec<GeminiContent<'a>>,
        }

        #[derive(Serialize)]
        struct GeminiContent<'a> {
            parts: Vec<GeminiPart<'a>>,
        }

        #[derive(Serialize)]
        struct GeminiPart<'a> {
            text: &'a str,
        }

        #[derive(Deserialize)]
        struct GeminiResponse {
            #[serde(default)]
            candidates: Vec<GeminiCandidate>,
        }

        #[derive(Deserialize)]
        struct GeminiCandidate {
            content: Option<GeminiCandidateContent>,
        }

        #[derive(Deserialize)]
        struct GeminiCandidateContent {
            #[serde(default)]
            parts: Vec<GeminiCandidatePart>,
        }

        #[derive(Deserialize)]
        struct GeminiCandidatePart {
            #[serde(default)]
            text: String,
        }

        let request = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart { text: prompt }],
            }],
        };

        let url = format!(
            "{}/models/{}:generateContent",
            self.config.base_url, self.config.model
        );
        let response = self
            .send(
                self.client
                    .post(&url)
                    .header("x-goog-api-key", self.config.api_key.expose_secret())
                    .json(&request),
            )
            .await?;

        let body: GeminiResponse = response
            .json()
            .await
            .map_err(|e| SummarizerError::ParseError(e.to_string()))?;

        let text: String = body
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| content.parts.into_iter().map(|p| p.text).collect())
            .unwrap_or_default();

        if text.is_empty() {
            return Err(SummarizerError::ParseError(
                "No candidates in response".to_string(),
            ));
        }
        Ok(text)
    }
}

#[async_trait]
impl Summarizer for ApiSummarizer {
    async fn summarize(
        &self,
        event_id: &str,
        passages: &[String],
    ) -> Result<String, SummarizerError> {
        if passages.is_empty() {
            return Err(SummarizerError::NoPassages);
        }

        debug!(event = event_id, passages = passages.len(), "Summarizing event");
        let prompt = build_prompt(passages);
        let summary = self.call_api(&prompt).await?;
        Ok(summary.trim().to_string())
    }

    fn name(&self) -> &str {
        self.config.provider.name()
    }
}
