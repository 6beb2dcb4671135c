//! Reference document sources.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use chronicle_types::SourceSettings;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::RetrievalError;

/// Looks up the reference text for an event by name.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Full document text, or `None` when no page exists for the event.
    async fn fetch(&self, event_id: &str) -> Result<Option<String>, RetrievalError>;

    /// Short name for logs.
    fn name(&self) -> &str;
}

/// In-memory documents keyed by event id.
#[derive(Debug, Default)]
pub struct StaticSource {
    documents: RwLock<HashMap<String, String>>,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with_document(self, event_id: impl Into<String>, text: impl Into<String>) -> Self {
        self.insert(event_id, text);
        self
    }

    /// Add or replace the document for `event_id`.
    pub fn insert(&self, event_id: impl Into<String>, text: impl Into<String>) {
        self.documents
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(event_id.into(), text.into());
    }
}

#[async_trait]
impl DocumentSource for StaticSource {
    async fn fetch(&self, event_id: &str) -> Result<Option<String>, RetrievalError> {
        Ok(self
            .documents
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(event_id)
            .cloned())
    }

    fn name(&self) -> &str {
        "static"
    }
}

/// Plain-text page extracts from the MediaWiki API.
pub struct WikipediaSource {
    client: Client,
    endpoint: String,
}

impl WikipediaSource {
    pub fn new(settings: &SourceSettings) -> Result<Self, RetrievalError> {
        let client = Client::builder()
            .user_agent(settings.user_agent.clone())
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| RetrievalError::Source(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: settings.api_endpoint(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct ExtractResponse {
    query: Option<ExtractQuery>,
}

#[derive(Debug, Deserialize)]
struct ExtractQuery {
    #[serde(default)]
    pages: Vec<ExtractPage>,
}

#[derive(Debug, Deserialize)]
struct ExtractPage {
    #[serde(default)]
    missing: bool,
    #[serde(default)]
    invalid: bool,
    #[serde(default)]
    extract: Option<String>,
}

/// Pull the page text out of a `formatversion=2` extracts response.
fn parse_extract(body: &str) -> Result<Option<String>, RetrievalError> {
    let response: ExtractResponse = serde_json::from_str(body)
        .map_err(|e| RetrievalError::Source(format!("Malformed extracts response: {}", e)))?;

    let page = response.query.and_then(|q| q.pages.into_iter().next());
    Ok(match page {
        Some(page) if !page.missing && !page.invalid => {
            Some(extract_to_paragraphs(&page.extract.unwrap_or_default()))
        }
        _ => None,
    })
}

/// Extracts put one paragraph per line and mark sections with `== Title ==`.
/// Drop the section markers and separate paragraphs with blank lines.
fn extract_to_paragraphs(extract: &str) -> String {
    extract
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| !(line.starts_with("==") && line.ends_with("==")))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[async_trait]
impl DocumentSource for WikipediaSource {
    async fn fetch(&self, event_id: &str) -> Result<Option<String>, RetrievalError> {
        debug!(event = event_id, endpoint = %self.endpoint, "Fetching reference page");

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("action", "query"),
                ("format", "json"),
                ("formatversion", "2"),
                ("prop", "extracts"),
                ("explaintext", "1"),
                ("redirects", "1"),
                ("titles", event_id),
            ])
            .send()
            .await
            .map_err(|e| RetrievalError::Source(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RetrievalError::Source(format!("HTTP {}: {}", status, body)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| RetrievalError::Source(e.to_string()))?;
        let text = parse_extract(&body)?;

        match &text {
            Some(text) => info!(event = event_id, bytes = text.len(), "Fetched reference page"),
            None => info!(event = event_id, "No reference page"),
        }
        Ok(text)
    }

    fn name(&self) -> &str {
        "wikipedia"
    }
}
