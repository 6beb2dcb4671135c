//! Mock summarizer for testing.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use super::{Summarizer, SummarizerError};

/// Mock summarizer that generates deterministic summaries.
///
/// The summary names the event and quotes the leading passage, so callers
/// can check which passages reached it without making API calls.
pub struct MockSummarizer {
    prefix: String,
    max_quote_chars: usize,
    calls: AtomicUsize,
}

impl MockSummarizer {
    pub fn new() -> Self {
        Self {
            prefix: "Summary of".to_string(),
            max_quote_chars: 200,
            calls: AtomicUsize::new(0),
        }
    }

    /// Create with custom prefix.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ..Self::new()
        }
    }

    /// Number of successful `summarize` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl Default for MockSummarizer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Summarizer for MockSummarizer {
    async fn summarize(
        &self,
        event_id: &str,
        passages: &[String],
    ) -> Result<String, SummarizerError> {
        if passages.is_empty() {
            return Err(SummarizerError::NoPassages);
        }

        self.calls.fetch_add(1, Ordering::Relaxed);
        Ok(format!(
            "{} {} ({} passages): {}",
            self.prefix,
            event_id,
            passages.len(),
            truncate(&passages[0], self.max_quote_chars)
        ))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Truncate text to at most `max_chars` characters, adding "..." if truncated.
fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let kept: String = text.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
