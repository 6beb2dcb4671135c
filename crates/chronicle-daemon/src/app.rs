//! Request layer: the corpus plus a summarizer, with a deadline per request.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use chronicle_retrieval::{CorpusStats, EventCorpus};
use chronicle_summarizer::Summarizer;
use chronicle_types::{RangeInfo, NO_RELEVANT_INFORMATION};
use chronicle_vector::RangeRecord;
use tracing::{debug, info};

pub struct Chronicle {
    corpus: Arc<EventCorpus>,
    /// `Err` holds why no summarizer could be configured. Only `summarize`
    /// needs one, so that failure is reported there.
    summarizer: std::result::Result<Arc<dyn Summarizer>, String>,
    default_top_k: usize,
    timeout: Duration,
}

impl Chronicle {
    pub fn new(
        corpus: Arc<EventCorpus>,
        summarizer: Arc<dyn Summarizer>,
        default_top_k: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            corpus,
            summarizer: Ok(summarizer),
            default_top_k,
            timeout,
        }
    }

    /// A request layer that can ingest and retrieve but not summarize.
    pub fn without_summarizer(
        corpus: Arc<EventCorpus>,
        reason: impl Into<String>,
        default_top_k: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            corpus,
            summarizer: Err(reason.into()),
            default_top_k,
            timeout,
        }
    }

    pub fn corpus(&self) -> &EventCorpus {
        &self.corpus
    }

    pub fn default_top_k(&self) -> usize {
        self.default_top_k
    }

    /// Run `request` under the configured deadline.
    ///
    /// Dropping a corpus future on timeout is safe: its commit step never
    /// awaits, so either the whole ingestion landed or none of it did.
    async fn with_deadline<T, F>(&self, what: &str, event_id: &str, request: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| {
                anyhow!(
                    "{} '{}' timed out after {}s",
                    what,
                    event_id,
                    self.timeout.as_secs_f32()
                )
            })?
    }

    pub async fn ingest(&self, event_id: &str) -> Result<RangeInfo> {
        let request = async { self.corpus.ingest(event_id).await.map_err(anyhow::Error::from) };
        self.with_deadline("ingest", event_id, request).await
    }

    pub async fn retrieve(&self, event_id: &str, top_k: Option<usize>) -> Result<Vec<String>> {
        let top_k = top_k.unwrap_or(self.default_top_k);
        let request = async {
            self.corpus
                .retrieve(event_id, top_k)
                .await
                .map_err(anyhow::Error::from)
        };
        self.with_deadline("retrieve", event_id, request).await
    }

    /// Retrieve passages and summarize them.
    ///
    /// When retrieval finds nothing, the no-information text is returned as
    /// the summary and the summarizer is not called.
    pub async fn summarize(&self, event_id: &str, top_k: Option<usize>) -> Result<String> {
        let summarizer = match &self.summarizer {
            Ok(summarizer) => Arc::clone(summarizer),
            Err(reason) => return Err(anyhow!("summarizer unavailable: {}", reason)),
        };
        let top_k = top_k.unwrap_or(self.default_top_k);
        let request = self.retrieve_and_summarize(summarizer.as_ref(), event_id, top_k);
        self.with_deadline("summarize", event_id, request).await
    }

    async fn retrieve_and_summarize(
        &self,
        summarizer: &dyn Summarizer,
        event_id: &str,
        top_k: usize,
    ) -> Result<String> {
        let passages = self.corpus.retrieve(event_id, top_k).await?;
        if is_no_information(&passages) {
            info!(event = event_id, "No passages to summarize");
            return Ok(NO_RELEVANT_INFORMATION.to_string());
        }

        debug!(
            event = event_id,
            passages = passages.len(),
            summarizer = summarizer.name(),
            "Summarizing"
        );
        Ok(summarizer.summarize(event_id, &passages).await?)
    }

    pub fn retire(&self, event_id: &str) -> Result<()> {
        let range = self.corpus.retire(event_id)?;
        info!(event = event_id, range = %range, "Retired");
        Ok(())
    }

    pub fn events(&self) -> Vec<RangeRecord> {
        self.corpus.events()
    }

    pub fn stats(&self) -> CorpusStats {
        self.corpus.stats()
    }
}

fn is_no_information(passages: &[String]) -> bool {
    passages.is_empty() || (passages.len() == 1 && passages[0] == NO_RELEVANT_INFORMATION)
}
