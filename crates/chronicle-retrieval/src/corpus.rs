//! Event corpus: ingestion and range-scoped retrieval.
//!
//! The corpus owns the vector index, the range registry and the passage
//! store behind a single mutex. Fetching and embedding happen outside the
//! lock; the commit that reads the index size, appends, persists, records the
//! range and stores the texts runs inside it with no `.await`, so a cancelled
//! request can't leave a half-recorded event.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chronicle_embeddings::{Embedding, EmbeddingError, EmbeddingModel};
use chronicle_types::{EventRange, RangeInfo, NO_RELEVANT_INFORMATION};
use chronicle_vector::{
    PassageStore, RangeRecord, RangeRegistry, RangeState, VectorError, VectorIndex,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::chunker::split_paragraphs;
use crate::error::RetrievalError;
use crate::source::DocumentSource;

/// Query embedded to rank an event's passages.
pub fn event_query(event_id: &str) -> String {
    format!("The historical significance and major events of {}.", event_id)
}

struct CorpusState {
    index: Box<dyn VectorIndex>,
    registry: RangeRegistry,
    passages: PassageStore,
}

/// Point-in-time counts for status reporting.
#[derive(Debug, Clone, Serialize)]
pub struct CorpusStats {
    /// Events with an active range
    pub events: usize,
    /// Passages held in the store
    pub passages: usize,
    /// Vectors in the index, reachable or not
    pub vectors: usize,
    /// Vectors inside an active range
    pub reachable_vectors: usize,
    /// Vectors no active range covers (re-ingested, retired, or from a
    /// previous process)
    pub orphaned_vectors: usize,
    pub superseded_ranges: usize,
    pub retired_ranges: usize,
    pub dimension: usize,
    pub index_bytes: u64,
}

pub struct EventCorpus {
    state: Mutex<CorpusState>,
    embedder: Arc<dyn EmbeddingModel>,
    source: Arc<dyn DocumentSource>,
    auto_heal: bool,
}

impl EventCorpus {
    /// Build a corpus over an index, failing if the embedder's dimension
    /// differs from the index's.
    pub fn new(
        index: Box<dyn VectorIndex>,
        embedder: Arc<dyn EmbeddingModel>,
        source: Arc<dyn DocumentSource>,
    ) -> Result<Self, RetrievalError> {
        if embedder.dimension() != index.dimension() {
            return Err(RetrievalError::EmbeddingProvider(
                EmbeddingError::DimensionMismatch {
                    expected: index.dimension(),
                    actual: embedder.dimension(),
                },
            ));
        }

        if !index.is_empty() {
            info!(
                vectors = index.len(),
                "Index holds vectors from a previous process; they are unreachable until re-ingested"
            );
        }

        Ok(Self {
            state: Mutex::new(CorpusState {
                index,
                registry: RangeRegistry::new(),
                passages: PassageStore::new(),
            }),
            embedder,
            source,
            auto_heal: true,
        })
    }

    /// Whether `retrieve` ingests unknown events before failing (default on).
    pub fn with_auto_heal(mut self, enabled: bool) -> Self {
        self.auto_heal = enabled;
        self
    }

    fn lock(&self) -> MutexGuard<'_, CorpusState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fetch, chunk, embed and index the reference document for `event_id`.
    ///
    /// Every call appends a fresh range, even for an event ingested before;
    /// the new range shadows the old one and the old vectors stay in place.
    pub async fn ingest(&self, event_id: &str) -> Result<RangeInfo, RetrievalError> {
        let document = self
            .source
            .fetch(event_id)
            .await?
            .ok_or_else(|| RetrievalError::SourceNotFound(event_id.to_string()))?;

        let chunks = split_paragraphs(&document);
        debug!(
            event = event_id,
            source = self.source.name(),
            chunks = chunks.len(),
            "Chunked reference document"
        );

        if chunks.is_empty() {
            warn!(event = event_id, "Reference document is empty, nothing to index");
            let total = self.lock().index.len();
            return Ok(RangeInfo::new(event_id, None, 0, total));
        }

        let vectors = self.embed(chunks.clone()).await?;
        self.commit(event_id, chunks, vectors)
    }

    /// Append, persist, record and store as one critical section.
    fn commit(
        &self,
        event_id: &str,
        chunks: Vec<String>,
        vectors: Vec<Embedding>,
    ) -> Result<RangeInfo, RetrievalError> {
        if vectors.len() != chunks.len() {
            return Err(RetrievalError::EmbeddingProvider(EmbeddingError::InvalidInput(
                format!(
                    "{} embeddings for {} chunks",
                    vectors.len(),
                    chunks.len()
                ),
            )));
        }

        let mut state = self.lock();
        let dimension = state.index.dimension();
        for vector in &vectors {
            vector.ensure_dimension(dimension)?;
        }

        let before = state.index.len();
        state.index.append(&vectors)?;
        let after = state.index.len();

        // Recording a range that doesn't match the appended span would break
        // contiguity; leave the vectors orphaned instead.
        let range = EventRange::from_span(before as u64, chunks.len())
            .filter(|_| after - before == chunks.len())
            .ok_or_else(|| {
                RetrievalError::Index(format!(
                    "index grew by {} for {} chunks of '{}'",
                    after - before,
                    chunks.len(),
                    event_id
                ))
            })?;

        state.registry.record(event_id, range.start(), range.end())?;
        let chunk_count = chunks.len();
        state.passages.put(event_id, chunks);

        info!(
            event = event_id,
            range = %range,
            chunks = chunk_count,
            total_vectors = after,
            "Ingested event"
        );
        Ok(RangeInfo::new(event_id, Some(range), chunk_count, after))
    }

    /// Passages of `event_id` most relevant to its synthetic query, best first.
    ///
    /// Unknown events are ingested once and retried. When nothing resolves,
    /// a single "no relevant information" passage is returned so downstream
    /// summarization never sees empty input.
    pub async fn retrieve(
        &self,
        event_id: &str,
        top_k: usize,
    ) -> Result<Vec<String>, RetrievalError> {
        let query = self.embed_one(event_query(event_id)).await?;

        if let Some(passages) = self.search_event(event_id, &query, top_k)? {
            return Ok(or_no_information(passages));
        }

        if !self.auto_heal {
            return Err(RetrievalError::EventUnknown(event_id.to_string()));
        }

        info!(event = event_id, "Event not ingested, ingesting before retrieval");
        self.ingest(event_id).await?;

        self.search_event(event_id, &query, top_k)?
            .map(or_no_information)
            .ok_or_else(|| RetrievalError::EventUnknown(event_id.to_string()))
    }

    /// Range lookup, scoped search and text resolution under one lock.
    ///
    /// `Ok(None)` means the event has no active range.
    fn search_event(
        &self,
        event_id: &str,
        query: &Embedding,
        top_k: usize,
    ) -> Result<Option<Vec<String>>, RetrievalError> {
        let state = self.lock();

        let range = match state.registry.lookup(event_id) {
            Ok(range) => range,
            Err(VectorError::EventNotFound(_)) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let k = top_k.min(range.len());
        if k == 0 {
            return Ok(Some(Vec::new()));
        }

        let hits = match state.index.search(query, Some(range), k) {
            Ok(hits) => hits,
            Err(VectorError::OutOfRange { position, len }) => {
                warn!(
                    event = event_id,
                    range = %range,
                    position = position,
                    len = len,
                    "Range points past the end of the index"
                );
                Vec::new()
            }
            Err(e) => return Err(e.into()),
        };

        let passages = hits
            .iter()
            .filter_map(|hit| {
                let Some(local) = range.local_index(hit.position) else {
                    warn!(event = event_id, position = hit.position, range = %range, "Discarding hit outside range");
                    return None;
                };
                match state.passages.get(event_id, local) {
                    Ok(text) => Some(text.to_string()),
                    Err(e) => {
                        warn!(event = event_id, error = %e, "Discarding unresolvable hit");
                        None
                    }
                }
            })
            .collect::<Vec<_>>();

        debug!(event = event_id, k = k, resolved = passages.len(), "Scoped retrieval complete");
        Ok(Some(passages))
    }

    /// Tombstone an event's range. Its vectors remain in the index.
    pub fn retire(&self, event_id: &str) -> Result<EventRange, RetrievalError> {
        Ok(self.lock().registry.retire(event_id)?)
    }

    /// Active range for `event_id`, if any.
    pub fn range_of(&self, event_id: &str) -> Option<EventRange> {
        self.lock().registry.lookup(event_id).ok()
    }

    /// Active ranges ordered by start position.
    pub fn events(&self) -> Vec<RangeRecord> {
        self.lock().registry.ranges().into_iter().cloned().collect()
    }

    /// Exact vector at a global position.
    pub fn reconstruct(&self, position: u64) -> Result<Embedding, RetrievalError> {
        Ok(self.lock().index.reconstruct(position)?)
    }

    pub fn stats(&self) -> CorpusStats {
        let state = self.lock();
        let index_stats = state.index.stats();
        let reachable = state.registry.reachable_vectors();
        let inactive = state.registry.inactive();

        CorpusStats {
            events: state.registry.len(),
            passages: state.passages.passage_count(),
            vectors: index_stats.vector_count,
            reachable_vectors: reachable,
            orphaned_vectors: index_stats.vector_count.saturating_sub(reachable),
            superseded_ranges: inactive
                .iter()
                .filter(|r| r.state == RangeState::Superseded)
                .count(),
            retired_ranges: inactive
                .iter()
                .filter(|r| r.state == RangeState::Retired)
                .count(),
            dimension: index_stats.dimension,
            index_bytes: index_stats.size_bytes,
        }
    }

    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Embedding>, RetrievalError> {
        let embedder = Arc::clone(&self.embedder);
        tokio::task::spawn_blocking(move || embedder.embed_texts(&texts))
            .await
            .map_err(|e| RetrievalError::Task(e.to_string()))?
            .map_err(RetrievalError::from)
    }

    async fn embed_one(&self, text: String) -> Result<Embedding, RetrievalError> {
        self.embed(vec![text]).await?.pop().ok_or_else(|| {
            RetrievalError::EmbeddingProvider(EmbeddingError::InvalidInput(
                "provider returned no embedding".to_string(),
            ))
        })
    }
}

fn or_no_information(passages: Vec<String>) -> Vec<String> {
    if passages.is_empty() {
        vec![NO_RELEVANT_INFORMATION.to_string()]
    } else {
        passages
    }
}
