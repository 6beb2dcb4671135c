//! Integration tests for ingestion and range-scoped retrieval.
//!
//! All tests use the feature-hashing embedder, so no model download is needed.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chronicle_embeddings::{Embedding, HashingEmbedder};
use chronicle_retrieval::{EventCorpus, RetrievalError, StaticSource};
use chronicle_types::{EventRange, NO_RELEVANT_INFORMATION};
use chronicle_vector::{
    FlatIndex, HnswConfig, HnswIndex, IndexStats, SearchHit, VectorError, VectorIndex,
};
use tempfile::TempDir;

const DIM: usize = 128;

const HASTINGS: [&str; 4] = [
    "The Battle of Hastings was fought on 14 October 1066 between the Norman-French army of William, the Duke of Normandy, and an English army under King Harold Godwinson.",
    "Harold had marched south after defeating a Norwegian invasion at Stamford Bridge only weeks before the Norman landing at Pevensey.",
    "The English shield wall held for much of the day until feigned retreats by the Norman cavalry drew defenders down the hill.",
    "Harold was killed late in the battle, and William was crowned king of England on Christmas Day 1066.",
];

const FRENCH_REVOLUTION: [&str; 6] = [
    "The French Revolution was a period of political and societal change in France that began with the Estates General of 1789.",
    "The storming of the Bastille on 14 July 1789 became a symbol of the revolution.",
    "The Declaration of the Rights of Man and of the Citizen set out principles of liberty and equality.",
    "The monarchy was abolished in September 1792 and Louis XVI was executed in January 1793.",
    "The Reign of Terror under the Committee of Public Safety saw thousands executed.",
    "The revolution ended with the rise of Napoleon Bonaparte and the Consulate in 1799.",
];

fn document(paragraphs: &[&str]) -> String {
    paragraphs.join("\n\n")
}

fn scenario_source() -> StaticSource {
    StaticSource::new()
        .with_document("Battle of Hastings", document(&HASTINGS))
        .with_document("French Revolution", document(&FRENCH_REVOLUTION))
}

fn flat_corpus(source: StaticSource) -> EventCorpus {
    EventCorpus::new(
        Box::new(FlatIndex::new(DIM)),
        Arc::new(HashingEmbedder::new(DIM)),
        Arc::new(source),
    )
    .unwrap()
}

fn hnsw_corpus(dir: &TempDir, source: StaticSource) -> EventCorpus {
    let index = HnswIndex::open_or_create(HnswConfig::new(DIM, dir.path())).unwrap();
    EventCorpus::new(
        Box::new(index),
        Arc::new(HashingEmbedder::new(DIM)),
        Arc::new(source),
    )
    .unwrap()
}

#[tokio::test]
async fn test_hastings_and_french_revolution_ranges() {
    let dir = TempDir::new().unwrap();
    let corpus = hnsw_corpus(&dir, scenario_source());

    let hastings = corpus.ingest("Battle of Hastings").await.unwrap();
    assert_eq!(hastings.range, Some(EventRange::new(0, 3).unwrap()));
    assert_eq!(hastings.chunk_count, 4);
    assert_eq!(hastings.total_vectors, 4);

    let revolution = corpus.ingest("French Revolution").await.unwrap();
    assert_eq!(revolution.range, Some(EventRange::new(4, 9).unwrap()));
    assert_eq!(revolution.total_vectors, 10);

    let passages = corpus.retrieve("Battle of Hastings", 3).await.unwrap();
    assert_eq!(passages.len(), 3);
    let allowed: HashSet<&str> = HASTINGS.iter().copied().collect();
    for passage in &passages {
        assert!(allowed.contains(passage.as_str()), "leaked passage: {passage}");
    }
}

#[tokio::test]
async fn test_scoped_search_ignores_closer_foreign_vectors() {
    // Thousands of decoy paragraphs that repeat the target's query words are
    // much closer to the query than the target's own passages.
    let decoys: Vec<String> = (0..2000)
        .map(|i| {
            format!(
                "Historical significance and major events of the Siege of Orleans, part {}.",
                i
            )
        })
        .collect();
    let decoy_refs: Vec<&str> = decoys.iter().map(String::as_str).collect();

    let target = [
        "Joan of Arc arrived with a relief convoy in late April.",
        "The English bastides fell one after another within a week.",
        "The lifting of the blockade restored French morale.",
    ];

    let source = StaticSource::new()
        .with_document("Decoys", document(&decoy_refs))
        .with_document("Siege of Orleans", document(&target));
    let corpus = flat_corpus(source);

    corpus.ingest("Decoys").await.unwrap();
    let info = corpus.ingest("Siege of Orleans").await.unwrap();
    assert_eq!(info.range, Some(EventRange::new(2000, 2002).unwrap()));

    let passages = corpus.retrieve("Siege of Orleans", 10).await.unwrap();
    assert_eq!(passages.len(), 3);
    let allowed: HashSet<&str> = target.iter().copied().collect();
    assert!(passages.iter().all(|p| allowed.contains(p.as_str())));
}

#[tokio::test]
async fn test_retrieval_is_idempotent() {
    let corpus = flat_corpus(scenario_source());
    corpus.ingest("Battle of Hastings").await.unwrap();
    corpus.ingest("French Revolution").await.unwrap();

    let first = corpus.retrieve("French Revolution", 4).await.unwrap();
    let second = corpus.retrieve("French Revolution", 4).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(corpus.stats().vectors, 10);
}

#[tokio::test]
async fn test_top_k_clamped_to_range() {
    let source = StaticSource::new().with_document("Short", "First paragraph.\n\nSecond paragraph.");
    let corpus = flat_corpus(source);
    corpus.ingest("Short").await.unwrap();

    let passages = corpus.retrieve("Short", 100).await.unwrap();
    assert_eq!(passages.len(), 2);
}

#[tokio::test]
async fn test_zero_chunk_document_records_nothing() {
    let source = StaticSource::new()
        .with_document("Battle of Hastings", document(&HASTINGS))
        .with_document("Blank", "  \n\n\t\n");
    let corpus = flat_corpus(source);
    corpus.ingest("Battle of Hastings").await.unwrap();

    let info = corpus.ingest("Blank").await.unwrap();
    assert_eq!(info.range, None);
    assert_eq!(info.chunk_count, 0);
    assert_eq!(info.total_vectors, 4);
    assert!(corpus.range_of("Blank").is_none());

    // Auto-heal ingests again, still finds no range.
    let err = corpus.retrieve("Blank", 3).await.unwrap_err();
    assert!(matches!(err, RetrievalError::EventUnknown(_)));
    assert_eq!(corpus.stats().vectors, 4);
}

#[tokio::test]
async fn test_auto_heal_ingests_on_first_retrieval() {
    let corpus = flat_corpus(scenario_source());
    assert!(corpus.range_of("French Revolution").is_none());

    let passages = corpus.retrieve("French Revolution", 3).await.unwrap();
    assert_eq!(passages.len(), 3);
    assert_eq!(
        corpus.range_of("French Revolution"),
        Some(EventRange::new(0, 5).unwrap())
    );
}

#[tokio::test]
async fn test_unknown_source_propagates() {
    let corpus = flat_corpus(scenario_source());

    let err = corpus.ingest("Battle of Nowhere").await.unwrap_err();
    assert!(matches!(err, RetrievalError::SourceNotFound(_)));

    let err = corpus.retrieve("Battle of Nowhere", 3).await.unwrap_err();
    assert!(matches!(err, RetrievalError::SourceNotFound(_)));
    assert!(err.is_not_found());
    assert_eq!(corpus.stats().vectors, 0);
}

#[tokio::test]
async fn test_reingest_shadows_and_orphans() {
    let source = scenario_source();
    let corpus = flat_corpus(source);
    corpus.ingest("Battle of Hastings").await.unwrap();
    corpus.ingest("French Revolution").await.unwrap();

    let again = corpus.ingest("Battle of Hastings").await.unwrap();
    assert_eq!(again.range, Some(EventRange::new(10, 13).unwrap()));

    let stats = corpus.stats();
    assert_eq!(stats.vectors, 14);
    assert_eq!(stats.reachable_vectors, 10);
    assert_eq!(stats.orphaned_vectors, 4);
    assert_eq!(stats.superseded_ranges, 1);
    assert_eq!(stats.events, 2);

    // Old vectors are still addressable by position.
    assert_eq!(corpus.reconstruct(0).unwrap(), corpus.reconstruct(10).unwrap());

    let passages = corpus.retrieve("Battle of Hastings", 4).await.unwrap();
    assert_eq!(passages.len(), 4);
}

#[tokio::test]
async fn test_retire_hides_event_without_compaction() {
    let corpus = flat_corpus(scenario_source()).with_auto_heal(false);
    corpus.ingest("Battle of Hastings").await.unwrap();
    corpus.ingest("French Revolution").await.unwrap();

    let retired = corpus.retire("Battle of Hastings").unwrap();
    assert_eq!(retired, EventRange::new(0, 3).unwrap());

    let err = corpus.retrieve("Battle of Hastings", 3).await.unwrap_err();
    assert!(matches!(err, RetrievalError::EventUnknown(_)));
    assert!(matches!(
        corpus.retire("Battle of Hastings"),
        Err(RetrievalError::EventUnknown(_))
    ));

    let stats = corpus.stats();
    assert_eq!(stats.vectors, 10);
    assert_eq!(stats.retired_ranges, 1);
    assert_eq!(stats.orphaned_vectors, 4);

    // Other events are unaffected.
    assert_eq!(corpus.retrieve("French Revolution", 2).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_no_information_sentinel_when_nothing_resolves() {
    let corpus = flat_corpus(scenario_source());
    corpus.ingest("Battle of Hastings").await.unwrap();

    let passages = corpus.retrieve("Battle of Hastings", 0).await.unwrap();
    assert_eq!(passages, vec![NO_RELEVANT_INFORMATION.to_string()]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_ingests_keep_ranges_disjoint_and_contiguous() {
    let mut source = StaticSource::new();
    for i in 0..16 {
        let paragraphs: Vec<String> = (0..=(i % 5))
            .map(|p| format!("Event {} paragraph {} about the campaign.", i, p))
            .collect();
        source = source.with_document(format!("Event {}", i), paragraphs.join("\n\n"));
    }
    let corpus = Arc::new(flat_corpus(source));

    let mut handles = Vec::new();
    for i in 0..16 {
        let corpus = Arc::clone(&corpus);
        handles.push(tokio::spawn(async move {
            corpus.ingest(&format!("Event {}", i)).await.unwrap()
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let records = corpus.events();
    assert_eq!(records.len(), 16);

    // Sorted by start, the ranges tile [0, total) with no gaps or overlaps.
    let mut next = 0u64;
    for record in &records {
        assert_eq!(record.range.start(), next, "gap or overlap at {}", record.event_id);
        let index: usize = record.event_id["Event ".len()..].parse().unwrap();
        assert_eq!(record.range.len(), index % 5 + 1);
        next = record.range.end() + 1;
    }
    assert_eq!(next as usize, corpus.stats().vectors);
}

#[tokio::test]
async fn test_persisted_vectors_survive_restart_as_orphans() {
    let dir = TempDir::new().unwrap();
    {
        let corpus = hnsw_corpus(&dir, scenario_source());
        corpus.ingest("Battle of Hastings").await.unwrap();
        corpus.ingest("French Revolution").await.unwrap();
    }

    let corpus = hnsw_corpus(&dir, scenario_source());
    let stats = corpus.stats();
    assert_eq!(stats.vectors, 10);
    assert_eq!(stats.events, 0);
    assert_eq!(stats.orphaned_vectors, 10);

    // Auto-heal appends after the persisted vectors.
    corpus.retrieve("Battle of Hastings", 3).await.unwrap();
    assert_eq!(
        corpus.range_of("Battle of Hastings"),
        Some(EventRange::new(10, 13).unwrap())
    );
}

#[test]
fn test_dimension_mismatch_refused() {
    let index = FlatIndex::new(384);
    assert_eq!(index.dimension(), 384);
    let result = EventCorpus::new(
        Box::new(index),
        Arc::new(HashingEmbedder::new(DIM)),
        Arc::new(StaticSource::new()),
    );
    assert!(matches!(result, Err(RetrievalError::EmbeddingProvider(_))));
}

/// A failed save surfaces as a persistence error and records no range; the
/// next successful ingestion starts after the unrecorded vectors.
#[tokio::test]
async fn test_save_failure_records_no_range() {
    let dir = TempDir::new().unwrap();
    let index_dir = dir.path().join("index");
    let index = HnswIndex::open_or_create(HnswConfig::new(DIM, &index_dir)).unwrap();
    let corpus = EventCorpus::new(
        Box::new(index),
        Arc::new(HashingEmbedder::new(DIM)),
        Arc::new(scenario_source()),
    )
    .unwrap();

    std::fs::remove_dir_all(&index_dir).unwrap();
    let err = corpus.ingest("Battle of Hastings").await.unwrap_err();
    assert!(matches!(err, RetrievalError::Persistence(_)), "got {err:?}");
    assert_eq!(corpus.range_of("Battle of Hastings"), None);
    assert!(corpus.events().is_empty());

    let stats = corpus.stats();
    assert_eq!(stats.passages, 0);
    assert_eq!(stats.orphaned_vectors, stats.vectors);

    std::fs::create_dir_all(&index_dir).unwrap();
    let info = corpus.ingest("French Revolution").await.unwrap();
    let start = stats.vectors as u64;
    assert_eq!(info.range, Some(EventRange::new(start, start + 5).unwrap()));
}

/// Flat index whose visible length can be cut short and whose scoped search
/// can be made to ignore the range, to exercise retrieval's filtering.
struct FaultyIndex {
    inner: FlatIndex,
    visible: Arc<AtomicUsize>,
    ignore_scope: bool,
}

impl FaultyIndex {
    fn new(ignore_scope: bool) -> (Self, Arc<AtomicUsize>) {
        let visible = Arc::new(AtomicUsize::new(usize::MAX));
        let index = Self {
            inner: FlatIndex::new(DIM),
            visible: Arc::clone(&visible),
            ignore_scope,
        };
        (index, visible)
    }
}

impl VectorIndex for FaultyIndex {
    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn len(&self) -> usize {
        self.inner.len().min(self.visible.load(Ordering::SeqCst))
    }

    fn append(&mut self, vectors: &[Embedding]) -> Result<Vec<u64>, VectorError> {
        self.inner.append(vectors)
    }

    fn reconstruct(&self, position: u64) -> Result<Embedding, VectorError> {
        self.inner.reconstruct(position)
    }

    fn search_all(&self, query: &Embedding, top_k: usize) -> Result<Vec<SearchHit>, VectorError> {
        self.inner.search_all(query, top_k)
    }

    fn stats(&self) -> IndexStats {
        self.inner.stats()
    }

    fn search_within(
        &self,
        query: &Embedding,
        range: EventRange,
        top_k: usize,
    ) -> Result<Vec<SearchHit>, VectorError> {
        if self.ignore_scope {
            return self.inner.search_all(query, self.inner.len());
        }
        if range.end() >= self.len() as u64 {
            return Err(VectorError::OutOfRange {
                position: range.end(),
                len: self.len(),
            });
        }
        self.inner.search_within(query, range, top_k)
    }
}

fn faulty_corpus(ignore_scope: bool) -> (EventCorpus, Arc<AtomicUsize>) {
    let (index, visible) = FaultyIndex::new(ignore_scope);
    let corpus = EventCorpus::new(
        Box::new(index),
        Arc::new(HashingEmbedder::new(DIM)),
        Arc::new(scenario_source()),
    )
    .unwrap();
    (corpus, visible)
}

/// A range reaching past the end of the index yields the no-information
/// passage instead of an error.
#[tokio::test]
async fn test_range_past_index_end_returns_no_information() {
    let (corpus, visible) = faulty_corpus(false);
    corpus.ingest("Battle of Hastings").await.unwrap();
    corpus.ingest("French Revolution").await.unwrap();

    visible.store(6, Ordering::SeqCst);
    let passages = corpus.retrieve("French Revolution", 3).await.unwrap();
    assert_eq!(passages, vec![NO_RELEVANT_INFORMATION.to_string()]);

    // The Hastings range is still fully inside the visible index.
    let passages = corpus.retrieve("Battle of Hastings", 2).await.unwrap();
    assert_eq!(passages.len(), 2);
}

/// Hits from outside the event's range are dropped, never resolved to
/// another event's text.
#[tokio::test]
async fn test_hits_outside_range_are_discarded() {
    let (corpus, _visible) = faulty_corpus(true);
    corpus.ingest("Battle of Hastings").await.unwrap();
    corpus.ingest("French Revolution").await.unwrap();

    let passages = corpus.retrieve("French Revolution", 6).await.unwrap();
    let allowed: HashSet<&str> = FRENCH_REVOLUTION.iter().copied().collect();
    assert_eq!(passages.len(), 6);
    assert!(passages.iter().all(|p| allowed.contains(p.as_str())));

    let passages = corpus.retrieve("Battle of Hastings", 4).await.unwrap();
    let allowed: HashSet<&str> = HASTINGS.iter().copied().collect();
    assert_eq!(passages.len(), 4);
    assert!(passages.iter().all(|p| allowed.contains(p.as_str())));
}
