//! End-to-end test infrastructure for Chronicle.
//!
//! Provides a shared TestHarness and helper functions for E2E tests
//! covering the full fetch-to-summary pipeline.

use std::path::PathBuf;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use chronicle_embeddings::{Embedding, EmbeddingModel};
use chronicle_retrieval::{EventCorpus, StaticSource};
use chronicle_vector::{HnswConfig, HnswIndex};

/// Paragraphs of the "Battle of Hastings" reference document.
pub const HASTINGS: [&str; 4] = [
    "The Battle of Hastings was fought on 14 October 1066 between the Norman-French army of William, the Duke of Normandy, and an English army under the Anglo-Saxon King Harold Godwinson, beginning the Norman Conquest of England.",
    "Harold had been crowned king in January 1066 after the death of Edward the Confessor, and had defeated a Norwegian invasion at the Battle of Stamford Bridge only days before William landed at Pevensey.",
    "The English army formed a shield wall on Senlac Hill. Norman archers and cavalry attacked repeatedly, and feigned retreats drew parts of the English line down the slope.",
    "Harold was killed late in the day and the English army broke. William was crowned King of England at Westminster Abbey on Christmas Day 1066.",
];

/// Paragraphs of the "French Revolution" reference document.
pub const FRENCH_REVOLUTION: [&str; 6] = [
    "The French Revolution was a period of political and societal change in France that began with the Estates General of 1789 and ended with the coup of 18 Brumaire in November 1799.",
    "Financial crisis and widespread social distress led to the convocation of the Estates General in May 1789, its first meeting since 1614.",
    "The Storming of the Bastille on 14 July led to a series of radical measures by the Assembly, including the abolition of feudalism.",
    "The Declaration of the Rights of Man and of the Citizen set out the principles of liberty, equality and popular sovereignty.",
    "The monarchy was abolished in September 1792 and Louis XVI was executed the following January; the Reign of Terror followed.",
    "The Directory assumed power in 1795 and was overthrown by Napoleon Bonaparte, who established the Consulate in 1799.",
];

/// Shared test harness for E2E tests.
pub struct TestHarness {
    /// Keeps temp dir alive for the lifetime of the harness
    pub _temp_dir: tempfile::TempDir,
    /// Path for vector index files
    pub vector_index_path: PathBuf,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        let vector_index_path = temp_dir.path().join("vector-index");
        std::fs::create_dir_all(&vector_index_path).expect("Failed to create vector index dir");

        Self {
            _temp_dir: temp_dir,
            vector_index_path,
        }
    }

    /// Open (or reopen) the persisted index in this harness.
    pub fn open_index(&self, dimension: usize) -> HnswIndex {
        HnswIndex::open_or_create(HnswConfig::new(dimension, &self.vector_index_path))
            .expect("Failed to open HNSW index")
    }

    /// Corpus over this harness's persisted index.
    pub fn open_corpus(
        &self,
        embedder: Arc<dyn EmbeddingModel>,
        source: StaticSource,
    ) -> EventCorpus {
        let index = self.open_index(embedder.dimension());
        EventCorpus::new(Box::new(index), embedder, Arc::new(source))
            .expect("Embedder and index dimensions differ")
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Join paragraphs the way reference documents separate them.
pub fn document(paragraphs: &[&str]) -> String {
    paragraphs.join("\n\n")
}

/// Source holding the Hastings and French Revolution documents.
pub fn scenario_source() -> StaticSource {
    StaticSource::new()
        .with_document("Battle of Hastings", document(&HASTINGS))
        .with_document("French Revolution", document(&FRENCH_REVOLUTION))
}

/// Source with `events` synthetic documents of `paragraphs` paragraphs each,
/// named "Event 0", "Event 1", ...
pub fn synthetic_source(events: usize, paragraphs: usize) -> StaticSource {
    let source = StaticSource::new();
    for e in 0..events {
        let text = (0..paragraphs)
            .map(|p| {
                format!(
                    "Event {} chronicle entry {}: the garrison of fort {} held the river crossing for {} days.",
                    e,
                    p,
                    e * 31 + p,
                    p + 1
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n");
        source.insert(format!("Event {}", e), text);
    }
    source
}

/// Reproducible random unit vectors.
pub fn random_embeddings(count: usize, dimension: usize, seed: u64) -> Vec<Embedding> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let values = (0..dimension)
                .map(|_| rng.random_range(-1.0f32..1.0))
                .collect();
            Embedding::new(values)
        })
        .collect()
}
