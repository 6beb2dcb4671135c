//! Retrieval with the real sentence embedding model.
//!
//! NOTE: These tests require the all-MiniLM-L6-v2 model (~80MB download on
//! first run). The model is cached locally after the first download. Run with:
//!   cargo test -p e2e-tests --test model_test -- --ignored --nocapture

use std::collections::HashSet;
use std::sync::{Arc, OnceLock};

use pretty_assertions::assert_eq;

use chronicle_embeddings::{CandleEmbedder, EmbeddingModel};
use chronicle_types::EventRange;
use e2e_tests::{scenario_source, TestHarness, FRENCH_REVOLUTION, HASTINGS};

/// Shared embedder across tests to avoid concurrent model loading.
static EMBEDDER: OnceLock<Arc<CandleEmbedder>> = OnceLock::new();

fn get_embedder() -> Arc<CandleEmbedder> {
    EMBEDDER
        .get_or_init(|| {
            let embedder =
                CandleEmbedder::load_default().expect("Failed to load embedding model");
            Arc::new(embedder)
        })
        .clone()
}

#[tokio::test]
#[ignore = "requires model download (~80MB on first run)"]
async fn test_model_scenario_retrieval() {
    let harness = TestHarness::new();
    let embedder = tokio::task::spawn_blocking(get_embedder)
        .await
        .expect("Embedding model load task panicked");
    assert_eq!(embedder.dimension(), 384);

    let corpus = harness.open_corpus(embedder, scenario_source());
    let hastings = corpus.ingest("Battle of Hastings").await.unwrap();
    let revolution = corpus.ingest("French Revolution").await.unwrap();
    assert_eq!(hastings.range, Some(EventRange::new(0, 3).unwrap()));
    assert_eq!(revolution.range, Some(EventRange::new(4, 9).unwrap()));

    let passages = corpus.retrieve("Battle of Hastings", 3).await.unwrap();
    let allowed: HashSet<&str> = HASTINGS.iter().copied().collect();
    assert_eq!(passages.len(), 3);
    assert!(passages.iter().all(|p| allowed.contains(p.as_str())));

    let passages = corpus.retrieve("French Revolution", 1).await.unwrap();
    assert_eq!(passages.len(), 1);
    assert!(FRENCH_REVOLUTION.contains(&passages[0].as_str()));
}

#[tokio::test]
#[ignore = "requires model download (~80MB on first run)"]
async fn test_model_embeddings_are_deterministic() {
    let embedder = tokio::task::spawn_blocking(get_embedder)
        .await
        .expect("Embedding model load task panicked");

    let a = embedder.embed(HASTINGS[0]).unwrap();
    let b = embedder.embed(HASTINGS[0]).unwrap();
    assert!(a.l2_distance(&b) < 1e-5);

    let related = embedder.embed(HASTINGS[3]).unwrap();
    let unrelated = embedder.embed(FRENCH_REVOLUTION[4]).unwrap();
    assert!(a.l2_distance(&related) < a.l2_distance(&unrelated));
}
