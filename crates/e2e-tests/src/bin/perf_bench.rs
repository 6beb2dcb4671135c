use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use clap::{Parser, ValueEnum};
use serde::Serialize;

use chronicle_embeddings::{CandleEmbedder, EmbeddingModel, HashingEmbedder};
use e2e_tests::{synthetic_source, TestHarness};

const DEFAULT_ITERATIONS: usize = 3;

#[derive(Parser, Debug)]
#[command(name = "perf_bench", about = "Chronicle ingest/retrieve benchmark harness")]
struct Args {
    #[arg(long, value_enum, default_value = "small")]
    tier: DatasetTier,
    #[arg(long, value_enum, default_value = "hashing")]
    embedder: EmbedderKind,
    #[arg(long, default_value_t = DEFAULT_ITERATIONS)]
    iterations: usize,
    #[arg(long, default_value_t = 3)]
    top_k: usize,
}

#[derive(Clone, Copy, Debug, Serialize, ValueEnum, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
enum DatasetTier {
    Small,
    Medium,
}

impl DatasetTier {
    /// (events, paragraphs per event)
    fn shape(self) -> (usize, usize) {
        match self {
            DatasetTier::Small => (20, 8),
            DatasetTier::Medium => (200, 12),
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, ValueEnum, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
enum EmbedderKind {
    Hashing,
    Model,
}

#[derive(Clone, Debug, Serialize)]
struct StepMetrics {
    p50_ms: f64,
    p90_ms: f64,
    p99_ms: f64,
    samples: usize,
}

#[derive(Debug, Serialize)]
struct BenchmarkOutput {
    tier: DatasetTier,
    embedder: EmbedderKind,
    iterations: usize,
    vectors: usize,
    steps: BTreeMap<String, StepMetrics>,
}

fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = ((p / 100.0) * (sorted.len() - 1) as f64).round() as usize;
    sorted[rank.min(sorted.len() - 1)]
}

fn summarize(mut samples: Vec<f64>) -> StepMetrics {
    samples.sort_by(|a, b| a.total_cmp(b));
    StepMetrics {
        p50_ms: percentile(&samples, 50.0),
        p90_ms: percentile(&samples, 90.0),
        p99_ms: percentile(&samples, 99.0),
        samples: samples.len(),
    }
}

fn load_embedder(kind: EmbedderKind) -> Result<Arc<dyn EmbeddingModel>, Box<dyn std::error::Error>> {
    Ok(match kind {
        EmbedderKind::Hashing => Arc::new(HashingEmbedder::new(384)),
        EmbedderKind::Model => Arc::new(CandleEmbedder::load_default()?),
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let (events, paragraphs) = args.tier.shape();
    let embedder = load_embedder(args.embedder)?;

    let mut ingest_ms = Vec::new();
    let mut retrieve_ms = Vec::new();
    let mut vectors = 0;

    for _ in 0..args.iterations.max(1) {
        let harness = TestHarness::new();
        let corpus = harness.open_corpus(Arc::clone(&embedder), synthetic_source(events, paragraphs));

        for e in 0..events {
            let started = Instant::now();
            corpus.ingest(&format!("Event {}", e)).await?;
            ingest_ms.push(started.elapsed().as_secs_f64() * 1000.0);
        }

        for e in 0..events {
            let started = Instant::now();
            corpus.retrieve(&format!("Event {}", e), args.top_k).await?;
            retrieve_ms.push(started.elapsed().as_secs_f64() * 1000.0);
        }

        vectors = corpus.stats().vectors;
    }

    let mut steps = BTreeMap::new();
    steps.insert("ingest".to_string(), summarize(ingest_ms));
    steps.insert("retrieve".to_string(), summarize(retrieve_ms));

    let output = BenchmarkOutput {
        tier: args.tier,
        embedder: args.embedder,
        iterations: args.iterations,
        vectors,
        steps,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
