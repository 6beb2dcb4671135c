//! # chronicle-embeddings
//!
//! Sentence embedding providers for Chronicle.
//!
//! Every passage and every retrieval query is turned into a fixed-length
//! vector by an [`EmbeddingModel`]. The dimension reported by the model must
//! match the vector index's configured dimension.
//!
//! ## Providers
//! - [`CandleEmbedder`]: local all-MiniLM-L6-v2 inference via Candle (384 dims)
//! - [`HashingEmbedder`]: deterministic feature-hashing provider that needs no
//!   model download, used for offline runs and tests

pub mod cache;
pub mod candle;
pub mod error;
pub mod hashing;
pub mod model;

pub use crate::candle::CandleEmbedder;
pub use cache::{get_or_download_model, ModelCache, ModelPaths, DEFAULT_MODEL_REPO, MODEL_FILES};
pub use error::EmbeddingError;
pub use hashing::HashingEmbedder;
pub use model::{Embedding, EmbeddingModel, ModelInfo};
