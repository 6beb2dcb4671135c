//! # chronicle-vector
//!
//! Incremental vector index and per-event bookkeeping for Chronicle.
//!
//! Every passage embedding is appended to one shared index at a permanent
//! global position. An event owns the contiguous range of positions its
//! passages were appended at, and retrieval searches only inside that range.
//!
//! ## Components
//! - [`HnswIndex`]: usearch-backed index persisted to a single file
//! - [`FlatIndex`]: exact L2 index, materialized per scoped search
//! - [`RangeRegistry`]: event id to active range, with superseded history
//! - [`PassageStore`]: event id to ordered chunk texts
//!
//! The registry and passage store live in memory only. Vectors persisted by a
//! previous process have no registry entry after a restart and are reported
//! as orphaned rather than reclaimed.

pub mod error;
pub mod flat;
pub mod hnsw;
pub mod index;
pub mod passages;
pub mod registry;

pub use error::VectorError;
pub use flat::FlatIndex;
pub use hnsw::{HnswConfig, HnswIndex, INDEX_FILE};
pub use index::{IndexStats, SearchHit, VectorIndex};
pub use passages::PassageStore;
pub use registry::{RangeRecord, RangeRegistry, RangeState};
