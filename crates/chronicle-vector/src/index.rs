//! Vector index trait and types.
//!
//! Defines the positional, append-only interface shared by the persisted
//! usearch index and the in-memory flat index.

use chronicle_embeddings::Embedding;
use chronicle_types::EventRange;

use crate::error::VectorError;
use crate::flat::FlatIndex;

/// One search result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchHit {
    /// Global position of the matching vector
    pub position: u64,
    /// Euclidean distance to the query (lower = more similar)
    pub distance: f32,
}

impl SearchHit {
    pub fn new(position: u64, distance: f32) -> Self {
        Self { position, distance }
    }
}

/// Index statistics
#[derive(Debug, Clone, Default)]
pub struct IndexStats {
    /// Number of vectors in the index
    pub vector_count: usize,
    /// Embedding dimension
    pub dimension: usize,
    /// Index file size in bytes (0 for in-memory indexes)
    pub size_bytes: u64,
    /// Whether index is available for search
    pub available: bool,
}

/// Append-only index addressed by global position.
///
/// Positions start at 0, increase by one per appended vector, and are never
/// reused or reassigned.
pub trait VectorIndex: Send + Sync {
    fn dimension(&self) -> usize;

    /// Number of assigned positions; also the next position to be assigned.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append vectors in order and return their positions.
    ///
    /// Durable implementations persist before returning. Either every vector
    /// has the index dimension or nothing is appended.
    fn append(&mut self, vectors: &[Embedding]) -> Result<Vec<u64>, VectorError>;

    /// Exact vector stored at `position`.
    fn reconstruct(&self, position: u64) -> Result<Embedding, VectorError>;

    /// Nearest neighbours over the whole index, closest first.
    fn search_all(&self, query: &Embedding, top_k: usize) -> Result<Vec<SearchHit>, VectorError>;

    fn stats(&self) -> IndexStats;

    /// Nearest neighbours, closest first, optionally restricted to `within`.
    ///
    /// A scoped search copies the range's vectors into a temporary exact
    /// index, so hits can only come from inside the range.
    fn search(
        &self,
        query: &Embedding,
        within: Option<EventRange>,
        top_k: usize,
    ) -> Result<Vec<SearchHit>, VectorError> {
        self.check_query(query)?;
        match within {
            Some(range) => self.search_within(query, range, top_k),
            None => self.search_all(query, top_k),
        }
    }

    /// Exact search over the inclusive `range` only.
    fn search_within(
        &self,
        query: &Embedding,
        range: EventRange,
        top_k: usize,
    ) -> Result<Vec<SearchHit>, VectorError> {
        if range.end() >= self.len() as u64 {
            return Err(VectorError::OutOfRange {
                position: range.end(),
                len: self.len(),
            });
        }

        let mut scoped = FlatIndex::with_base(self.dimension(), range.start());
        for position in range.positions() {
            scoped.push(self.reconstruct(position)?)?;
        }

        scoped.search_all(query, top_k.min(range.len()))
    }

    /// Reject queries whose dimension differs from the index.
    fn check_query(&self, query: &Embedding) -> Result<(), VectorError> {
        if query.dimension() != self.dimension() {
            return Err(VectorError::DimensionMismatch {
                expected: self.dimension(),
                actual: query.dimension(),
            });
        }
        Ok(())
    }
}
