//! Exact brute-force L2 index.
//!
//! Scoped searches build one of these over a single event's vectors. It also
//! serves as a non-persistent [`VectorIndex`] for offline sessions and tests.

use chronicle_embeddings::Embedding;
use tracing::debug;

use crate::error::VectorError;
use crate::index::{IndexStats, SearchHit, VectorIndex};

#[derive(Debug, Clone)]
pub struct FlatIndex {
    dimension: usize,
    /// Global position of the first stored vector
    base: u64,
    vectors: Vec<Embedding>,
}

impl FlatIndex {
    pub fn new(dimension: usize) -> Self {
        Self::with_base(dimension, 0)
    }

    /// Index whose first vector reports position `base`.
    pub fn with_base(dimension: usize, base: u64) -> Self {
        Self {
            dimension,
            base,
            vectors: Vec::new(),
        }
    }

    /// Store one vector at the next position.
    pub fn push(&mut self, vector: Embedding) -> Result<u64, VectorError> {
        if vector.dimension() != self.dimension {
            return Err(VectorError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.dimension(),
            });
        }
        let position = self.base + self.vectors.len() as u64;
        self.vectors.push(vector);
        Ok(position)
    }
}

impl VectorIndex for FlatIndex {
    fn dimension(&self) -> usize {
        self.dimension
    }

    /// Counts positions below `base` as assigned, so `len` is the next position.
    fn len(&self) -> usize {
        self.base as usize + self.vectors.len()
    }

    fn append(&mut self, vectors: &[Embedding]) -> Result<Vec<u64>, VectorError> {
        for vector in vectors {
            if vector.dimension() != self.dimension {
                return Err(VectorError::DimensionMismatch {
                    expected: self.dimension,
                    actual: vector.dimension(),
                });
            }
        }
        vectors.iter().map(|v| self.push(v.clone())).collect()
    }

    fn reconstruct(&self, position: u64) -> Result<Embedding, VectorError> {
        position
            .checked_sub(self.base)
            .and_then(|offset| self.vectors.get(offset as usize))
            .cloned()
            .ok_or(VectorError::OutOfRange {
                position,
                len: self.len(),
            })
    }

    fn search_all(&self, query: &Embedding, top_k: usize) -> Result<Vec<SearchHit>, VectorError> {
        self.check_query(query)?;

        let mut hits: Vec<SearchHit> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(offset, v)| SearchHit::new(self.base + offset as u64, query.l2_distance(v)))
            .collect();

        // Ties resolve to the earlier position so results are reproducible.
        hits.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then(a.position.cmp(&b.position))
        });
        hits.truncate(top_k);

        debug!(k = top_k, found = hits.len(), "Flat search complete");
        Ok(hits)
    }

    fn stats(&self) -> IndexStats {
        IndexStats {
            vector_count: self.len(),
            dimension: self.dimension,
            size_bytes: 0,
            available: true,
        }
    }
}
