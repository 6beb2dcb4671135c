//! Embedding model trait and types.

use crate::error::EmbeddingError;

/// A dense float vector produced by an embedding provider.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    /// Create an embedding normalized to unit length.
    pub fn new(values: Vec<f32>) -> Self {
        let norm: f32 = values.iter().map(|x| x * x).sum::<f32>().sqrt();
        let normalized = if norm > 0.0 {
            values.iter().map(|x| x / norm).collect()
        } else {
            values
        };
        Self { values: normalized }
    }

    /// Wrap a vector as-is, without normalization.
    ///
    /// Used for vectors read back from the index, which must round-trip exactly.
    pub fn from_raw(values: Vec<f32>) -> Self {
        Self { values }
    }

    pub fn dimension(&self) -> usize {
        self.values.len()
    }

    /// Squared Euclidean distance. Returns `f32::INFINITY` on length mismatch.
    pub fn l2_squared(&self, other: &Embedding) -> f32 {
        if self.values.len() != other.values.len() {
            return f32::INFINITY;
        }
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum()
    }

    /// Euclidean (L2) distance; lower means more similar.
    pub fn l2_distance(&self, other: &Embedding) -> f32 {
        self.l2_squared(other).sqrt()
    }

    /// Fail unless the embedding has exactly `expected` components.
    pub fn ensure_dimension(&self, expected: usize) -> Result<(), EmbeddingError> {
        if self.dimension() != expected {
            return Err(EmbeddingError::DimensionMismatch {
                expected,
                actual: self.dimension(),
            });
        }
        Ok(())
    }
}

/// Model information
#[derive(Debug, Clone)]
pub struct ModelInfo {
    /// Model name (e.g., "all-MiniLM-L6-v2")
    pub name: String,
    /// Embedding dimension
    pub dimension: usize,
    /// Maximum sequence length in tokens
    pub max_sequence_length: usize,
}

/// Trait for embedding providers.
///
/// Implementations must be thread-safe (Send + Sync); the corpus shares one
/// provider across requests and calls it from blocking worker threads.
pub trait EmbeddingModel: Send + Sync {
    /// Get model information
    fn info(&self) -> &ModelInfo;

    /// Embedding dimension produced by this provider.
    fn dimension(&self) -> usize {
        self.info().dimension
    }

    /// Generate embedding for a single text.
    fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError>;

    /// Generate embeddings for multiple texts, preserving order.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, EmbeddingError> {
        texts.iter().map(|text| self.embed(text)).collect()
    }

    /// Generate embeddings for multiple owned strings.
    fn embed_texts(&self, texts: &[String]) -> Result<Vec<Embedding>, EmbeddingError> {
        let refs: Vec<&str> = texts.iter().map(|s| s.as_str()).collect();
        self.embed_batch(&refs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_normalization() {
        let emb = Embedding::new(vec![3.0, 4.0]);
        assert!((emb.values[0] - 0.6).abs() < 0.001);
        assert!((emb.values[1] - 0.8).abs() < 0.001);
    }

    #[test]
    fn test_from_raw_keeps_values() {
        let emb = Embedding::from_raw(vec![3.0, 4.0]);
        assert_eq!(emb.values, vec![3.0, 4.0]);
    }

    #[test]
    fn test_l2_distance() {
        let a = Embedding::from_raw(vec![0.0, 0.0]);
        let b = Embedding::from_raw(vec![3.0, 4.0]);
        assert!((a.l2_squared(&b) - 25.0).abs() < 1e-6);
        assert!((a.l2_distance(&b) - 5.0).abs() < 1e-6);
        assert_eq!(a.l2_distance(&a), 0.0);
    }

    #[test]
    fn test_l2_length_mismatch_is_infinite() {
        let a = Embedding::from_raw(vec![0.0, 0.0]);
        let b = Embedding::from_raw(vec![0.0]);
        assert!(a.l2_squared(&b).is_infinite());
    }

    #[test]
    fn test_ensure_dimension() {
        let emb = Embedding::from_raw(vec![1.0; 8]);
        assert!(emb.ensure_dimension(8).is_ok());
        assert!(matches!(
            emb.ensure_dimension(384),
            Err(EmbeddingError::DimensionMismatch {
                expected: 384,
                actual: 8
            })
        ));
    }
}
