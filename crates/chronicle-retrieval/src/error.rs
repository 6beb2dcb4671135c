//! Retrieval error types.

use chronicle_embeddings::EmbeddingError;
use chronicle_vector::VectorError;
use thiserror::Error;

/// Errors surfaced by ingestion and retrieval.
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// No reference document exists for the event
    #[error("No reference document for '{0}'")]
    SourceNotFound(String),

    /// The document source failed (network, bad response)
    #[error("Document source error: {0}")]
    Source(String),

    /// Event still has no range after the auto-heal ingestion
    #[error("Event '{0}' has not been ingested")]
    EventUnknown(String),

    /// Index position invalid; indicates a bookkeeping bug
    #[error("Position {position} out of range (index holds {len} vectors)")]
    OutOfRange { position: u64, len: usize },

    /// Embedding provider failed or is misconfigured
    #[error("Embedding provider error: {0}")]
    EmbeddingProvider(#[from] EmbeddingError),

    /// Index file could not be written; the ingestion is not durable
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Any other index, registry or store failure
    #[error("Index error: {0}")]
    Index(String),

    /// A blocking worker panicked or was cancelled
    #[error("Background task failed: {0}")]
    Task(String),
}

impl RetrievalError {
    /// Conditions callers should report as "not found".
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            RetrievalError::SourceNotFound(_) | RetrievalError::EventUnknown(_)
        )
    }
}

impl From<VectorError> for RetrievalError {
    fn from(err: VectorError) -> Self {
        match err {
            VectorError::OutOfRange { position, len } => {
                RetrievalError::OutOfRange { position, len }
            }
            VectorError::EventNotFound(event) => RetrievalError::EventUnknown(event),
            VectorError::Persistence(msg) => RetrievalError::Persistence(msg),
            VectorError::Io(e) => RetrievalError::Persistence(e.to_string()),
            VectorError::DimensionMismatch { expected, actual } => {
                RetrievalError::EmbeddingProvider(EmbeddingError::DimensionMismatch {
                    expected,
                    actual,
                })
            }
            other => RetrievalError::Index(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_grouping() {
        assert!(RetrievalError::SourceNotFound("x".into()).is_not_found());
        assert!(RetrievalError::EventUnknown("x".into()).is_not_found());
        assert!(!RetrievalError::Persistence("disk full".into()).is_not_found());
    }

    #[test]
    fn test_vector_error_mapping() {
        let err: RetrievalError = VectorError::Persistence("disk full".into()).into();
        assert!(matches!(err, RetrievalError::Persistence(_)));

        let err: RetrievalError = VectorError::EventNotFound("Hastings".into()).into();
        assert!(matches!(err, RetrievalError::EventUnknown(_)));

        let err: RetrievalError = VectorError::InvalidRange("overlap".into()).into();
        assert!(matches!(err, RetrievalError::Index(_)));
    }
}
