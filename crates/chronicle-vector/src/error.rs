//! Vector index error types.

use thiserror::Error;

/// Errors raised by the index, the range registry and the passage store.
#[derive(Debug, Error)]
pub enum VectorError {
    /// usearch index error
    #[error("Index error: {0}")]
    Index(String),

    /// Dimension mismatch
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Position was never assigned
    #[error("Position {position} out of range (index holds {len} vectors)")]
    OutOfRange { position: u64, len: usize },

    /// No active range recorded for the event
    #[error("Event not found: {0}")]
    EventNotFound(String),

    /// Unknown event or chunk index in the passage store
    #[error("Passage not found: {event_id}[{local_index}]")]
    PassageNotFound { event_id: String, local_index: usize },

    /// Range would break the contiguity invariant
    #[error("Invalid range: {0}")]
    InvalidRange(String),

    /// Index file could not be read or written
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
