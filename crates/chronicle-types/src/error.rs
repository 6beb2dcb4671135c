//! Error types for the Chronicle system.

use thiserror::Error;

/// Unified error type for shared Chronicle operations.
#[derive(Debug, Error)]
pub enum ChronicleError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input error
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
