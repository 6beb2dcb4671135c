//! # chronicle-types
//!
//! Shared domain types for the Chronicle event summarization system.
//!
//! This crate defines the data structures passed between the ingestion,
//! indexing and retrieval layers:
//! - Chunks: paragraph-sized passages of a reference document
//! - Event ranges: the span of global index positions owned by one event
//! - Settings: layered configuration
//!
//! ## Usage
//!
//! ```rust
//! use chronicle_types::EventRange;
//!
//! let range = EventRange::new(4, 9).unwrap();
//! assert_eq!(range.len(), 6);
//! ```

pub mod config;
pub mod error;
pub mod passage;

pub use config::{Settings, SourceSettings, SummarizerSettings};
pub use error::ChronicleError;
pub use passage::{EventRange, RangeInfo, NO_RELEVANT_INFORMATION};
