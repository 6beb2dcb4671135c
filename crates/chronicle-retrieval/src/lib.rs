//! # chronicle-retrieval
//!
//! Ingestion and range-scoped retrieval for named historical events.
//!
//! ## Flow
//!
//! 1. A [`DocumentSource`] returns the reference text for an event.
//! 2. [`split_paragraphs`] cuts it on blank lines.
//! 3. [`EventCorpus::ingest`] embeds the paragraphs, appends the vectors to
//!    the shared index and records the event's position range.
//! 4. [`EventCorpus::retrieve`] embeds a query naming the event and searches
//!    only inside that range, ingesting first when the event is unknown.
//!
//! ```rust,ignore
//! let corpus = EventCorpus::new(index, embedder, source)?;
//! let info = corpus.ingest("Battle of Hastings").await?;
//! let passages = corpus.retrieve("Battle of Hastings", 3).await?;
//! ```

pub mod chunker;
pub mod corpus;
pub mod error;
pub mod source;

pub use chunker::split_paragraphs;
pub use corpus::{event_query, CorpusStats, EventCorpus};
pub use error::RetrievalError;
pub use source::{DocumentSource, StaticSource, WikipediaSource};
