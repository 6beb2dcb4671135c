//! Passage store.
//!
//! Holds each event's chunk texts in document order. Entry `i` belongs to
//! global position `range.start + i` of the event's active range.

use std::collections::HashMap;

use tracing::debug;

use crate::error::VectorError;

#[derive(Debug, Default)]
pub struct PassageStore {
    entries: HashMap<String, Vec<String>>,
}

impl PassageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `chunks` for `event_id`, returning the chunks it replaced.
    pub fn put(&mut self, event_id: &str, chunks: Vec<String>) -> Option<Vec<String>> {
        debug!(event = event_id, chunks = chunks.len(), "Stored passages");
        self.entries.insert(event_id.to_string(), chunks)
    }

    pub fn get(&self, event_id: &str, local_index: usize) -> Result<&str, VectorError> {
        self.entries
            .get(event_id)
            .and_then(|chunks| chunks.get(local_index))
            .map(String::as_str)
            .ok_or_else(|| VectorError::PassageNotFound {
                event_id: event_id.to_string(),
                local_index,
            })
    }

    /// Number of events with stored passages.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total passages across all events.
    pub fn passage_count(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }
}
