//! Passage and range types.
//!
//! A reference document for an event is split into chunks. Each chunk's
//! embedding is appended to the shared vector index at a global position,
//! and the positions for one event always form a contiguous inclusive range.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ChronicleError;

/// Returned in place of passages when a retrieval resolves nothing.
pub const NO_RELEVANT_INFORMATION: &str = "No relevant information found.";

/// Inclusive span `[start, end]` of global index positions owned by one event.
///
/// `start <= end` always holds, including for deserialized values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawEventRange")]
pub struct EventRange {
    start: u64,
    end: u64,
}

#[derive(Deserialize)]
struct RawEventRange {
    start: u64,
    end: u64,
}

impl TryFrom<RawEventRange> for EventRange {
    type Error = ChronicleError;

    fn try_from(raw: RawEventRange) -> Result<Self, Self::Error> {
        EventRange::new(raw.start, raw.end)
    }
}

impl EventRange {
    /// Create a range, rejecting `start > end`.
    pub fn new(start: u64, end: u64) -> Result<Self, ChronicleError> {
        if start > end {
            return Err(ChronicleError::InvalidInput(format!(
                "range start {} is past end {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    /// Range covering `count` positions beginning at `start`.
    ///
    /// Returns `None` for an empty span; zero-length ranges are never recorded.
    pub fn from_span(start: u64, count: usize) -> Option<Self> {
        if count == 0 {
            return None;
        }
        Some(Self {
            start,
            end: start + count as u64 - 1,
        })
    }

    /// First position in the range.
    pub fn start(&self) -> u64 {
        self.start
    }

    /// Last position in the range (inclusive).
    pub fn end(&self) -> u64 {
        self.end
    }

    /// Number of positions in the range (never zero).
    pub fn len(&self) -> usize {
        (self.end - self.start + 1) as usize
    }

    /// Always false; kept for API symmetry with collections.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn contains(&self, position: u64) -> bool {
        (self.start..=self.end).contains(&position)
    }

    /// Map a global position to the event-local chunk index.
    pub fn local_index(&self, position: u64) -> Option<usize> {
        self.contains(position)
            .then(|| (position - self.start) as usize)
    }

    /// Whether two ranges share any position.
    pub fn overlaps(&self, other: &EventRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    /// Iterate the global positions in ascending order.
    pub fn positions(&self) -> impl Iterator<Item = u64> {
        self.start..=self.end
    }
}

impl std::fmt::Display for EventRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

/// Outcome of one ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RangeInfo {
    /// Event that was ingested
    pub event_id: String,
    /// Recorded range, `None` when the document produced no chunks
    pub range: Option<EventRange>,
    /// Number of chunks stored
    pub chunk_count: usize,
    /// Index size after the ingestion
    pub total_vectors: usize,
    /// When the ingestion committed
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub ingested_at: DateTime<Utc>,
}

impl RangeInfo {
    pub fn new(
        event_id: impl Into<String>,
        range: Option<EventRange>,
        chunk_count: usize,
        total_vectors: usize,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            range,
            chunk_count,
            total_vectors,
            ingested_at: Utc::now(),
        }
    }
}
