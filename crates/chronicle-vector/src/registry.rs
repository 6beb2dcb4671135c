//! Event range registry.
//!
//! Maps an event id to the inclusive range of global positions holding its
//! passage vectors. Recording an event again replaces the active range
//! (last write wins) without reclaiming the earlier vectors; the replaced
//! range is kept as history so unreachable vectors can be counted.
//!
//! The registry is in-memory. Nothing here survives a restart.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use chronicle_types::EventRange;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::VectorError;

/// Lifecycle state of a recorded range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeState {
    /// Current range for its event
    Active,
    /// Shadowed by a later ingestion of the same event
    Superseded,
    /// Tombstoned by `retire`
    Retired,
}

#[derive(Debug, Clone, Serialize)]
pub struct RangeRecord {
    pub event_id: String,
    pub range: EventRange,
    pub state: RangeState,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct RangeRegistry {
    active: HashMap<String, RangeRecord>,
    inactive: Vec<RangeRecord>,
}

impl RangeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `[start, end]` as the active range of `event_id`.
    ///
    /// Returns the range it replaced, if any. Fails without recording when
    /// `start > end` or when the range overlaps another event's active range.
    pub fn record(
        &mut self,
        event_id: &str,
        start: u64,
        end: u64,
    ) -> Result<Option<EventRange>, VectorError> {
        let range =
            EventRange::new(start, end).map_err(|e| VectorError::InvalidRange(e.to_string()))?;

        if let Some(clash) = self
            .active
            .values()
            .find(|r| r.event_id != event_id && r.range.overlaps(&range))
        {
            return Err(VectorError::InvalidRange(format!(
                "{} for '{}' overlaps {} of '{}'",
                range, event_id, clash.range, clash.event_id
            )));
        }

        let record = RangeRecord {
            event_id: event_id.to_string(),
            range,
            state: RangeState::Active,
            recorded_at: Utc::now(),
        };

        let previous = self.active.insert(event_id.to_string(), record).map(|mut old| {
            old.state = RangeState::Superseded;
            let shadowed = old.range;
            self.inactive.push(old);
            shadowed
        });

        match previous {
            Some(old) => info!(
                event = event_id,
                range = %range,
                shadowed = %old,
                "Recorded range, earlier vectors left in place"
            ),
            None => debug!(event = event_id, range = %range, "Recorded range"),
        }
        Ok(previous)
    }

    /// Active range of `event_id`.
    pub fn lookup(&self, event_id: &str) -> Result<EventRange, VectorError> {
        self.active
            .get(event_id)
            .map(|r| r.range)
            .ok_or_else(|| VectorError::EventNotFound(event_id.to_string()))
    }

    pub fn contains(&self, event_id: &str) -> bool {
        self.active.contains_key(event_id)
    }

    /// Tombstone the active range of `event_id`; its vectors stay in the index.
    pub fn retire(&mut self, event_id: &str) -> Result<EventRange, VectorError> {
        let mut record = self
            .active
            .remove(event_id)
            .ok_or_else(|| VectorError::EventNotFound(event_id.to_string()))?;
        record.state = RangeState::Retired;
        let range = record.range;
        self.inactive.push(record);
        info!(event = event_id, range = %range, "Retired event range");
        Ok(range)
    }

    /// Active ranges ordered by start position.
    pub fn ranges(&self) -> Vec<&RangeRecord> {
        let mut records: Vec<&RangeRecord> = self.active.values().collect();
        records.sort_by_key(|r| r.range.start());
        records
    }

    /// Superseded and retired ranges, oldest first.
    pub fn inactive(&self) -> &[RangeRecord] {
        &self.inactive
    }

    /// Number of events with an active range.
    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Vectors reachable through an active range.
    pub fn reachable_vectors(&self) -> usize {
        self.active.values().map(|r| r.range.len()).sum()
    }
}
