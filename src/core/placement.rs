//! Program windows and ad placements on a program's timeline.

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

use crate::core::ad::Ad;
use crate::core::time::Timestamp;
use crate::schedule::ScheduleError;

/// The `[start, end)` interval bounding where ads may be inserted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProgramWindow {
    #[serde(rename = "programStartTime")]
    start: Timestamp,
    #[serde(rename = "programEndTime")]
    end: Timestamp,
}

impl ProgramWindow {
    /// Create a program window. `start` must be strictly before `end`.
    pub fn new(start: Timestamp, end: Timestamp) -> Result<Self, ScheduleError> {
        if start >= end {
            return Err(ScheduleError::EmptyWindow { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> Timestamp {
        self.start
    }

    pub fn end(&self) -> Timestamp {
        self.end
    }

    /// Length of the program
    pub fn duration(&self) -> TimeDelta {
        self.end - self.start
    }

    /// Room left between `instant` and the end of the program, zero if past the end
    pub fn remaining_after(&self, instant: Timestamp) -> TimeDelta {
        (self.end - instant).max(TimeDelta::zero())
    }
}

/// An ad slot already committed for the program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExistingPlacement {
    pub start_time: Timestamp,
    pub end_time: Timestamp,
}

impl ExistingPlacement {
    pub fn new(start_time: Timestamp, end_time: Timestamp) -> Self {
        Self {
            start_time,
            end_time,
        }
    }
}

/// A concrete `(ad, start, end)` assignment produced by the scheduler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdPlacement {
    pub ad: Ad,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
}

impl AdPlacement {
    /// Place an ad at `start_time`; the end follows from the ad's duration
    pub fn new(ad: Ad, start_time: Timestamp) -> Self {
        let end_time = start_time + ad.duration();
        Self {
            ad,
            start_time,
            end_time,
        }
    }

    pub fn duration(&self) -> TimeDelta {
        self.end_time - self.start_time
    }

    /// Two placements overlap if neither is completely before the other.
    /// Back-to-back placements (touching at a boundary) do not overlap.
    pub fn overlaps_with(&self, other: &ExistingPlacement) -> bool {
        !(self.end_time <= other.start_time || other.end_time <= self.start_time)
    }
}

/// A gapless run of placements plus the summed ad length
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacementBatch {
    pub placements: Vec<AdPlacement>,
    #[serde(with = "total_seconds")]
    pub total_duration: TimeDelta,
}

impl PlacementBatch {
    pub fn empty() -> Self {
        Self {
            placements: Vec::new(),
            total_duration: TimeDelta::zero(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.placements.is_empty()
    }

    pub fn len(&self) -> usize {
        self.placements.len()
    }

    /// End of the last placement, `None` for an empty batch
    pub fn end_time(&self) -> Option<Timestamp> {
        self.placements.last().map(|p| p.end_time)
    }
}

/// Total duration travels as whole seconds
mod total_seconds {
    use chrono::TimeDelta;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(delta: &TimeDelta, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(delta.num_seconds())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<TimeDelta, D::Error> {
        let secs = i64::deserialize(deserializer)?;
        Ok(TimeDelta::seconds(secs))
    }
}
