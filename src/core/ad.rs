//! Ad entity as delivered by the backend.

use serde::{Deserialize, Deserializer, Serialize};

use crate::core::time;

/// Unique identifier for an ad
pub type AdId = u64;

/// Category foreign key
pub type CategoryId = u64;

/// Length assumed for an ad whose record carries no duration
pub const DEFAULT_AD_DURATION_SECONDS: u32 = 30;

fn default_duration() -> u32 {
    DEFAULT_AD_DURATION_SECONDS
}

/// Null and zero durations read as the default length
fn positive_duration<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    let secs = Option::<u32>::deserialize(deserializer)?;
    Ok(secs.filter(|s| *s > 0).unwrap_or(DEFAULT_AD_DURATION_SECONDS))
}

/// A purchasable/playable advertisement.
///
/// Scheduling only reads `duration_seconds`; everything else is carried through
/// to the placements untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ad {
    pub id: AdId,
    pub title: String,
    #[serde(default = "default_duration", deserialize_with = "positive_duration")]
    pub duration_seconds: u32,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
}

impl Ad {
    /// Create an ad with an explicit duration
    pub fn new(id: AdId, title: impl Into<String>, duration_seconds: u32) -> Self {
        Self {
            id,
            title: title.into(),
            duration_seconds,
            category_id: None,
        }
    }

    /// Set the category
    pub fn with_category(mut self, category_id: CategoryId) -> Self {
        self.category_id = Some(category_id);
        self
    }

    /// Playback length on the schedule
    pub fn duration(&self) -> chrono::TimeDelta {
        time::seconds(self.duration_seconds)
    }
}
