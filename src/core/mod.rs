//! Core types for ad scheduling.
//!
//! This module provides the ad entity, program windows, placements and the time
//! representation shared with the media layer.

pub mod ad;
pub mod placement;
pub mod time;

// Re-export core data structures for easier access.
pub use ad::{Ad, AdId, CategoryId, DEFAULT_AD_DURATION_SECONDS};
pub use placement::{AdPlacement, ExistingPlacement, PlacementBatch, ProgramWindow};
pub use time::{MediaTime, Timestamp};
