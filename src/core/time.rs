//! Time representation shared by the scheduler and the media layer.
//!
//! Schedule instants are wall-clock `DateTime<Utc>` values; ad lengths are whole
//! seconds. Media positions are fractional seconds (f64), matching what a media
//! element reports for `duration` and `current_time`.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Timelike, Utc};

/// A wall-clock instant on a program's timeline
pub type Timestamp = DateTime<Utc>;

/// Position inside a media resource, in seconds
pub type MediaTime = f64;

/// Time constants for conversions
pub mod constants {
    pub const NANOS_PER_SECOND: i128 = 1_000_000_000;
    pub const MILLIS_PER_SECOND: i64 = 1_000;
}

/// Whole-second span on the schedule
#[inline]
pub fn seconds(secs: u32) -> TimeDelta {
    TimeDelta::seconds(secs as i64)
}

/// Convert a std duration (config values) to a schedule span
#[inline]
pub fn to_delta(duration: Duration) -> TimeDelta {
    TimeDelta::from_std(duration).unwrap_or(TimeDelta::MAX)
}

/// Convert a media position to a std duration; negative and NaN positions clamp to zero
#[inline]
pub fn from_media_seconds(seconds: MediaTime) -> Duration {
    if seconds.is_finite() && seconds > 0.0 {
        Duration::from_secs_f64(seconds)
    } else {
        Duration::ZERO
    }
}

/// Convert a std duration to a media position
#[inline]
pub fn to_media_seconds(duration: Duration) -> MediaTime {
    duration.as_secs_f64()
}

/// Convert an FFmpeg timestamp in a stream timebase to media seconds.
/// FFmpeg uses rational timebases: pts * (num/den) = seconds
pub fn pts_to_media_seconds(pts: i64, num: i32, den: i32) -> MediaTime {
    if den == 0 {
        return 0.0;
    }
    // i128 keeps pts * num * 1e9 from overflowing
    let nanos = (pts as i128 * num as i128 * constants::NANOS_PER_SECOND) / den as i128;
    nanos as f64 / constants::NANOS_PER_SECOND as f64
}

/// Format an instant as HH:MM:SS (UTC)
pub fn format_clock(ts: Timestamp) -> String {
    format!("{:02}:{:02}:{:02}", ts.hour(), ts.minute(), ts.second())
}

/// Format a span as HH:MM:SS.mmm
pub fn format_span(delta: TimeDelta) -> String {
    let total_millis = delta.num_milliseconds().max(0);
    let millis = total_millis % constants::MILLIS_PER_SECOND;
    let total_seconds = total_millis / constants::MILLIS_PER_SECOND;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, secs, millis)
}
