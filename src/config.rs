//! Runtime configuration.
//!
//! Every threshold used by the scheduler and the thumbnail extractor lives here
//! with its default. `from_env()` reads `ADCAST_*` overrides; invalid values fall
//! back to the default.

use std::env;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_SLOT_GAP_SECS: u64 = 30;
const DEFAULT_TRAILING_BUFFER_SECS: u64 = 30;

const DEFAULT_PROXY_BASE: &str = "http://localhost:8080";
const DEFAULT_MAX_WIDTH: u32 = 320;
const DEFAULT_MAX_HEIGHT: u32 = 180;
const DEFAULT_TIMEOUT_MS: u64 = 8_000;
const DEFAULT_SEEK_RETRY_THRESHOLD_SECS: f64 = 0.5;
const DEFAULT_SEEK_RETRY_OFFSET_SECS: f64 = 0.5;
const DEFAULT_SEEK_RETRY_DELAY_MS: u64 = 100;
const DEFAULT_END_MARGIN_SECS: f64 = 0.1;
const DEFAULT_JPEG_QUALITY: u8 = 80;
const DEFAULT_PLACEHOLDER_URL: &str = "/assets/video-placeholder.png";

const DEFAULT_BACKEND_URL: &str = "http://localhost:3000/api";

/// Scheduler thresholds
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerConfig {
    /// Space left between the previous ad (or program start) and a suggested slot
    pub slot_gap: Duration,
    /// Space reserved before the program end when ads are already placed
    pub trailing_buffer: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            slot_gap: Duration::from_secs(DEFAULT_SLOT_GAP_SECS),
            trailing_buffer: Duration::from_secs(DEFAULT_TRAILING_BUFFER_SECS),
        }
    }
}

impl SchedulerConfig {
    pub fn from_env() -> Self {
        Self {
            slot_gap: Duration::from_secs(env_or("ADCAST_SLOT_GAP_SECS", DEFAULT_SLOT_GAP_SECS)),
            // Zero lets suggestions run up to the program end
            trailing_buffer: Duration::from_secs(env_or_zero(
                "ADCAST_TRAILING_BUFFER_SECS",
                DEFAULT_TRAILING_BUFFER_SECS,
            )),
        }
    }
}

/// Thumbnail extraction thresholds
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractorConfig {
    /// Base of the same-origin media proxy (`{base}/proxy-video?url=...`)
    pub proxy_base: String,
    pub max_width: u32,
    pub max_height: u32,
    /// Wall-clock budget for one extraction
    pub timeout: Duration,
    /// A seek landing on 0 for an offset above this is treated as failed
    pub seek_retry_threshold: f64,
    /// Offset used for the single retry seek
    pub seek_retry_offset: f64,
    pub seek_retry_delay: Duration,
    /// Seeks stay this far before the end of the media
    pub end_margin: f64,
    pub jpeg_quality: u8,
    /// Image shown when no thumbnail can be produced
    pub placeholder_url: String,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            proxy_base: DEFAULT_PROXY_BASE.to_string(),
            max_width: DEFAULT_MAX_WIDTH,
            max_height: DEFAULT_MAX_HEIGHT,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            seek_retry_threshold: DEFAULT_SEEK_RETRY_THRESHOLD_SECS,
            seek_retry_offset: DEFAULT_SEEK_RETRY_OFFSET_SECS,
            seek_retry_delay: Duration::from_millis(DEFAULT_SEEK_RETRY_DELAY_MS),
            end_margin: DEFAULT_END_MARGIN_SECS,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            placeholder_url: DEFAULT_PLACEHOLDER_URL.to_string(),
        }
    }
}

impl ExtractorConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            proxy_base: env::var("ADCAST_PROXY_BASE")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or(defaults.proxy_base),
            max_width: env_or("ADCAST_THUMBNAIL_MAX_WIDTH", DEFAULT_MAX_WIDTH),
            max_height: env_or("ADCAST_THUMBNAIL_MAX_HEIGHT", DEFAULT_MAX_HEIGHT),
            timeout: Duration::from_millis(env_or("ADCAST_THUMBNAIL_TIMEOUT_MS", DEFAULT_TIMEOUT_MS)),
            seek_retry_threshold: env_or(
                "ADCAST_SEEK_RETRY_THRESHOLD_SECS",
                DEFAULT_SEEK_RETRY_THRESHOLD_SECS,
            ),
            seek_retry_offset: env_or("ADCAST_SEEK_RETRY_OFFSET_SECS", DEFAULT_SEEK_RETRY_OFFSET_SECS),
            seek_retry_delay: Duration::from_millis(env_or(
                "ADCAST_SEEK_RETRY_DELAY_MS",
                DEFAULT_SEEK_RETRY_DELAY_MS,
            )),
            end_margin: env_or("ADCAST_END_MARGIN_SECS", DEFAULT_END_MARGIN_SECS),
            jpeg_quality: env_or("ADCAST_JPEG_QUALITY", DEFAULT_JPEG_QUALITY).clamp(1, 100),
            placeholder_url: env::var("ADCAST_PLACEHOLDER_URL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or(defaults.placeholder_url),
        }
    }
}

/// Backend REST collaborator settings
#[derive(Debug, Clone, PartialEq)]
pub struct BackendConfig {
    pub base_url: String,
    /// Bearer token issued by the identity provider
    pub access_token: Option<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BACKEND_URL.to_string(),
            access_token: None,
        }
    }
}

impl BackendConfig {
    pub fn from_env() -> Self {
        Self {
            base_url: env::var("ADCAST_BACKEND_URL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string()),
            access_token: env::var("ADCAST_ACCESS_TOKEN").ok().filter(|s| !s.is_empty()),
        }
    }
}

/// Parse a positive numeric env var, falling back to `default`
fn env_or<T>(key: &str, default: T) -> T
where
    T: FromStr + PartialOrd + Default,
{
    parse_env(key)
        .filter(|v| *v > T::default())
        .unwrap_or(default)
}

/// Like `env_or`, but zero is accepted
fn env_or_zero<T>(key: &str, default: T) -> T
where
    T: FromStr + PartialOrd + Default,
{
    parse_env(key)
        .filter(|v| *v >= T::default())
        .unwrap_or(default)
}

fn parse_env<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.trim().parse().ok())
}
