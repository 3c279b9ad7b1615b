//! Thumbnail cache keyed by (video URL, time offset).
//!
//! Entries live as long as the cache object. There is no eviction or TTL;
//! `clear()` is the only way to release memory.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::RwLock;

/// Cache key: the literal URL string and the requested offset.
/// URLs are not normalized, so `a.mp4?x=1&y=2` and `a.mp4?y=2&x=1` are distinct.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    video_url: String,
    time_offset: Duration,
}

impl CacheKey {
    fn new(video_url: &str, time_offset: Duration) -> Self {
        Self {
            video_url: video_url.to_string(),
            time_offset,
        }
    }
}

/// Encoded thumbnails shared by every extraction request
#[derive(Debug, Default)]
pub struct ThumbnailCache {
    entries: RwLock<HashMap<CacheKey, String>>,
}

impl ThumbnailCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a cached thumbnail
    pub async fn get(&self, video_url: &str, time_offset: Duration) -> Option<String> {
        let entries = self.entries.read().await;
        entries.get(&CacheKey::new(video_url, time_offset)).cloned()
    }

    /// Store a thumbnail, replacing any previous value for the key
    pub async fn put(&self, video_url: &str, time_offset: Duration, encoded: String) {
        let mut entries = self.entries.write().await;
        entries.insert(CacheKey::new(video_url, time_offset), encoded);
    }

    /// Drop all cached thumbnails
    pub async fn clear(&self) {
        let mut entries = self.entries.write().await;
        entries.clear();
    }

    /// Get the number of cached thumbnails
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Check if the cache is empty
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
