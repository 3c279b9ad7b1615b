//! Caller-facing thumbnail resolution.
//!
//! A supplied thumbnail URL wins when it actually serves an image. Otherwise a
//! frame is extracted from the video (cached per URL and offset), and as a last
//! resort the placeholder image is returned.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::media::url::is_media_url;
use crate::thumbnail::cache::ThumbnailCache;
use crate::thumbnail::extractor::{ThumbnailError, ThumbnailExtractor};

/// Budget for checking that a supplied thumbnail URL loads
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Where a resolved thumbnail came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Thumbnail {
    /// The caller-supplied image URL
    Remote(String),
    /// A `data:image/jpeg;base64,...` frame taken from the video
    Extracted(String),
    /// The configured placeholder image
    Placeholder(String),
}

impl Thumbnail {
    /// Value suitable for an `<img src>`
    pub fn src(&self) -> &str {
        match self {
            Thumbnail::Remote(s) | Thumbnail::Extracted(s) | Thumbnail::Placeholder(s) => s,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, Thumbnail::Placeholder(_))
    }
}

/// Extractor plus cache plus fallback policy
pub struct ThumbnailService {
    extractor: ThumbnailExtractor,
    cache: Arc<ThumbnailCache>,
    http: reqwest::Client,
    placeholder_url: String,
}

impl ThumbnailService {
    pub fn new(extractor: ThumbnailExtractor, cache: Arc<ThumbnailCache>) -> Self {
        let placeholder_url = extractor.config().placeholder_url.clone();
        let http = reqwest::Client::builder()
            .timeout(PROBE_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            extractor,
            cache,
            http,
            placeholder_url,
        }
    }

    pub fn cache(&self) -> &Arc<ThumbnailCache> {
        &self.cache
    }

    /// Resolve the best available thumbnail for a video. Never fails.
    pub async fn get_thumbnail(
        &self,
        video_url: &str,
        thumbnail_url: Option<&str>,
        time_offset: Duration,
    ) -> Thumbnail {
        if let Some(url) = thumbnail_url.filter(|u| !u.is_empty()) {
            if self.image_loads(url).await {
                return Thumbnail::Remote(url.to_string());
            }
            info!(url, "Supplied thumbnail did not load, falling back to extraction");
        }

        if is_media_url(video_url) {
            if let Ok(encoded) = self.extract(video_url, time_offset).await {
                return Thumbnail::Extracted(encoded);
            }
        } else {
            debug!(video_url, "Not a media URL, skipping extraction");
        }

        Thumbnail::Placeholder(self.placeholder_url.clone())
    }

    /// Extract a frame, consulting the cache first. Only successes are cached.
    pub async fn extract(
        &self,
        video_url: &str,
        time_offset: Duration,
    ) -> Result<String, ThumbnailError> {
        if let Some(cached) = self.cache.get(video_url, time_offset).await {
            debug!(video_url, ?time_offset, "Thumbnail cache hit");
            return Ok(cached);
        }

        let encoded = self.extractor.extract(video_url, time_offset).await?;
        self.cache.put(video_url, time_offset, encoded.clone()).await;
        Ok(encoded)
    }

    pub async fn clear_cache(&self) {
        self.cache.clear().await;
    }

    /// GET the URL and check it serves an image
    async fn image_loads(&self, url: &str) -> bool {
        let response = match self.http.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                debug!(url, error = %e, "Thumbnail probe failed");
                return false;
            }
        };

        if !response.status().is_success() {
            debug!(url, status = %response.status(), "Thumbnail probe rejected");
            return false;
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_ascii_lowercase());

        match content_type {
            Some(content_type) => content_type.starts_with("image/"),
            // No header: sniff the body
            None => match response.bytes().await {
                Ok(bytes) => image::guess_format(&bytes).is_ok(),
                Err(_) => false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExtractorConfig;
    use crate::media::fake::{FakeBackend, Script};
    use crate::media::MediaEvent;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const VIDEO: &str = "https://cdn.example.com/shows/ep1.mp4";

    fn service(backend: &FakeBackend) -> ThumbnailService {
        let extractor =
            ThumbnailExtractor::new(Arc::new(backend.clone()), ExtractorConfig::default());
        ThumbnailService::new(extractor, Arc::new(ThumbnailCache::new()))
    }

    /// Serve one canned HTTP response and return its URL
    async fn serve_once(content_type: Option<&'static str>, body: &'static [u8]) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;

            let mut head = format!(
                "HTTP/1.1 200 OK\r\ncontent-length: {}\r\nconnection: close\r\n",
                body.len()
            );
            if let Some(content_type) = content_type {
                head.push_str(&format!("content-type: {}\r\n", content_type));
            }
            head.push_str("\r\n");

            socket.write_all(head.as_bytes()).await.unwrap();
            socket.write_all(body).await.unwrap();
            socket.shutdown().await.unwrap();
        });

        format!("http://{}/thumb.jpg", addr)
    }

    #[test]
    fn test_thumbnail_src() {
        assert_eq!(Thumbnail::Remote("https://x/t.jpg".into()).src(), "https://x/t.jpg");
        assert!(Thumbnail::Placeholder("/p.png".into()).is_placeholder());
        assert!(!Thumbnail::Extracted("data:".into()).is_placeholder());
    }

    #[tokio::test]
    async fn test_extract_uses_cache() {
        let backend = FakeBackend::new(Script::healthy());
        let service = service(&backend);

        let first = service.extract(VIDEO, Duration::from_secs(2)).await.unwrap();
        let second = service.extract(VIDEO, Duration::from_secs(2)).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(backend.created(), 1);
        assert_eq!(service.cache().len().await, 1);

        service.extract(VIDEO, Duration::from_secs(3)).await.unwrap();
        assert_eq!(backend.created(), 2);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let backend = FakeBackend::new(
            Script::healthy().with_events(vec![MediaEvent::Error("HTTP 500".into())]),
        );
        let service = service(&backend);

        assert!(service.extract(VIDEO, Duration::ZERO).await.is_err());
        assert!(service.extract(VIDEO, Duration::ZERO).await.is_err());

        assert_eq!(backend.created(), 2);
        assert!(service.cache().is_empty().await);
    }

    #[tokio::test]
    async fn test_clear_cache_forces_extraction() {
        let backend = FakeBackend::new(Script::healthy());
        let service = service(&backend);

        service.extract(VIDEO, Duration::ZERO).await.unwrap();
        service.clear_cache().await;
        service.extract(VIDEO, Duration::ZERO).await.unwrap();

        assert_eq!(backend.created(), 2);
    }

    #[tokio::test]
    async fn test_non_media_url_gets_placeholder() {
        let backend = FakeBackend::new(Script::healthy());
        let service = service(&backend);

        let thumbnail = service
            .get_thumbnail("https://example.com/page.html", None, Duration::ZERO)
            .await;

        assert_eq!(
            thumbnail,
            Thumbnail::Placeholder("/assets/video-placeholder.png".to_string())
        );
        assert_eq!(backend.created(), 0);
    }

    #[tokio::test]
    async fn test_failed_extraction_gets_placeholder() {
        let backend = FakeBackend::new(
            Script::healthy().with_events(vec![MediaEvent::Error("decode".into())]),
        );
        let service = service(&backend);

        let thumbnail = service.get_thumbnail(VIDEO, None, Duration::ZERO).await;

        assert!(thumbnail.is_placeholder());
    }

    #[tokio::test]
    async fn test_unreachable_thumbnail_falls_back_to_extraction() {
        let backend = FakeBackend::new(Script::healthy());
        let service = service(&backend);

        let thumbnail = service
            .get_thumbnail(VIDEO, Some("http://127.0.0.1:1/thumb.jpg"), Duration::from_secs(1))
            .await;

        assert!(matches!(thumbnail, Thumbnail::Extracted(ref s) if s.starts_with("data:image/jpeg")));
    }

    #[tokio::test]
    async fn test_loading_thumbnail_is_used() {
        let backend = FakeBackend::new(Script::healthy());
        let service = service(&backend);
        let url = serve_once(Some("image/jpeg"), &[0xFF, 0xD8, 0xFF, 0xE0]).await;

        let thumbnail = service.get_thumbnail(VIDEO, Some(&url), Duration::ZERO).await;

        assert_eq!(thumbnail, Thumbnail::Remote(url));
        assert_eq!(backend.created(), 0);
    }

    #[tokio::test]
    async fn test_non_image_thumbnail_is_rejected() {
        let backend = FakeBackend::new(Script::healthy());
        let service = service(&backend);
        let url = serve_once(Some("text/html"), b"<html></html>").await;

        let thumbnail = service.get_thumbnail(VIDEO, Some(&url), Duration::ZERO).await;

        assert!(matches!(thumbnail, Thumbnail::Extracted(_)));
    }

    #[tokio::test]
    async fn test_thumbnail_without_content_type_is_sniffed() {
        let backend = FakeBackend::new(Script::healthy());
        let service = service(&backend);
        let png = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";
        let url = serve_once(None, png).await;

        let thumbnail = service.get_thumbnail(VIDEO, Some(&url), Duration::ZERO).await;

        assert_eq!(thumbnail, Thumbnail::Remote(url));
    }
}
