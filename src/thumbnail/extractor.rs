//! Video thumbnail extraction.
//!
//! One request walks a fixed sequence of media lifecycle states:
//!
//! 1. **Loading**: the element loads the proxied URL.
//! 2. **MetadataReady**: duration and size are known; the raster size is fixed.
//! 3. **Seeking**: on the first `CanPlay` a single seek is issued, clamped to
//!    stay before the end of the media.
//! 4. **Seeked**: a seek that lands on 0 for a non-trivial offset is retried
//!    once, after a short delay, with a small offset. Otherwise the frame is
//!    captured.
//! 5. **Captured**: the frame is scaled, JPEG-encoded and returned as a data URI.
//!
//! Load errors fail the request immediately. When the deadline passes without a
//! capture, whatever frame the element holds is captured as a last resort.
//! Duplicate or out-of-order events are ignored.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, warn};

use crate::config::ExtractorConfig;
use crate::core::time::{self, MediaTime};
use crate::media::element::{MediaBackend, MediaElement, MediaEvent};
use crate::media::url::proxied_url;
use crate::thumbnail::raster;

/// Error type for thumbnail extraction
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ThumbnailError {
    #[error("Media failed to load: {0}")]
    Load(String),
    #[error("No frame captured within {0:?}")]
    Timeout(Duration),
    #[error("Frame capture failed: {0}")]
    CanvasDraw(String),
}

/// Lifecycle position of one extraction request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Loading,
    MetadataReady,
    Seeking,
    RetryPending,
    Captured,
}

/// What the driver should do after an event
#[derive(Debug, Clone, Copy, PartialEq)]
enum Step {
    Wait,
    Seek(MediaTime),
    RetryAfterDelay(MediaTime),
    Capture,
}

/// Per-request state machine, independent of any media element
#[derive(Debug)]
struct ExtractionRequest {
    phase: Phase,
    offset: MediaTime,
    duration: MediaTime,
    raster_size: Option<(u32, u32)>,
    can_play: bool,
    retried: bool,
}

impl ExtractionRequest {
    fn new(offset: MediaTime) -> Self {
        Self {
            phase: Phase::Loading,
            offset,
            duration: 0.0,
            raster_size: None,
            can_play: false,
            retried: false,
        }
    }

    fn on_event(
        &mut self,
        event: MediaEvent,
        config: &ExtractorConfig,
    ) -> Result<Step, ThumbnailError> {
        match event {
            MediaEvent::Error(message) => Err(ThumbnailError::Load(message)),

            MediaEvent::LoadedMetadata {
                duration,
                width,
                height,
            } => {
                if self.phase != Phase::Loading {
                    debug!(phase = ?self.phase, "Ignoring repeated metadata");
                    return Ok(Step::Wait);
                }
                self.duration = duration;
                self.raster_size =
                    raster::fit_within(width, height, config.max_width, config.max_height);
                if self.raster_size.is_none() {
                    return Err(ThumbnailError::CanvasDraw(format!(
                        "media reports no video size ({}x{})",
                        width, height
                    )));
                }
                self.phase = Phase::MetadataReady;
                debug!(duration, width, height, size = ?self.raster_size, "Metadata ready");

                // Playback may have been signalled before metadata arrived
                if self.can_play {
                    return Ok(self.start_seek(config));
                }
                Ok(Step::Wait)
            }

            MediaEvent::CanPlay => {
                if self.can_play {
                    return Ok(Step::Wait);
                }
                self.can_play = true;
                if self.phase == Phase::MetadataReady {
                    return Ok(self.start_seek(config));
                }
                Ok(Step::Wait)
            }

            MediaEvent::Seeked { current_time } => {
                if self.phase != Phase::Seeking {
                    debug!(phase = ?self.phase, current_time, "Ignoring unexpected seek completion");
                    return Ok(Step::Wait);
                }

                if current_time == 0.0 && self.offset > config.seek_retry_threshold && !self.retried
                {
                    self.retried = true;
                    self.phase = Phase::RetryPending;
                    let position = clamp_seek(config.seek_retry_offset, self.duration, config.end_margin);
                    debug!(requested = self.offset, position, "Seek landed on 0, retrying");
                    return Ok(Step::RetryAfterDelay(position));
                }

                self.phase = Phase::Captured;
                Ok(Step::Capture)
            }
        }
    }

    fn start_seek(&mut self, config: &ExtractorConfig) -> Step {
        self.phase = Phase::Seeking;
        Step::Seek(clamp_seek(self.offset, self.duration, config.end_margin))
    }

    /// Retry delay elapsed: the retry seek is now in flight
    fn retry_started(&mut self) {
        self.phase = Phase::Seeking;
    }
}

/// Keep a seek `end_margin` before the end of the media. Unknown durations
/// (zero, infinite) leave the position alone.
fn clamp_seek(position: MediaTime, duration: MediaTime, end_margin: MediaTime) -> MediaTime {
    let position = position.max(0.0);
    if duration.is_finite() && duration > 0.0 {
        position.min(duration - end_margin).max(0.0)
    } else {
        position
    }
}

/// Produces still images from video resources through a media backend
#[derive(Clone)]
pub struct ThumbnailExtractor {
    backend: Arc<dyn MediaBackend>,
    config: ExtractorConfig,
}

impl ThumbnailExtractor {
    pub fn new(backend: Arc<dyn MediaBackend>, config: ExtractorConfig) -> Self {
        Self { backend, config }
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Extract the frame at `time_offset` from `video_url` as a JPEG data URI.
    ///
    /// A fresh media element is used per call and released on every exit path.
    pub async fn extract(
        &self,
        video_url: &str,
        time_offset: Duration,
    ) -> Result<String, ThumbnailError> {
        let src = proxied_url(&self.config.proxy_base, video_url);
        let mut element = self.backend.create_element();

        let result = self.drive(element.as_mut(), &src, time_offset).await;
        element.abort();

        match &result {
            Ok(_) => debug!(video_url, ?time_offset, "Thumbnail extracted"),
            Err(e) => warn!(video_url, ?time_offset, error = %e, "Thumbnail extraction failed"),
        }
        result
    }

    async fn drive(
        &self,
        element: &mut dyn MediaElement,
        src: &str,
        time_offset: Duration,
    ) -> Result<String, ThumbnailError> {
        let mut events = element.load(src);
        let mut request = ExtractionRequest::new(time::to_media_seconds(time_offset));
        let deadline = Instant::now() + self.config.timeout;
        let mut pending_retry: Option<(Instant, MediaTime)> = None;

        loop {
            let retry_at = pending_retry.map(|(at, _)| at).unwrap_or(deadline);

            tokio::select! {
                biased;

                event = events.recv() => {
                    let Some(event) = event else {
                        return Err(ThumbnailError::Load(
                            "media element closed before a frame was captured".to_string(),
                        ));
                    };
                    match request.on_event(event, &self.config)? {
                        Step::Wait => {}
                        Step::Seek(position) => {
                            debug!(position, "Seeking");
                            element.seek(position);
                        }
                        Step::RetryAfterDelay(position) => {
                            pending_retry = Some((Instant::now() + self.config.seek_retry_delay, position));
                        }
                        Step::Capture => return self.capture(element, request.raster_size),
                    }
                }

                _ = sleep_until(retry_at), if pending_retry.is_some() => {
                    if let Some((_, position)) = pending_retry.take() {
                        request.retry_started();
                        element.seek(position);
                    }
                }

                _ = sleep_until(deadline) => {
                    return self.capture_on_timeout(element, request.raster_size, &mut events);
                }
            }
        }
    }

    fn capture(
        &self,
        element: &mut dyn MediaElement,
        raster_size: Option<(u32, u32)>,
    ) -> Result<String, ThumbnailError> {
        let (width, height) = raster_size
            .ok_or_else(|| ThumbnailError::CanvasDraw("raster size unknown".to_string()))?;
        let frame = element
            .capture(width, height)
            .map_err(|e| ThumbnailError::CanvasDraw(e.to_string()))?;
        raster::encode_data_uri(&frame, self.config.jpeg_quality)
            .map_err(|e| ThumbnailError::CanvasDraw(e.to_string()))
    }

    /// Last resort once the deadline passes: capture whatever frame is showing
    fn capture_on_timeout(
        &self,
        element: &mut dyn MediaElement,
        raster_size: Option<(u32, u32)>,
        events: &mut mpsc::UnboundedReceiver<MediaEvent>,
    ) -> Result<String, ThumbnailError> {
        events.close();

        let (width, height) = element.video_size();
        if width == 0 || height == 0 {
            return Err(ThumbnailError::Timeout(self.config.timeout));
        }

        let size = raster_size.or_else(|| {
            raster::fit_within(width, height, self.config.max_width, self.config.max_height)
        });
        match self.capture(element, size) {
            Ok(encoded) => {
                warn!(
                    position = element.current_time(),
                    "Deadline passed, using best-effort frame"
                );
                Ok(encoded)
            }
            Err(e) => {
                debug!(error = %e, "Best-effort capture failed");
                Err(ThumbnailError::Timeout(self.config.timeout))
            }
        }
    }
}
