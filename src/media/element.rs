//! Media element abstraction.
//!
//! A media element loads one resource, reports lifecycle events on a channel and
//! answers seek/capture requests. The thumbnail extractor drives it as a state
//! machine; backends decide how frames are actually produced.

use image::RgbaImage;
use tokio::sync::mpsc;

use crate::core::time::MediaTime;

/// Lifecycle signals emitted by a media element, in the order a healthy load
/// produces them. Backends may repeat `CanPlay`.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    /// Duration and intrinsic video size are known
    LoadedMetadata {
        duration: MediaTime,
        width: u32,
        height: u32,
    },
    /// Enough data is buffered to start playback
    CanPlay,
    /// A requested seek has finished
    Seeked { current_time: MediaTime },
    /// The resource could not be loaded or decoded
    Error(String),
}

/// Error type for media element operations
#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("FFmpeg error: {0}")]
    FFmpeg(#[from] ffmpeg_next::Error),
    #[error("No video stream found")]
    NoVideoStream,
    #[error("No frame available to capture")]
    NoFrame,
    #[error("Invalid capture size {width}x{height}")]
    InvalidSize { width: u32, height: u32 },
    #[error("Frame buffer does not match {width}x{height}")]
    BadFrameBuffer { width: u32, height: u32 },
}

/// One loadable media resource.
///
/// `load` is called once per element; the returned receiver yields events until
/// the element is aborted or dropped.
pub trait MediaElement: Send {
    /// Start loading `src` and return the event stream
    fn load(&mut self, src: &str) -> mpsc::UnboundedReceiver<MediaEvent>;

    /// Request a seek; completion is reported as `MediaEvent::Seeked`
    fn seek(&mut self, position: MediaTime);

    /// Playback position of the frame currently held
    fn current_time(&self) -> MediaTime;

    /// Intrinsic video size, `(0, 0)` until metadata is known
    fn video_size(&self) -> (u32, u32);

    /// Rasterize the current frame scaled to `width` x `height`
    fn capture(&mut self, width: u32, height: u32) -> Result<RgbaImage, MediaError>;

    /// Stop loading and release the resource
    fn abort(&mut self);
}

/// Creates a fresh media element per extraction request
pub trait MediaBackend: Send + Sync {
    fn create_element(&self) -> Box<dyn MediaElement>;
}
