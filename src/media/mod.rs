//! Media access for thumbnail extraction.
//! The FFmpeg backend keeps all decoding on per-element worker threads.

pub mod decoder;
pub mod element;
pub mod url;

pub use decoder::{FfmpegBackend, FfmpegElement, VideoFrame};
pub use element::{MediaBackend, MediaElement, MediaError, MediaEvent};
pub use url::{is_media_url, proxied_url};

#[cfg(test)]
pub(crate) mod fake;
