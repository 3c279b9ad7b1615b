//! Video thumbnails: frame extraction, caching and fallback resolution.

pub mod cache;
pub mod extractor;
pub mod raster;
pub mod service;

pub use cache::ThumbnailCache;
pub use extractor::{ThumbnailError, ThumbnailExtractor};
pub use raster::{encode_data_uri, fit_within, THUMBNAIL_MIME};
pub use service::{Thumbnail, ThumbnailService};
