//! Raster sizing and still-image encoding for thumbnails.

use std::io::Cursor;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, RgbaImage};

/// MIME type of every extracted thumbnail
pub const THUMBNAIL_MIME: &str = "image/jpeg";

/// Size of the raster surface for a `width` x `height` video.
///
/// The aspect ratio is preserved and the result fills the `max_width` x
/// `max_height` box along whichever dimension is limiting. Returns `None` when
/// the video reports no size.
pub fn fit_within(width: u32, height: u32, max_width: u32, max_height: u32) -> Option<(u32, u32)> {
    if width == 0 || height == 0 || max_width == 0 || max_height == 0 {
        return None;
    }

    let aspect = width as f64 / height as f64;
    let box_aspect = max_width as f64 / max_height as f64;

    let size = if aspect > box_aspect {
        // Wider than the box: width is limiting
        (max_width, (max_width as f64 / aspect).round() as u32)
    } else {
        (((max_height as f64) * aspect).round() as u32, max_height)
    };

    Some((size.0.max(1), size.1.max(1)))
}

/// Encode a captured frame as a `data:image/jpeg;base64,...` URI.
/// `quality` is the JPEG quality (1-100).
pub fn encode_data_uri(frame: &RgbaImage, quality: u8) -> Result<String, image::ImageError> {
    // JPEG carries no alpha channel
    let rgb = DynamicImage::ImageRgba8(frame.clone()).to_rgb8();

    let mut output = Cursor::new(Vec::new());
    let mut encoder = JpegEncoder::new_with_quality(&mut output, quality.clamp(1, 100));
    encoder.encode_image(&rgb)?;

    Ok(format!(
        "data:{};base64,{}",
        THUMBNAIL_MIME,
        STANDARD.encode(output.into_inner())
    ))
}
