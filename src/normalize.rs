//! Shrinks uploads to a bounded JPEG before they go anywhere else.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageReader};
use tracing::debug;

use crate::error::CaptionError;

/// Fits `width`x`height` inside a `max_side` square, never scaling up.
///
/// The shorter side is rounded to the nearest pixel and never drops below 1.
pub fn bounded_dimensions(width: u32, height: u32, max_side: u32) -> (u32, u32) {
    let max_side = max_side.max(1);
    let longer = width.max(height);
    if longer <= max_side {
        return (width, height);
    }
    let ratio = f64::from(max_side) / f64::from(longer);
    let scale = |side: u32| -> u32 {
        if side == longer {
            max_side
        } else {
            ((f64::from(side) * ratio).round() as u32).max(1)
        }
    };
    (scale(width), scale(height))
}

/// Decodes `bytes`, drops alpha, bounds the longer side to `max_side` and
/// re-encodes as JPEG at `quality` (clamped to 1-100).
pub fn normalize(bytes: &[u8], max_side: u32, quality: u8) -> Result<Vec<u8>, CaptionError> {
    if bytes.len() < 4 {
        debug!("Image is too short");
        return Err(CaptionError::Decode("image is too short".to_string()));
    }

    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|err| {
            debug!("Failed to guess image format: {}", err);
            CaptionError::Decode(err.to_string())
        })?;
    let decoded = reader.decode().map_err(|err| {
        debug!("Failed to decode image: {}", err);
        CaptionError::Decode(err.to_string())
    })?;

    let rgb = DynamicImage::ImageRgb8(decoded.to_rgb8());
    let (width, height) = bounded_dimensions(rgb.width(), rgb.height(), max_side);
    let resized = if (width, height) == (rgb.width(), rgb.height()) {
        rgb
    } else {
        debug!(
            "Resizing {}x{} to {}x{}",
            rgb.width(),
            rgb.height(),
            width,
            height
        );
        rgb.resize_exact(width, height, FilterType::Lanczos3)
    };

    let mut output = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut output, quality.clamp(1, 100));
    resized
        .write_with_encoder(encoder)
        .map_err(|err| CaptionError::InternalServerError(err.to_string()))?;
    Ok(output)
}
