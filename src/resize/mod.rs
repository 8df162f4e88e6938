//! Image resizing with an optional aspect-ratio lock.
//!
//! The ratio is taken once from the loaded image and never recomputed from
//! later edits, so unlocking, editing and locking again snaps back to the
//! proportions of the original picture.

use crate::constants::{
    DEFAULT_JPEG_QUALITY, REDUCED_JPEG_QUALITY, RESIZE_MAX_DIMENSION, RESIZE_MIN_DIMENSION,
};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResizeError {
    #[error("Failed to decode image: {0}")]
    Decode(#[source] image::ImageError),
    #[error("Failed to encode image: {0}")]
    Encode(#[source] image::ImageError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResizeState {
    original_width: u32,
    original_height: u32,
    original_ratio: f64,
    /// Values as typed by the user; clamped only when rendering.
    pub width: i64,
    pub height: i64,
    pub ratio_locked: bool,
    pub quality_reduced: bool,
}

impl ResizeState {
    pub fn on_load(natural_width: u32, natural_height: u32) -> Self {
        let original_ratio = if natural_height == 0 {
            1.0
        } else {
            natural_width as f64 / natural_height as f64
        };

        Self {
            original_width: natural_width,
            original_height: natural_height,
            original_ratio,
            width: natural_width as i64,
            height: natural_height as i64,
            ratio_locked: false,
            quality_reduced: false,
        }
    }

    pub fn original_size(&self) -> (u32, u32) {
        (self.original_width, self.original_height)
    }

    pub fn original_ratio(&self) -> f64 {
        self.original_ratio
    }

    pub fn on_width_edit(&mut self, new_width: i64) {
        self.width = new_width;
        if self.ratio_locked {
            self.height = (new_width as f64 / self.original_ratio).floor() as i64;
        }
    }

    pub fn on_height_edit(&mut self, new_height: i64) {
        self.height = new_height;
        if self.ratio_locked {
            self.width = (new_height as f64 * self.original_ratio).floor() as i64;
        }
    }

    pub fn toggle_ratio_lock(&mut self) {
        self.ratio_locked = !self.ratio_locked;
    }

    pub fn toggle_quality(&mut self) {
        self.quality_reduced = !self.quality_reduced;
    }

    /// Dimensions the render will actually produce.
    pub fn output_size(&self) -> (u32, u32) {
        (clamp_dimension(self.width), clamp_dimension(self.height))
    }
}

pub fn clamp_dimension(value: i64) -> u32 {
    value.clamp(RESIZE_MIN_DIMENSION as i64, RESIZE_MAX_DIMENSION as i64) as u32
}

pub fn quality_factor(quality_reduced: bool) -> f32 {
    if quality_reduced {
        REDUCED_JPEG_QUALITY
    } else {
        DEFAULT_JPEG_QUALITY
    }
}

/// Decodes the picked file and captures its natural size.
pub fn open(bytes: &[u8]) -> Result<(DynamicImage, ResizeState), ResizeError> {
    let image = image::load_from_memory(bytes).map_err(ResizeError::Decode)?;
    let state = ResizeState::on_load(image.width(), image.height());
    Ok((image, state))
}

/// Scales `source` to exactly `width` x `height` (no letterboxing) and
/// encodes it as JPEG.
pub fn render(
    source: &DynamicImage,
    width: i64,
    height: i64,
    quality_reduced: bool,
) -> Result<Vec<u8>, ResizeError> {
    let (width, height) = (clamp_dimension(width), clamp_dimension(height));
    let resized = source.resize_exact(width, height, FilterType::Triangle);

    let quality = (quality_factor(quality_reduced) * 100.0).round().clamp(1.0, 100.0) as u8;
    let mut buf = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buf, quality);
    DynamicImage::ImageRgb8(resized.to_rgb8())
        .write_with_encoder(encoder)
        .map_err(ResizeError::Encode)?;

    tracing::debug!(
        "Rendered {}x{} JPEG at quality {} ({} bytes)",
        width,
        height,
        quality,
        buf.len()
    );
    Ok(buf)
}

/// Milliseconds since the epoch, without an extension.
pub fn download_name(now: SystemTime) -> String {
    now.duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
        .to_string()
}
