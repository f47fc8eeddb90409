//! Tile image codec.
//!
//! Encodes [`PixelBuffer`]s to PNG or JPEG for the disk backends and decodes
//! stored tiles back. Nothing above the cache boundary touches encoded bytes.
//!
//! # Design Decisions
//!
//! - **JPEG drops alpha**: JPEG has no alpha channel, so tiles are flattened
//!   to RGB before encoding and come back fully opaque.
//!
//! - **Format sniffing on decode**: stored bytes are decoded by content, so a
//!   cache directory written as PNG stays readable after switching to JPEG.

use std::io::Cursor;

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageReader};
use serde::{Deserialize, Serialize};

use super::buffer::PixelBuffer;
use crate::error::CodecError;

/// Default JPEG quality (1-100).
pub const DEFAULT_JPEG_QUALITY: u8 = 80;

/// Minimum allowed JPEG quality.
pub const MIN_JPEG_QUALITY: u8 = 1;

/// Maximum allowed JPEG quality.
pub const MAX_JPEG_QUALITY: u8 = 100;

// =============================================================================
// Image Format
// =============================================================================

/// Encoding used for tiles persisted on disk.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
pub enum ImageFormat {
    #[default]
    Png,
    Jpeg,
}

impl ImageFormat {
    /// Lowercase file extension used in the on-disk layout.
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpg",
        }
    }
}

// =============================================================================
// Tile Encoder
// =============================================================================

/// Encoder/decoder for persisted tiles.
///
/// # Example
///
/// ```
/// use geotile_cache::tile::{ImageFormat, PixelBuffer, TileEncoder};
///
/// let encoder = TileEncoder::new(ImageFormat::Png);
/// let tile = PixelBuffer::filled(16, 16, [10, 20, 30, 255]);
///
/// let bytes = encoder.encode(&tile).unwrap();
/// let decoded = encoder.decode(&bytes).unwrap();
/// assert_eq!(decoded, tile);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileEncoder {
    format: ImageFormat,
    quality: u8,
}

impl Default for TileEncoder {
    fn default() -> Self {
        Self::new(ImageFormat::Png)
    }
}

impl TileEncoder {
    /// Create an encoder with the default JPEG quality.
    pub fn new(format: ImageFormat) -> Self {
        Self {
            format,
            quality: DEFAULT_JPEG_QUALITY,
        }
    }

    /// Create an encoder with an explicit JPEG quality (clamped to 1-100).
    pub fn with_quality(format: ImageFormat, quality: u8) -> Self {
        Self {
            format,
            quality: clamp_quality(quality),
        }
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Encode `pixels` in the configured format.
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer is empty or the codec fails.
    pub fn encode(&self, pixels: &PixelBuffer) -> Result<Bytes, CodecError> {
        let image = pixels
            .to_rgba_image()
            .filter(|_| !pixels.is_empty())
            .ok_or_else(|| CodecError::InvalidBuffer {
                message: format!("cannot encode {}x{} buffer", pixels.width(), pixels.height()),
            })?;

        let mut output = Vec::new();
        match self.format {
            ImageFormat::Png => {
                image
                    .write_to(&mut Cursor::new(&mut output), image::ImageFormat::Png)
                    .map_err(|e| CodecError::Encode {
                        message: e.to_string(),
                    })?;
            }
            ImageFormat::Jpeg => {
                let rgb = DynamicImage::ImageRgba8(image).to_rgb8();
                let mut encoder = JpegEncoder::new_with_quality(&mut output, self.quality);
                encoder
                    .encode_image(&rgb)
                    .map_err(|e| CodecError::Encode {
                        message: e.to_string(),
                    })?;
            }
        }

        Ok(Bytes::from(output))
    }

    /// Decode stored tile bytes, sniffing the format from the content.
    pub fn decode(&self, source: &[u8]) -> Result<PixelBuffer, CodecError> {
        let reader = ImageReader::new(Cursor::new(source))
            .with_guessed_format()
            .map_err(|e| CodecError::Decode {
                message: e.to_string(),
            })?;

        let image = reader.decode().map_err(|e| CodecError::Decode {
            message: e.to_string(),
        })?;

        Ok(PixelBuffer::from_rgba_image(image.to_rgba8()))
    }
}

// =============================================================================
// Utility Functions
// =============================================================================

/// Returns `true` if quality is in the valid range (1-100).
#[inline]
pub fn is_valid_quality(quality: u8) -> bool {
    (MIN_JPEG_QUALITY..=MAX_JPEG_QUALITY).contains(&quality)
}

/// Clamp quality to the valid range.
#[inline]
pub fn clamp_quality(quality: u8) -> u8 {
    quality.clamp(MIN_JPEG_QUALITY, MAX_JPEG_QUALITY)
}

// =============================================================================
// Tests
// =============================================================================
