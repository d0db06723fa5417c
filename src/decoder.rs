//! Image decoding
//!
//! Turns uploaded bytes into an RGBA8 [`PixelBuffer`] at the image's
//! intrinsic size. No resampling is applied; palette, grey and 16-bit
//! sources are expanded to RGBA8 and nothing else changes.

use image::{ImageError, ImageFormat, ImageReader};
use std::io::Cursor;

use crate::config::DecoderConfig;
use crate::types::PixelBuffer;

/// Failure to turn bytes into pixels.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("image data is empty")]
    Empty,
    #[error("unsupported or unrecognised image format")]
    Unsupported,
    #[error("malformed image data: {0}")]
    Malformed(String),
    #[error("image is {width}x{height}, above the {max_pixels} pixel limit")]
    TooLarge {
        width: u32,
        height: u32,
        max_pixels: u64,
    },
}

/// Decoding capability consumed by the pipeline.
///
/// Implementations are CPU-bound and called from a blocking worker.
pub trait ImageDecoder: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<PixelBuffer, DecodeError>;
}

/// Raster decoder backed by the `image` crate.
///
/// The format is sniffed from magic bytes; file names and content types
/// supplied by the client are ignored.
#[derive(Debug, Clone)]
pub struct RasterDecoder {
    max_pixels: u64,
}

impl RasterDecoder {
    pub fn new(config: &DecoderConfig) -> Self {
        Self {
            max_pixels: config.max_pixels,
        }
    }

    fn reader(bytes: &[u8]) -> Result<ImageReader<Cursor<&[u8]>>, DecodeError> {
        let reader = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| DecodeError::Malformed(e.to_string()))?;
        match reader.format() {
            Some(format) if is_supported(format) => Ok(reader),
            _ => Err(DecodeError::Unsupported),
        }
    }
}

impl Default for RasterDecoder {
    fn default() -> Self {
        Self::new(&DecoderConfig::default())
    }
}

fn is_supported(format: ImageFormat) -> bool {
    matches!(
        format,
        ImageFormat::Png | ImageFormat::Jpeg | ImageFormat::Gif | ImageFormat::Bmp | ImageFormat::WebP
    )
}

impl From<ImageError> for DecodeError {
    fn from(err: ImageError) -> Self {
        match err {
            ImageError::Unsupported(_) => DecodeError::Unsupported,
            other => DecodeError::Malformed(other.to_string()),
        }
    }
}

impl ImageDecoder for RasterDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<PixelBuffer, DecodeError> {
        if bytes.is_empty() {
            return Err(DecodeError::Empty);
        }

        // Header-only pass so oversized images are refused before allocation.
        let (width, height) = Self::reader(bytes)?.into_dimensions()?;
        if u64::from(width) * u64::from(height) > self.max_pixels {
            return Err(DecodeError::TooLarge {
                width,
                height,
                max_pixels: self.max_pixels,
            });
        }

        let rgba = Self::reader(bytes)?.decode()?.into_rgba8();
        let (width, height) = rgba.dimensions();
        PixelBuffer::from_rgba(width, height, rgba.into_raw()).ok_or_else(|| {
            DecodeError::Malformed(format!("decoder produced an invalid {width}x{height} buffer"))
        })
    }
}
