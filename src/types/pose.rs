//! Pixel buffers and pose estimation output.

use serde::{Deserialize, Serialize};

/// Bytes per pixel in a [`PixelBuffer`] (RGBA8).
pub const CHANNELS: usize = 4;

/// Decoded raster image, RGBA8, row-major, at the source's intrinsic size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Wrap raw RGBA8 data.
    ///
    /// Returns `None` when `data` does not hold exactly `width * height`
    /// pixels or either dimension is zero.
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)?
            .checked_mul(CHANNELS)?;
        if width == 0 || height == 0 || data.len() != expected {
            return None;
        }
        Some(Self { width, height, data })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw RGBA8 bytes.
    pub fn as_rgba(&self) -> &[u8] {
        &self.data
    }

    /// RGBA value at (`x`, `y`), or `None` outside the image.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * CHANNELS;
        let px = self.data.get(offset..offset + CHANNELS)?;
        Some([px[0], px[1], px[2], px[3]])
    }
}

/// A labelled body-part location in source-image pixel coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    /// Body-part label, e.g. `left_wrist`
    pub name: String,
    pub x: f32,
    pub y: f32,
    /// Detection confidence in `[0, 1]`
    pub confidence: f32,
}

impl Keypoint {
    pub fn new(name: impl Into<String>, x: f32, y: f32, confidence: f32) -> Self {
        Self {
            name: name.into(),
            x,
            y,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

/// One detected person candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub keypoints: Vec<Keypoint>,
    /// Overall pose score when the model reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

impl Pose {
    pub fn new(keypoints: Vec<Keypoint>) -> Self {
        Self {
            keypoints,
            score: None,
        }
    }

    pub fn with_score(mut self, score: f32) -> Self {
        self.score = Some(score);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_buffer_rejects_wrong_length() {
        assert!(PixelBuffer::from_rgba(2, 2, vec![0; 15]).is_none());
        assert!(PixelBuffer::from_rgba(0, 2, Vec::new()).is_none());
        assert!(PixelBuffer::from_rgba(2, 2, vec![0; 16]).is_some());
    }

    #[test]
    fn test_pixel_lookup() {
        let mut data = vec![0u8; 2 * 3 * CHANNELS];
        // (1, 2) in a 2x3 image
        let offset = (2 * 2 + 1) * CHANNELS;
        data[offset..offset + 4].copy_from_slice(&[10, 20, 30, 255]);
        let buf = PixelBuffer::from_rgba(2, 3, data).unwrap();

        assert_eq!(buf.pixel(1, 2), Some([10, 20, 30, 255]));
        assert_eq!(buf.pixel(0, 0), Some([0, 0, 0, 0]));
        assert_eq!(buf.pixel(2, 0), None);
    }

    #[test]
    fn test_keypoint_confidence_clamped() {
        assert_eq!(Keypoint::new("nose", 1.0, 2.0, 1.7).confidence, 1.0);
        assert_eq!(Keypoint::new("nose", 1.0, 2.0, -0.2).confidence, 0.0);
    }

    #[test]
    fn test_pose_score_omitted_when_absent() {
        let pose = Pose::new(vec![Keypoint::new("nose", 1.0, 2.0, 0.5)]);
        let json = serde_json::to_value(&pose).unwrap();
        assert!(json.get("score").is_none());

        let json = serde_json::to_value(pose.with_score(0.4)).unwrap();
        assert!((json["score"].as_f64().unwrap() - 0.4).abs() < 1e-6);
    }
}
