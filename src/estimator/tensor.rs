//! MoveNet input/output tensor conversion.
//!
//! Kept free of any inference runtime so both directions can be tested
//! without a model file.
//!
//! - Input: `[1, size, size, 3]` RGB, channel-last, values `0.0..=255.0`
//! - Output: `[1, 1, 17, 3]` rows of `(y, x, score)`, all normalised to `[0, 1]`

use image::imageops::{self, FilterType};
use image::{ImageBuffer, Rgba};

use super::keypoints::{KEYPOINT_COUNT, KEYPOINT_NAMES};
use super::EstimationError;
use crate::types::{Keypoint, PixelBuffer, Pose};

/// Values per keypoint row in the model output.
const OUTPUT_STRIDE: usize = 3;

/// Resize `image` to the model resolution and flatten to channel-last RGB.
///
/// Alpha is dropped. Aspect ratio is not preserved; keypoints are mapped back
/// with the same per-axis scale in [`decode_single_pose`].
pub fn to_input_tensor(image: &PixelBuffer, size: u32) -> Result<Vec<f32>, EstimationError> {
    if size == 0 {
        return Err(EstimationError::InvalidInput("model input size is zero".to_string()));
    }
    let view: ImageBuffer<Rgba<u8>, &[u8]> =
        ImageBuffer::from_raw(image.width(), image.height(), image.as_rgba()).ok_or_else(|| {
            EstimationError::InvalidInput(format!(
                "pixel buffer does not match {}x{}",
                image.width(),
                image.height()
            ))
        })?;

    let resized = imageops::resize(&view, size, size, FilterType::Triangle);

    let mut tensor = Vec::with_capacity(size as usize * size as usize * 3);
    for px in resized.pixels() {
        let [r, g, b, _] = px.0;
        tensor.extend([f32::from(r), f32::from(g), f32::from(b)]);
    }
    Ok(tensor)
}

/// Turn a single-pose output into at most one [`Pose`] in source pixels.
///
/// Returns no pose when the mean keypoint score is below `min_pose_score`.
pub fn decode_single_pose(
    raw: &[f32],
    width: u32,
    height: u32,
    min_pose_score: f32,
) -> Result<Vec<Pose>, EstimationError> {
    let expected = KEYPOINT_COUNT * OUTPUT_STRIDE;
    if raw.len() < expected {
        return Err(EstimationError::UnexpectedOutput(format!(
            "expected at least {expected} values, got {}",
            raw.len()
        )));
    }
    if let Some(bad) = raw[..expected].iter().find(|v| !v.is_finite()) {
        return Err(EstimationError::UnexpectedOutput(format!(
            "non-finite value {bad} in keypoint tensor"
        )));
    }

    let (w, h) = (width as f32, height as f32);
    let keypoints: Vec<Keypoint> = raw[..expected]
        .chunks_exact(OUTPUT_STRIDE)
        .zip(KEYPOINT_NAMES)
        .map(|(row, name)| {
            let (y, x, score) = (row[0], row[1], row[2]);
            Keypoint::new(name, x.clamp(0.0, 1.0) * w, y.clamp(0.0, 1.0) * h, score)
        })
        .collect();

    let pose_score =
        keypoints.iter().map(|k| k.confidence).sum::<f32>() / KEYPOINT_COUNT as f32;
    if pose_score < min_pose_score {
        tracing::debug!(pose_score, min_pose_score, "Pose score below threshold, no pose reported");
        return Ok(Vec::new());
    }

    Ok(vec![Pose::new(keypoints).with_score(pose_score)])
}
