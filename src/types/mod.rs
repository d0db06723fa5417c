//! Core data types shared by the decoder, estimator, pipeline and store.

mod detection;
mod pose;

pub use detection::{DetectionRecord, DetectionRequest, DocumentId};
pub use pose::{Keypoint, PixelBuffer, Pose, CHANNELS};
