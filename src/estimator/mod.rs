//! Pose Estimator Handle
//!
//! A single, process-lifetime handle to the pose model:
//!
//! - [`initialize`] loads the configured single-person model once, before the
//!   HTTP server binds. Failure is fatal to startup.
//! - [`PoseEstimator::estimate`] is called per request from a blocking worker
//!   and must be safe to call concurrently.
//!
//! The handle is passed to the pipeline at construction; nothing here is
//! global.

pub mod keypoints;
pub mod tensor;
#[cfg(feature = "movenet")]
mod movenet;

#[cfg(feature = "movenet")]
pub use movenet::MoveNetEstimator;

use std::sync::Arc;

use crate::config::EstimatorConfig;
use crate::types::{PixelBuffer, Pose};

/// Shared, read-only estimator handle.
pub type EstimatorHandle = Arc<dyn PoseEstimator>;

/// Pose estimation failures, kept distinct from decode failures.
#[derive(Debug, thiserror::Error)]
pub enum EstimationError {
    #[error("pose backend unavailable: {0}")]
    BackendUnavailable(String),
    #[error("failed to load pose model: {0}")]
    ModelLoad(String),
    #[error("invalid input image: {0}")]
    InvalidInput(String),
    #[error("inference failed: {0}")]
    Inference(String),
    #[error("unexpected model output: {0}")]
    UnexpectedOutput(String),
}

/// Pose estimation capability.
///
/// Returning an empty list is a valid result meaning "no subject found".
pub trait PoseEstimator: Send + Sync {
    fn estimate(&self, image: &PixelBuffer) -> Result<Vec<Pose>, EstimationError>;

    /// Number of keypoints in every returned pose.
    fn keypoint_count(&self) -> usize;

    /// Backend name for logging.
    fn name(&self) -> &'static str;
}

/// Load the configured pose model and return the shared handle.
#[cfg(feature = "movenet")]
pub fn initialize(config: &EstimatorConfig) -> Result<EstimatorHandle, EstimationError> {
    let estimator = MoveNetEstimator::load(config)?;
    tracing::info!(
        model = %config.model_path.display(),
        backend = estimator.name(),
        input_size = config.input_size,
        min_pose_score = config.min_pose_score,
        "Pose estimator initialized"
    );
    Ok(Arc::new(estimator))
}

/// Load the configured pose model and return the shared handle.
///
/// This build carries no model backend, so initialisation always fails.
#[cfg(not(feature = "movenet"))]
pub fn initialize(config: &EstimatorConfig) -> Result<EstimatorHandle, EstimationError> {
    Err(EstimationError::BackendUnavailable(format!(
        "built without the `movenet` feature; cannot load {}",
        config.model_path.display()
    )))
}
