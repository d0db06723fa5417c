//! MoveNet SinglePose Lightning on ONNX Runtime (CPU).

use ndarray::Array4;
use ort::execution_providers::CPUExecutionProvider;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use std::sync::Mutex;

use super::keypoints::KEYPOINT_COUNT;
use super::tensor::{decode_single_pose, to_input_tensor};
use super::{EstimationError, PoseEstimator};
use crate::config::EstimatorConfig;
use crate::types::{PixelBuffer, Pose};

/// Single-person, low-latency pose model.
///
/// The ONNX session needs exclusive access per run, so it sits behind a
/// mutex. Tensor conversion happens outside the lock.
pub struct MoveNetEstimator {
    session: Mutex<Session>,
    input_name: String,
    output_name: String,
    input_size: u32,
    min_pose_score: f32,
}

impl MoveNetEstimator {
    pub fn load(config: &EstimatorConfig) -> Result<Self, EstimationError> {
        if !config.model_path.exists() {
            return Err(EstimationError::ModelLoad(format!(
                "model file not found: {}",
                config.model_path.display()
            )));
        }

        let session = Session::builder()
            .map_err(load_error)?
            .with_execution_providers([CPUExecutionProvider::default().build()])
            .map_err(load_error)?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(load_error)?
            .with_intra_threads(config.intra_threads)
            .map_err(load_error)?
            .commit_from_file(&config.model_path)
            .map_err(load_error)?;

        Ok(Self {
            session: Mutex::new(session),
            input_name: config.input_name.clone(),
            output_name: config.output_name.clone(),
            input_size: config.input_size,
            min_pose_score: config.min_pose_score,
        })
    }

    fn run(&self, input: Array4<f32>) -> Result<Vec<f32>, EstimationError> {
        let input_tensor =
            Tensor::from_array(input).map_err(|e| EstimationError::Inference(e.to_string()))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| EstimationError::Inference("session lock poisoned".to_string()))?;
        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => input_tensor])
            .map_err(|e| EstimationError::Inference(e.to_string()))?;

        let output = outputs
            .get(self.output_name.as_str())
            .ok_or_else(|| {
                EstimationError::UnexpectedOutput(format!("missing output {:?}", self.output_name))
            })?
            .try_extract_array::<f32>()
            .map_err(|e| EstimationError::UnexpectedOutput(e.to_string()))?;

        Ok(output.iter().copied().collect())
    }
}

fn load_error(e: impl std::fmt::Display) -> EstimationError {
    EstimationError::ModelLoad(e.to_string())
}

impl PoseEstimator for MoveNetEstimator {
    fn estimate(&self, image: &PixelBuffer) -> Result<Vec<Pose>, EstimationError> {
        let size = self.input_size as usize;
        let data = to_input_tensor(image, self.input_size)?;
        let input = Array4::from_shape_vec((1, size, size, 3), data)
            .map_err(|e| EstimationError::InvalidInput(e.to_string()))?;

        let raw = self.run(input)?;
        decode_single_pose(&raw, image.width(), image.height(), self.min_pose_score)
    }

    fn keypoint_count(&self) -> usize {
        KEYPOINT_COUNT
    }

    fn name(&self) -> &'static str {
        "movenet-singlepose-lightning"
    }
}
