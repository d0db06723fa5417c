//! System-wide default constants.
//!
//! Grouped by subsystem for easy discovery.

// ============================================================================
// HTTP Server
// ============================================================================

/// Port used when neither the config file nor `$PORT` sets one.
pub const SERVER_PORT: u16 = 5000;

/// Largest accepted request body (bytes). 10 MiB.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

// ============================================================================
// Pose Estimator
// ============================================================================

/// Default location of the MoveNet SinglePose Lightning ONNX export.
pub const MODEL_PATH: &str = "models/movenet_singlepose_lightning.onnx";

/// Input tensor name of the TF-to-ONNX MoveNet export.
pub const MODEL_INPUT_NAME: &str = "serving_default_input_0";

/// Output tensor name of the TF-to-ONNX MoveNet export.
pub const MODEL_OUTPUT_NAME: &str = "StatefulPartitionedCall_0";

/// MoveNet Lightning input resolution (square).
pub const MODEL_INPUT_SIZE: u32 = 192;

/// Poses whose mean keypoint score falls below this are discarded.
pub const MIN_POSE_SCORE: f32 = 0.25;

/// ONNX Runtime intra-op threads per session.
pub const INTRA_THREADS: usize = 1;

// ============================================================================
// Decoder
// ============================================================================

/// Decoded-pixel ceiling (width * height). 40 MP.
pub const MAX_DECODED_PIXELS: u64 = 40_000_000;

// ============================================================================
// Storage
// ============================================================================

/// Default sled database directory.
pub const STORAGE_PATH: &str = "./data/pose_detections.db";

/// Named sled tree holding detection records.
pub const DETECTIONS_COLLECTION: &str = "pose_detections";
