//! Pose Backend: single-person pose detection over HTTP
//!
//! Accepts an uploaded image plus a caller-supplied path, estimates one
//! human pose and stores the result.
//!
//! ## Architecture
//!
//! - **Decoder**: upload bytes → RGBA8 pixel buffer
//! - **Estimator**: pixel buffer → pose keypoints (model loaded once at startup)
//! - **Storage**: append-only detection records
//! - **Pipeline**: validate → decode → estimate → persist, one tagged outcome per request
//! - **API**: `POST /pose` multipart endpoint mapping outcomes to HTTP

pub mod api;
pub mod config;
pub mod decoder;
pub mod estimator;
pub mod pipeline;
pub mod storage;
pub mod types;

// Re-export configuration
pub use config::{ConfigError, ServiceConfig};

// Re-export the request pipeline
pub use pipeline::{DetectionOrchestrator, DetectionOutcome, FailureReason, RejectionReason};

// Re-export capability traits and their errors
pub use decoder::{DecodeError, ImageDecoder, RasterDecoder};
pub use estimator::{EstimationError, EstimatorHandle, PoseEstimator};
pub use storage::{DetectionStore, PersistenceError};

// Re-export commonly used types
pub use types::{DetectionRecord, DetectionRequest, DocumentId, Keypoint, PixelBuffer, Pose};
