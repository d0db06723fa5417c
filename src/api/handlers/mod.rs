//! API route handlers
//!
//! - `pose`: multipart upload → detection pipeline

mod pose;

pub use pose::*;

use std::sync::Arc;

use crate::config::defaults;
use crate::pipeline::DetectionOrchestrator;

// ============================================================================
// API State
// ============================================================================

/// Shared state for API handlers
#[derive(Clone)]
pub struct ApiState {
    /// Request pipeline, built once at startup
    pub orchestrator: Arc<DetectionOrchestrator>,
    /// Largest accepted request body in bytes
    pub max_upload_bytes: usize,
}

impl ApiState {
    pub fn new(orchestrator: Arc<DetectionOrchestrator>) -> Self {
        Self {
            orchestrator,
            max_upload_bytes: defaults::MAX_UPLOAD_BYTES,
        }
    }

    pub fn with_max_upload_bytes(mut self, bytes: usize) -> Self {
        self.max_upload_bytes = bytes;
        self
    }
}
