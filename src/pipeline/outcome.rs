//! Tagged result of processing one detection request.
//!
//! The orchestrator reports *what happened*; the HTTP layer decides how to
//! transport it.

use crate::types::{DocumentId, Keypoint};

/// Client-input problems. Expected conditions, not server faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionReason {
    MissingFilePath,
    MissingImage,
    /// The image decoded and was analysed, but no subject was found
    NoPoseDetected,
}

impl RejectionReason {
    /// Caller-actionable message.
    pub fn message(self) -> &'static str {
        match self {
            RejectionReason::MissingFilePath => "No filePath provided",
            RejectionReason::MissingImage => "No image file provided",
            RejectionReason::NoPoseDetected => "No pose detected",
        }
    }
}

/// Internal failures. Details are logged, never returned to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    DecodeFailed,
    EstimationFailed,
    PersistenceFailed,
    TimedOut,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DetectionOutcome {
    /// Detected and saved
    Success {
        document_id: DocumentId,
        image_path: String,
        keypoints: Vec<Keypoint>,
    },
    Rejected {
        reason: RejectionReason,
    },
    Failed {
        reason: FailureReason,
    },
}

impl DetectionOutcome {
    pub fn rejected(reason: RejectionReason) -> Self {
        Self::Rejected { reason }
    }

    pub fn failed(reason: FailureReason) -> Self {
        Self::Failed { reason }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}
