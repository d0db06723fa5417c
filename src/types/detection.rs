//! Request and persisted record types for a single detection.

use axum::body::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::pose::Keypoint;

/// One inbound detection request, as extracted by the HTTP layer.
///
/// Both fields are optional here so the pipeline, not the transport, decides
/// what "missing" means.
#[derive(Debug, Clone, Default)]
pub struct DetectionRequest {
    pub image_bytes: Option<Bytes>,
    /// Caller-supplied logical reference, stored verbatim
    pub file_path: Option<String>,
}

impl DetectionRequest {
    pub fn new(image_bytes: impl Into<Bytes>, file_path: impl Into<String>) -> Self {
        Self {
            image_bytes: Some(image_bytes.into()),
            file_path: Some(file_path.into()),
        }
    }
}

/// Persisted detection: `{ timestamp, keypoints, imagePath }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionRecord {
    pub timestamp: DateTime<Utc>,
    pub keypoints: Vec<Keypoint>,
    pub image_path: String,
}

impl DetectionRecord {
    /// Build a record stamped with the current time.
    pub fn new(image_path: String, keypoints: Vec<Keypoint>) -> Self {
        Self {
            timestamp: Utc::now(),
            keypoints,
            image_path,
        }
    }
}

/// Store-generated identifier of a [`DetectionRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
