//! Response bodies for the detection API.
//!
//! Success is `{ message, documentId, imagePath, keypoints }`; every error is
//! `{ error }`. [`DetectionOutcome`] maps to a response without any further
//! input, so the same pipeline can sit behind another transport.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::pipeline::DetectionOutcome;
use crate::types::{DocumentId, Keypoint};

/// Message returned with every successful detection.
pub const SUCCESS_MESSAGE: &str = "Pose detected and saved";

/// Generic body for internal failures. The specific reason is only logged.
pub const INTERNAL_ERROR_MESSAGE: &str = "Error processing image";

/// Successful detection: `{ "message", "documentId", "imagePath", "keypoints" }`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoseResponse {
    pub message: &'static str,
    pub document_id: DocumentId,
    pub image_path: String,
    pub keypoints: Vec<Keypoint>,
}

/// Error response: `{ "error": "..." }`
#[derive(Debug, Serialize)]
pub struct ApiErrorResponse {
    pub error: String,
}

impl ApiErrorResponse {
    fn build(status: StatusCode, msg: impl Into<String>) -> Response {
        (status, Json(Self { error: msg.into() })).into_response()
    }

    pub fn bad_request(msg: impl Into<String>) -> Response {
        Self::build(StatusCode::BAD_REQUEST, msg)
    }

    pub fn internal() -> Response {
        Self::build(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_MESSAGE)
    }

    pub fn with_status(status: StatusCode, msg: impl Into<String>) -> Response {
        Self::build(status, msg)
    }
}

impl IntoResponse for DetectionOutcome {
    fn into_response(self) -> Response {
        match self {
            DetectionOutcome::Success {
                document_id,
                image_path,
                keypoints,
            } => (
                StatusCode::OK,
                Json(PoseResponse {
                    message: SUCCESS_MESSAGE,
                    document_id,
                    image_path,
                    keypoints,
                }),
            )
                .into_response(),
            DetectionOutcome::Rejected { reason } => ApiErrorResponse::bad_request(reason.message()),
            DetectionOutcome::Failed { .. } => ApiErrorResponse::internal(),
        }
    }
}
