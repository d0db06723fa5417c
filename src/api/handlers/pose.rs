//! Pose detection upload endpoint

use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::response::{IntoResponse, Response};
use tracing::{debug, warn};

use super::ApiState;
use crate::api::envelope::ApiErrorResponse;
use crate::types::DetectionRequest;

/// Multipart field carrying the image file.
pub const IMAGE_FIELD: &str = "image";

/// Multipart field carrying the caller's logical path.
pub const FILE_PATH_FIELD: &str = "filePath";

/// Rejection for a `filePath` part that is not UTF-8.
pub const INVALID_FILE_PATH_MESSAGE: &str = "filePath must be valid UTF-8 text";

/// POST /pose - Detect a pose in the uploaded image and save it
///
/// Expects `multipart/form-data` with an `image` file part and a `filePath`
/// text part. Field presence is checked by the pipeline, not here, so a
/// missing part becomes the matching 400 rejection.
pub async fn detect_pose(
    State(state): State<ApiState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let mut multipart = match multipart {
        Ok(m) => m,
        Err(rejection) => {
            warn!(error = %rejection.body_text(), "Rejected non-multipart pose request");
            return ApiErrorResponse::with_status(rejection.status(), rejection.body_text());
        }
    };

    let mut request = DetectionRequest::default();
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "Malformed multipart body");
                return ApiErrorResponse::with_status(e.status(), e.body_text());
            }
        };

        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            IMAGE_FIELD => {
                if request.image_bytes.is_some() {
                    return ApiErrorResponse::bad_request("Only one image file may be uploaded");
                }
                match field.bytes().await {
                    Ok(bytes) => request.image_bytes = Some(bytes),
                    Err(e) => {
                        warn!(error = %e, "Failed to read image field");
                        return ApiErrorResponse::with_status(e.status(), e.body_text());
                    }
                }
            }
            FILE_PATH_FIELD => {
                let raw = match field.bytes().await {
                    Ok(raw) => raw,
                    Err(e) => {
                        warn!(error = %e, "Failed to read filePath field");
                        return ApiErrorResponse::with_status(e.status(), e.body_text());
                    }
                };
                match String::from_utf8(raw.to_vec()) {
                    Ok(text) => request.file_path = Some(parse_file_path(text)),
                    Err(e) => {
                        warn!(error = %e, "Rejected non-UTF-8 filePath");
                        return ApiErrorResponse::bad_request(INVALID_FILE_PATH_MESSAGE);
                    }
                }
            }
            other => debug!(field = %other, "Ignoring unexpected multipart field"),
        }
    }

    state.orchestrator.process(request).await.into_response()
}

/// Decode a JSON string literal (`"uploads/a.png"`), otherwise keep the raw
/// text unchanged.
///
/// Only text that is exactly one literal, quote to quote, is decoded.
pub fn parse_file_path(raw: String) -> String {
    if raw.len() < 2 || !raw.starts_with('"') || !raw.ends_with('"') {
        return raw;
    }
    match serde_json::from_str::<String>(&raw) {
        Ok(decoded) => decoded,
        Err(_) => raw,
    }
}
