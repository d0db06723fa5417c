//! API route definitions
//!
//! - POST /pose - Upload an image, detect and save a pose

use axum::extract::DefaultBodyLimit;
use axum::routing::post;
use axum::Router;

use super::handlers::{self, ApiState};

/// Create all API routes
pub fn api_routes(state: ApiState) -> Router {
    let upload_limit = state.max_upload_bytes;

    Router::new()
        .route(
            "/pose",
            post(handlers::detect_pose).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .with_state(state)
}
