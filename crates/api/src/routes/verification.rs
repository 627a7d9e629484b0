use axum::extract::DefaultBodyLimit;
use axum::routing::post;
use axum::Router;

use crate::handlers::verification;
use crate::state::AppState;

/// Verification and representation routes.
///
/// ```text
/// POST   /verifications          verify a server-side image
/// POST   /verifications/upload   upload an image and verify it (multipart)
/// POST   /representations        compute a face representation
/// ```
pub fn router(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/verifications", post(verification::verify))
        .route(
            "/verifications/upload",
            post(verification::upload).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/representations", post(verification::represent))
}
