use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Static status payload.
#[derive(Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

/// GET / -- the server answers.
async fn root() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: "server is running",
    })
}

/// GET /healthz/up -- liveness.
async fn up_check() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: "service is up",
    })
}

/// GET /healthz/ready -- readiness.
async fn ready_check() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: "service is ready",
    })
}

/// Mount health check routes (intended for root-level, NOT under `/api/v1`).
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/healthz/up", get(up_check))
        .route("/healthz/ready", get(ready_check))
}
