//! Handlers for verification and face representation requests.
//!
//! Client-supplied paths must resolve inside the upload directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::Json;
use facecheck_core::model::ModelName;
use facecheck_core::types::{DbId, EmbeddingVector};
use facecheck_core::VerificationOutcome;
use facecheck_worker::uploads;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

/// Body of `POST /api/v1/verifications`.
#[derive(Debug, Deserialize, Validate)]
pub struct VerifyRequest {
    #[validate(length(min = 1, max = 150))]
    pub username: String,
    pub file_path: String,
}

/// Multipart text fields of `POST /api/v1/verifications/upload`.
#[derive(Debug, Validate)]
struct UploadFields {
    #[validate(length(min = 1, max = 150))]
    username: String,
}

/// Body of `POST /api/v1/representations`.
#[derive(Debug, Deserialize)]
pub struct RepresentRequest {
    pub file_path: String,
    pub model_name: Option<String>,
}

/// Result of a verification attempt.
#[derive(Debug, Serialize)]
pub struct VerificationResponse {
    pub username: String,
    /// `verified` or `rejected`.
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<DbId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/verifications
///
/// Verify a user from an image already in the upload directory. The image
/// is removed afterwards whether or not verification succeeds.
pub async fn verify(
    State(state): State<AppState>,
    Json(body): Json<VerifyRequest>,
) -> AppResult<Json<DataResponse<VerificationResponse>>> {
    body.validate()?;
    let path = resolve_upload_path(&state, &body.file_path).await?;
    run_verification(&state, body.username, path).await
}

/// POST /api/v1/verifications/upload
///
/// Multipart form with a `username` text field and an `image` file field.
/// The image is stored under the upload directory, then verified.
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<Json<DataResponse<VerificationResponse>>> {
    let mut username: Option<String> = None;
    let mut image: Option<Vec<u8>> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "username" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                username = Some(text);
            }
            "image" => {
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                image = Some(data.to_vec());
            }
            _ => {} // ignore unknown fields
        }
    }

    let username =
        username.ok_or_else(|| AppError::BadRequest("Missing required 'username' field".into()))?;
    let image =
        image.ok_or_else(|| AppError::BadRequest("Missing required 'image' field".into()))?;
    if image.is_empty() {
        return Err(AppError::BadRequest("Uploaded image is empty".into()));
    }

    let fields = UploadFields { username };
    fields.validate()?;

    let path = uploads::save_upload(&state.storage_path, &fields.username, &image)
        .await
        .map_err(|e| AppError::ServiceUnavailable(format!("failed to store upload: {e}")))?;

    run_verification(&state, fields.username, path).await
}

/// POST /api/v1/representations
///
/// Compute the face representation of an image in the upload directory
/// without verifying anyone or removing the image.
pub async fn represent(
    State(state): State<AppState>,
    Json(body): Json<RepresentRequest>,
) -> AppResult<Json<DataResponse<EmbeddingVector>>> {
    let path = resolve_upload_path(&state, &body.file_path).await?;
    let model_name = body
        .model_name
        .unwrap_or_else(|| ModelName::default().as_str().to_string());
    let vector = state.service.represent(&path, &model_name).await?;
    Ok(Json(DataResponse { data: vector }))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn resolve_upload_path(state: &AppState, file_path: &str) -> AppResult<PathBuf> {
    uploads::resolve_within(&state.storage_path, Path::new(file_path))
        .await
        .map_err(|e| AppError::ServiceUnavailable(format!("failed to resolve {file_path}: {e}")))?
        .ok_or_else(|| {
            tracing::warn!(file_path, "Refused path outside the upload directory");
            AppError::BadRequest("file_path must be inside the upload directory".into())
        })
}

/// Runs verification on its own task. A request timeout or a dropped
/// connection does not cancel the delete and persist pair.
async fn run_verification(
    state: &AppState,
    username: String,
    path: PathBuf,
) -> AppResult<Json<DataResponse<VerificationResponse>>> {
    let service = Arc::clone(&state.service);
    let task = tokio::spawn(async move {
        let outcome = service.verify(&username, &path.to_string_lossy()).await;
        (username, outcome)
    });
    let (username, outcome) = task
        .await
        .map_err(|e| AppError::ServiceUnavailable(format!("verification task failed: {e}")))?;
    respond(username, outcome)
}

/// Verified and rejected attempts are regular responses; a vector that
/// could not be persisted is a service failure.
fn respond(
    username: String,
    outcome: VerificationOutcome,
) -> AppResult<Json<DataResponse<VerificationResponse>>> {
    let status = outcome.status();
    let data = match outcome {
        VerificationOutcome::Verified { user } => VerificationResponse {
            username,
            status,
            user_id: user.user_id,
            reason: None,
        },
        VerificationOutcome::Rejected { reason } => VerificationResponse {
            username,
            status,
            user_id: None,
            reason: Some(reason),
        },
        VerificationOutcome::PersistFailed { reason } => {
            return Err(AppError::ServiceUnavailable(reason));
        }
    };
    Ok(Json(DataResponse { data }))
}
