//! Face verification orchestration.
//!
//! [`VerificationService`] drives one request end-to-end:
//!
//! 1. validate the image path and model name,
//! 2. compute the embedding through the configured [`Runner`],
//! 3. persist the vector and delete the source image concurrently.
//!
//! Deletion and persistence are independent best-effort operations: both
//! are always attempted, both finish before `verify` returns, and a failure
//! in one never undoes the other.

use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;

use crate::embedder::{Embedder, RepresentRequest};
use crate::error::CoreError;
use crate::model::ModelName;
use crate::runner::{Runner, RunnerError};
use crate::storage::Storage;
use crate::types::{EmbeddingVector, User};
use crate::validation::Validator;

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Result of a single [`VerificationService::verify`] call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VerificationOutcome {
    /// The vector was persisted for this user.
    Verified { user: User },
    /// No vector could be obtained; storage was not touched.
    Rejected { reason: String },
    /// A vector was obtained but storage did not return a record.
    PersistFailed { reason: String },
}

impl VerificationOutcome {
    pub fn is_verified(&self) -> bool {
        matches!(self, Self::Verified { .. })
    }

    /// Short machine-readable label.
    pub fn status(&self) -> &'static str {
        match self {
            Self::Verified { .. } => "verified",
            Self::Rejected { .. } => "rejected",
            Self::PersistFailed { .. } => "persist_failed",
        }
    }
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

/// Verifies users from face images.
///
/// Cheap to share behind an `Arc`; holds only shared handles.
pub struct VerificationService {
    storage: Arc<dyn Storage>,
    runner: Arc<dyn Runner>,
    embedder: Arc<dyn Embedder>,
    validator: Validator,
}

impl VerificationService {
    pub fn new(
        storage: Arc<dyn Storage>,
        runner: Arc<dyn Runner>,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        Self {
            storage,
            runner,
            embedder,
            validator: Validator,
        }
    }

    /// Verify `username` from the image at `img_path`, then remove the image.
    ///
    /// Never fails: every failure is logged and reflected in the outcome.
    /// At most one storage mutation and at most one deletion happen per call.
    pub async fn verify(&self, username: &str, img_path: &str) -> VerificationOutcome {
        let vector = match self.represent(img_path, ModelName::default().as_str()).await {
            Ok(vector) => vector,
            Err(e) => {
                tracing::error!(username, img_path, error = %e, "Can't get vector for user");
                self.delete_path(img_path).await;
                return VerificationOutcome::Rejected {
                    reason: e.to_string(),
                };
            }
        };

        tracing::info!(username, faces = vector.len(), "Got vector for user");

        let (_, updated) = tokio::join!(
            self.delete_path(img_path),
            self.update_user(vector, username)
        );

        match updated {
            Ok(user) => {
                tracing::info!(username, user_id = ?user.user_id, "User verified");
                VerificationOutcome::Verified { user }
            }
            Err(e) => {
                tracing::error!(username, error = %e, "Can't update user");
                VerificationOutcome::PersistFailed {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Compute the face representation of the image at `img_path`.
    ///
    /// Inputs are validated before anything is scheduled. Every failure of
    /// the embedding routine or its runner is reported as `InvalidInput`,
    /// except a closed runner, which is `Internal`.
    pub async fn represent(
        &self,
        img_path: impl AsRef<Path>,
        model_name: &str,
    ) -> Result<EmbeddingVector, CoreError> {
        let img_path = img_path.as_ref();
        self.validator.validate_path(img_path)?;
        let model_name = self.validator.validate_model_name(model_name)?;

        let request = RepresentRequest {
            img_path: img_path.to_string_lossy().into_owned(),
            model_name,
        };

        let vector = self
            .runner
            .run(Arc::clone(&self.embedder), request)
            .await
            .map_err(|e| match e {
                RunnerError::Closed => {
                    tracing::error!(img_path = %img_path.display(), "Runner is shut down");
                    CoreError::Internal("embedding runner is shut down".into())
                }
                e => {
                    tracing::error!(img_path = %img_path.display(), error = %e, "Embedding failed");
                    CoreError::InvalidInput(format!(
                        "can't represent {}: {e}",
                        img_path.display()
                    ))
                }
            })?;

        if vector.is_empty() {
            return Err(CoreError::InvalidInput(format!(
                "no face found in {}",
                img_path.display()
            )));
        }
        Ok(vector)
    }

    /// Persist `vector` for `username`.
    ///
    /// Fails with `StorageFailure` when storage returns no record or reports
    /// a backend error.
    pub async fn update_user(
        &self,
        vector: EmbeddingVector,
        username: &str,
    ) -> Result<User, CoreError> {
        match self.storage.update_user(vector, username).await {
            Ok(Some(user)) => Ok(user),
            Ok(None) => {
                tracing::error!(username, "Storage returned no record, user is not updated");
                Err(CoreError::StorageFailure(
                    "error in storage, user is not updated".into(),
                ))
            }
            Err(e) => {
                tracing::error!(username, error = %e, "Storage backend failed");
                Err(CoreError::StorageFailure(e.to_string()))
            }
        }
    }

    /// Best-effort removal of the source image.
    ///
    /// A missing file is a warning, not an error. Returns whether a file was
    /// actually removed.
    async fn delete_path(&self, img_path: &str) -> bool {
        if !Path::new(img_path).is_file() {
            tracing::warn!(img_path, "File not found, can not remove");
            return false;
        }
        match tokio::fs::remove_file(img_path).await {
            Ok(()) => {
                tracing::debug!(img_path, "Removed source image");
                true
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::warn!(img_path, "File already removed");
                false
            }
            Err(e) => {
                tracing::error!(img_path, error = %e, "Failed to remove source image");
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
