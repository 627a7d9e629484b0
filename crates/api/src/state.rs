use std::path::PathBuf;
use std::sync::Arc;

use facecheck_core::VerificationService;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<VerificationService>,
    pub config: Arc<ServerConfig>,
    /// Directory multipart uploads are written to before verification.
    pub storage_path: Arc<PathBuf>,
}
