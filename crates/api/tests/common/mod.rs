#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

use facecheck_api::config::{ServerConfig, DEFAULT_MAX_UPLOAD_BYTES};
use facecheck_api::router::build_app_router;
use facecheck_api::state::AppState;
use facecheck_core::embedder::{EmbedError, Embedder, RepresentRequest};
use facecheck_core::runner::{InlineRunner, Runner};
use facecheck_core::storage::{InMemoryStorage, Storage};
use facecheck_core::types::{EmbeddingVector, FaceRepresentation, FacialArea};
use facecheck_core::VerificationService;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".parse().unwrap(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
    }
}

// ---------------------------------------------------------------------------
// Fake embedding routines
// ---------------------------------------------------------------------------

/// Returns one face for every image.
pub struct OneFace;

impl Embedder for OneFace {
    fn represent(&self, _request: &RepresentRequest) -> Result<EmbeddingVector, EmbedError> {
        Ok(sample_vector())
    }
}

/// Never finds a face.
pub struct NoFace;

impl Embedder for NoFace {
    fn represent(&self, request: &RepresentRequest) -> Result<EmbeddingVector, EmbedError> {
        Err(EmbedError::NoFace(request.img_path.clone()))
    }
}

pub fn sample_vector() -> EmbeddingVector {
    EmbeddingVector::new(vec![FaceRepresentation {
        embedding: vec![0.25, -0.5, 0.75],
        facial_area: Some(FacialArea {
            x: 10,
            y: 20,
            w: 64,
            h: 64,
        }),
        face_confidence: Some(0.98),
    }])
}

// ---------------------------------------------------------------------------
// App construction
// ---------------------------------------------------------------------------

pub struct TestApp {
    pub router: Router,
    pub storage: Arc<InMemoryStorage>,
    pub upload_dir: TempDir,
}

impl TestApp {
    /// Write a fake JPEG named `name` into the upload directory.
    pub fn write_image(&self, name: &str) -> std::path::PathBuf {
        write_image(&self.upload_dir, name)
    }
}

pub fn write_image(dir: &TempDir, name: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, b"\xff\xd8\xff\xe0 jpeg").unwrap();
    path
}

/// Full application over in-memory storage, the inline runner and `embedder`.
pub fn build_test_app(embedder: impl Embedder) -> TestApp {
    let storage = Arc::new(InMemoryStorage::new());
    let upload_dir = tempfile::tempdir().unwrap();
    let router = build_router(storage.clone(), embedder, &upload_dir);
    TestApp {
        router,
        storage,
        upload_dir,
    }
}

/// Same as [`build_test_app`] over a caller-supplied storage backend.
pub fn build_router(
    storage: Arc<dyn Storage>,
    embedder: impl Embedder,
    upload_dir: &TempDir,
) -> Router {
    build_router_with(
        storage,
        Arc::new(InlineRunner),
        embedder,
        upload_dir,
        test_config(),
    )
}

/// Full control over the runner and server configuration.
pub fn build_router_with(
    storage: Arc<dyn Storage>,
    runner: Arc<dyn Runner>,
    embedder: impl Embedder,
    upload_dir: &TempDir,
    config: ServerConfig,
) -> Router {
    let service = VerificationService::new(storage, runner, Arc::new(embedder));

    let state = AppState {
        service: Arc::new(service),
        config: Arc::new(config.clone()),
        storage_path: Arc::new(upload_dir.path().to_path_buf()),
    };

    build_app_router(state, &config)
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn get(app: Router, uri: &str) -> Response {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub const BOUNDARY: &str = "facecheck-test-boundary";

/// A `multipart/form-data` body from `(name, filename, bytes)` parts.
pub fn multipart_body(parts: &[(&str, Option<&str>, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, filename, bytes) in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match filename {
            Some(file) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n"
                    )
                    .as_bytes(),
                );
            }
            None => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                );
            }
        }
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub async fn post_multipart(app: Router, uri: &str, body: Vec<u8>) -> Response {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
