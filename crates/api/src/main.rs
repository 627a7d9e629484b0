use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;

use facecheck_api::config::ServerConfig;
use facecheck_api::router::build_app_router;
use facecheck_api::state::AppState;
use facecheck_worker::{bootstrap, telemetry, uploads, ServiceConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    telemetry::init("facecheck_api=debug,facecheck_core=debug,tower_http=debug")?;

    // --- Configuration ---
    let config = ServerConfig::from_env()?;
    let service_config = ServiceConfig::from_env()?;
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    uploads::init_storage_dir(&service_config.storage_path)
        .await
        .with_context(|| {
            format!(
                "Failed to prepare {}",
                service_config.storage_path.display()
            )
        })?;

    // --- Service ---
    let services = bootstrap(&service_config).await?;

    // --- App state ---
    let state = AppState {
        service: Arc::clone(&services.service),
        config: Arc::new(config.clone()),
        storage_path: Arc::new(service_config.storage_path.clone()),
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(config.host, config.port);
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(telemetry::shutdown_signal())
        .await;

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");
    services.shutdown();
    if let Some(pool) = &services.db_pool {
        pool.close().await;
        tracing::info!("Database pool closed");
    }

    served.context("Server error")?;
    tracing::info!("Graceful shutdown complete");
    Ok(())
}
