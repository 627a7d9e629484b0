//! Wiring of the verification service from [`ServiceConfig`].

use std::sync::Arc;

use anyhow::Context;
use facecheck_core::embedder::CommandEmbedder;
use facecheck_core::runner::{PoolRunner, Runner};
use facecheck_core::storage::{InMemoryStorage, Storage};
use facecheck_core::VerificationService;
use facecheck_db::{DbPool, PgStorage};

use crate::config::{ConfigError, ServiceConfig};

/// Everything a binary needs to serve requests, plus the handles that must
/// be torn down on exit.
pub struct Services {
    pub service: Arc<VerificationService>,
    /// Present when `DATABASE_URL` is configured.
    pub db_pool: Option<DbPool>,
    pool_runner: Arc<PoolRunner>,
}

impl Services {
    /// Stop accepting embedding work. In-flight calls finish normally.
    pub fn shutdown(&self) {
        self.pool_runner.close();
        tracing::info!("Runner pool closed");
    }
}

/// Connect storage, build the runner and embedder, and assemble the service.
pub async fn bootstrap(config: &ServiceConfig) -> anyhow::Result<Services> {
    let (storage, db_pool) = connect_storage(config).await?;
    let pool_runner = build_runner(config);
    let embedder = build_embedder(config)?;

    tracing::info!(
        program = embedder.program(),
        timeout_secs = embedder.timeout().as_secs(),
        "Embedding command configured"
    );

    let runner: Arc<dyn Runner> = pool_runner.clone();
    let service = VerificationService::new(storage, runner, Arc::new(embedder));

    Ok(Services {
        service: Arc::new(service),
        db_pool,
        pool_runner,
    })
}

/// Postgres when a URL is configured (migrated and health-checked),
/// otherwise the process-local store.
pub async fn connect_storage(
    config: &ServiceConfig,
) -> anyhow::Result<(Arc<dyn Storage>, Option<DbPool>)> {
    let Some(url) = config.database_url.as_deref() else {
        tracing::warn!("DATABASE_URL not set, using in-memory storage");
        let storage: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());
        return Ok((storage, None));
    };

    let pool = facecheck_db::create_pool(url, config.db_max_connections)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connection pool created");

    facecheck_db::health_check(&pool)
        .await
        .context("Database health check failed")?;
    tracing::info!("Database health check passed");

    facecheck_db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database migrations applied");

    let storage: Arc<dyn Storage> = Arc::new(PgStorage::new(pool.clone()));
    Ok((storage, Some(pool)))
}

/// The bounded pool the embedding command runs on.
///
/// [`CommandEmbedder`] blocks for the whole child process, so it is never
/// driven inline on a scheduler thread.
pub fn build_runner(config: &ServiceConfig) -> Arc<PoolRunner> {
    let pool = Arc::new(PoolRunner::new(config.max_workers, config.embed_timeout));
    tracing::info!(
        max_workers = pool.max_workers(),
        timeout_secs = pool.timeout().as_secs(),
        "Using pool runner"
    );
    pool
}

pub fn build_embedder(config: &ServiceConfig) -> Result<CommandEmbedder, ConfigError> {
    CommandEmbedder::from_command_line(&config.embed_command, config.embed_timeout).ok_or_else(
        || ConfigError::Invalid {
            name: "EMBED_COMMAND",
            value: config.embed_command.clone(),
            reason: "must name a program".into(),
        },
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
