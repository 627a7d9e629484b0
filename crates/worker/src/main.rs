use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;

use facecheck_worker::config::{MessageSource, QueueConfig, ServiceConfig};
use facecheck_worker::{bootstrap, source, telemetry, uploads, Consumer, ConsumerStats};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    telemetry::init("facecheck_worker=debug,facecheck_core=debug,facecheck_db=debug")?;

    // --- Configuration ---
    let config = ServiceConfig::from_env()?;
    let queue = QueueConfig::from_env()?;
    tracing::info!(
        max_workers = config.max_workers,
        source = ?queue.source,
        "Loaded worker configuration"
    );

    uploads::init_storage_dir(&config.storage_path)
        .await
        .with_context(|| format!("Failed to prepare {}", config.storage_path.display()))?;

    // --- Service ---
    let services = bootstrap(&config).await?;
    let consumer = Consumer::new(Arc::clone(&services.service));

    // --- Shutdown ---
    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        telemetry::shutdown_signal().await;
        signal_cancel.cancel();
    });

    let result = consume(&consumer, &queue, cancel).await;

    services.shutdown();
    if let Some(pool) = &services.db_pool {
        pool.close().await;
        tracing::info!("Database pool closed");
    }

    let stats = result?;
    tracing::info!(received = stats.received, "Worker stopped");
    Ok(())
}

async fn consume(
    consumer: &Consumer,
    queue: &QueueConfig,
    cancel: CancellationToken,
) -> anyhow::Result<ConsumerStats> {
    match queue.source {
        MessageSource::Stdin => Ok(consumer.run(source::stdin_source(), cancel).await),
        #[cfg(feature = "kafka")]
        MessageSource::Kafka => {
            let kafka = facecheck_worker::kafka::KafkaSource::connect(queue)
                .context("Failed to create Kafka consumer")?;
            Ok(consumer.run(kafka.into_stream(), cancel).await)
        }
        #[cfg(not(feature = "kafka"))]
        MessageSource::Kafka => {
            anyhow::bail!("MESSAGE_SOURCE=kafka requires building with the `kafka` feature")
        }
    }
}
