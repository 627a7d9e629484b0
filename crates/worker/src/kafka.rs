//! Kafka message source (enabled with the `kafka` feature).

use std::time::Duration;

use futures::{stream, Stream};
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer as _, StreamConsumer};
use rdkafka::error::KafkaError;
use rdkafka::Message as _;

use crate::config::QueueConfig;

/// Pause after a receive error before polling again.
const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Subscribed consumer-group member delivering raw message payloads.
pub struct KafkaSource {
    consumer: StreamConsumer,
}

impl KafkaSource {
    /// Create the client and subscribe to every configured topic.
    pub fn connect(config: &QueueConfig) -> Result<Self, KafkaError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("group.id", &config.group_id)
            .set("enable.auto.commit", "true")
            .set("auto.offset.reset", "earliest")
            .create()?;

        let topics: Vec<&str> = config.topics.iter().map(String::as_str).collect();
        consumer.subscribe(&topics)?;

        tracing::info!(
            brokers = %config.brokers,
            topics = ?config.topics,
            group_id = %config.group_id,
            "Kafka consumer subscribed"
        );
        Ok(Self { consumer })
    }

    /// Payloads in delivery order. Messages without a payload are skipped;
    /// receive errors are logged and polling resumes after a short pause.
    pub fn into_stream(self) -> impl Stream<Item = Vec<u8>> {
        stream::unfold(self.consumer, |consumer| async move {
            loop {
                let received = consumer
                    .recv()
                    .await
                    .map(|message| message.payload().map(<[u8]>::to_vec));

                match received {
                    Ok(Some(payload)) => return Some((payload, consumer)),
                    Ok(None) => tracing::warn!("Skipping Kafka message without payload"),
                    Err(e) => {
                        tracing::error!(error = %e, "Kafka receive failed");
                        tokio::time::sleep(RETRY_DELAY).await;
                    }
                }
            }
        })
    }
}
