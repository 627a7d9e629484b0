//! Serial queue consumer feeding [`VerificationService::verify`].
//!
//! Messages are handled one at a time in delivery order. Cancellation is
//! only observed between messages, so a request that has started always
//! runs to completion.

use std::sync::Arc;

use facecheck_core::types::Message;
use facecheck_core::{VerificationOutcome, VerificationService};
use futures::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::message::QueueMessage;

/// Per-run counters, returned when the loop exits.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ConsumerStats {
    pub received: u64,
    pub verified: u64,
    pub rejected: u64,
    pub persist_failed: u64,
    pub undecodable: u64,
}

impl ConsumerStats {
    fn record(&mut self, outcome: Option<&VerificationOutcome>) {
        self.received += 1;
        match outcome {
            None => self.undecodable += 1,
            Some(VerificationOutcome::Verified { .. }) => self.verified += 1,
            Some(VerificationOutcome::Rejected { .. }) => self.rejected += 1,
            Some(VerificationOutcome::PersistFailed { .. }) => self.persist_failed += 1,
        }
    }
}

pub struct Consumer {
    service: Arc<VerificationService>,
}

impl Consumer {
    pub fn new(service: Arc<VerificationService>) -> Self {
        Self { service }
    }

    /// Decode one raw payload and verify it.
    ///
    /// Returns `None` when the payload is not a valid message; the payload
    /// is logged and dropped.
    pub async fn handle(&self, payload: &[u8]) -> Option<VerificationOutcome> {
        let message: Message = match QueueMessage::decode(payload) {
            Ok(msg) => msg.into(),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    payload = %String::from_utf8_lossy(payload),
                    "Skipping undecodable message"
                );
                return None;
            }
        };

        tracing::debug!(username = %message.username, path = %message.path, "Message received");
        let outcome = self.service.verify(&message.username, &message.path).await;
        tracing::info!(
            username = %message.username,
            status = outcome.status(),
            "Message processed"
        );
        Some(outcome)
    }

    /// Consume `stream` until it ends or `cancel` fires.
    pub async fn run<S>(&self, stream: S, cancel: CancellationToken) -> ConsumerStats
    where
        S: Stream<Item = Vec<u8>>,
    {
        tokio::pin!(stream);
        let mut stats = ConsumerStats::default();

        tracing::info!("Consumer started");

        loop {
            let payload = tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Consumer stopping");
                    break;
                }
                next = stream.next() => match next {
                    Some(payload) => payload,
                    None => {
                        tracing::info!("Message stream ended");
                        break;
                    }
                },
            };

            let outcome = self.handle(&payload).await;
            stats.record(outcome.as_ref());
        }

        tracing::info!(
            received = stats.received,
            verified = stats.verified,
            rejected = stats.rejected,
            persist_failed = stats.persist_failed,
            undecodable = stats.undecodable,
            "Consumer finished"
        );
        stats
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use facecheck_core::embedder::{EmbedError, Embedder, RepresentRequest};
    use facecheck_core::runner::InlineRunner;
    use facecheck_core::storage::InMemoryStorage;
    use facecheck_core::types::{EmbeddingVector, FaceRepresentation};
    use futures::stream;

    use super::*;

    struct FakeEmbedder {
        calls: AtomicUsize,
    }

    impl Embedder for FakeEmbedder {
        fn represent(&self, _request: &RepresentRequest) -> Result<EmbeddingVector, EmbedError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(EmbeddingVector::new(vec![FaceRepresentation {
                embedding: vec![0.1, 0.2],
                facial_area: None,
                face_confidence: Some(0.9),
            }]))
        }
    }

    struct Fixture {
        consumer: Consumer,
        storage: Arc<InMemoryStorage>,
        embedder: Arc<FakeEmbedder>,
    }

    fn fixture() -> Fixture {
        let storage = Arc::new(InMemoryStorage::new());
        let embedder = Arc::new(FakeEmbedder {
            calls: AtomicUsize::new(0),
        });
        let service = VerificationService::new(storage.clone(), Arc::new(InlineRunner), embedder.clone());
        Fixture {
            consumer: Consumer::new(Arc::new(service)),
            storage,
            embedder,
        }
    }

    fn payload(username: &str, path: &Path) -> Vec<u8> {
        serde_json::to_vec(&QueueMessage {
            username: username.into(),
            file_path: path.display().to_string(),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn valid_message_verifies_user_and_removes_image() {
        let fx = fixture();
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("me.jpg");
        std::fs::write(&image, b"jpeg").unwrap();

        let outcome = fx.consumer.handle(&payload("george", &image)).await;

        assert!(outcome.expect("decoded").is_verified());
        assert!(!image.exists());
        let user = fx.storage.get_user("george").await.expect("stored");
        assert!(user.is_verified);
    }

    #[tokio::test]
    async fn missing_file_leaves_storage_untouched() {
        let fx = fixture();

        let outcome = fx
            .consumer
            .handle(&payload("george", Path::new("/no/such/file")))
            .await;

        assert_eq!(outcome.expect("decoded").status(), "rejected");
        assert!(fx.storage.is_empty().await);
        assert_eq!(fx.embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn undecodable_payload_is_skipped() {
        let fx = fixture();
        assert!(fx.consumer.handle(b"{not json").await.is_none());
        assert!(fx.storage.is_empty().await);
    }

    #[tokio::test]
    async fn run_processes_every_message_in_order() {
        let fx = fixture();
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("a.jpg");
        let second = dir.path().join("b.jpg");
        std::fs::write(&first, b"a").unwrap();
        std::fs::write(&second, b"b").unwrap();

        let messages = vec![
            payload("alice", &first),
            b"garbage".to_vec(),
            payload("bob", Path::new("/no/such/file")),
            payload("carol", &second),
        ];

        let stats = fx
            .consumer
            .run(stream::iter(messages), CancellationToken::new())
            .await;

        assert_eq!(
            stats,
            ConsumerStats {
                received: 4,
                verified: 2,
                rejected: 1,
                persist_failed: 0,
                undecodable: 1,
            }
        );
        let ids: Vec<_> = fx
            .storage
            .users()
            .await
            .into_iter()
            .map(|u| (u.username, u.user_id))
            .collect();
        assert_eq!(
            ids,
            vec![("alice".to_string(), Some(0)), ("carol".to_string(), Some(1))]
        );
    }

    #[tokio::test]
    async fn cancelled_token_stops_pending_stream() {
        let fx = fixture();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let stats = fx.consumer.run(stream::pending::<Vec<u8>>(), cancel).await;

        assert_eq!(stats, ConsumerStats::default());
    }
}
