//! Execution strategies for the blocking embedding routine.
//!
//! [`Runner`] is the seam between the single cooperative consumer loop and
//! blocking work. Two strategies are provided:
//!
//! - [`InlineRunner`]: calls the routine directly on the calling task. Only
//!   suitable for routines that are already cheap (fixtures, tests).
//! - [`PoolRunner`]: offloads each call to tokio's blocking pool, bounded by
//!   a semaphore, with a per-call timeout. Combined with
//!   [`CommandEmbedder`](crate::embedder::CommandEmbedder) every call is an
//!   isolated OS process, giving a bounded pool of worker processes.
//!
//! Both surface routine failures, worker panics, and timeouts as a
//! [`RunnerError`] in the caller's context.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tokio::task::JoinError;

use crate::embedder::{EmbedError, Embedder, RepresentRequest};
use crate::types::EmbeddingVector;

/// Default per-call timeout for offloaded embedding work.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// The routine itself failed.
    #[error(transparent)]
    Embed(#[from] EmbedError),

    /// The worker running the routine panicked.
    #[error("Embedding worker panicked: {0}")]
    Panicked(String),

    /// The routine did not finish within the runner's timeout.
    #[error("Embedding worker timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    /// The runner was closed and accepts no more work.
    #[error("Runner is closed")]
    Closed,
}

// ---------------------------------------------------------------------------
// Runner
// ---------------------------------------------------------------------------

/// Runs an [`Embedder`] call without stalling the caller's scheduler.
#[async_trait]
pub trait Runner: Send + Sync {
    async fn run(
        &self,
        embedder: Arc<dyn Embedder>,
        request: RepresentRequest,
    ) -> Result<EmbeddingVector, RunnerError>;
}

/// Direct passthrough: the routine runs on the calling task.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineRunner;

#[async_trait]
impl Runner for InlineRunner {
    async fn run(
        &self,
        embedder: Arc<dyn Embedder>,
        request: RepresentRequest,
    ) -> Result<EmbeddingVector, RunnerError> {
        Ok(embedder.represent(&request)?)
    }
}

// ---------------------------------------------------------------------------
// PoolRunner
// ---------------------------------------------------------------------------

/// Bounded offload onto tokio's blocking thread pool.
///
/// At most `max_workers` calls run at once; further calls wait for a slot.
/// A call that times out keeps its slot until the blocking work actually
/// returns, so the bound holds even for hung routines.
#[derive(Debug)]
pub struct PoolRunner {
    permits: Arc<Semaphore>,
    max_workers: usize,
    timeout: Duration,
}

impl PoolRunner {
    /// `max_workers` is clamped to at least 1.
    pub fn new(max_workers: usize, timeout: Duration) -> Self {
        let max_workers = max_workers.max(1);
        Self {
            permits: Arc::new(Semaphore::new(max_workers)),
            max_workers,
            timeout,
        }
    }

    /// One worker per available CPU, with [`DEFAULT_TIMEOUT`].
    pub fn with_default_size() -> Self {
        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self::new(workers, DEFAULT_TIMEOUT)
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Slots not currently held by a running call.
    pub fn available_workers(&self) -> usize {
        self.permits.available_permits()
    }

    /// Stop accepting work. Calls already running finish normally; waiting
    /// and future calls fail with [`RunnerError::Closed`].
    pub fn close(&self) {
        self.permits.close();
    }

    pub fn is_closed(&self) -> bool {
        self.permits.is_closed()
    }
}

#[async_trait]
impl Runner for PoolRunner {
    async fn run(
        &self,
        embedder: Arc<dyn Embedder>,
        request: RepresentRequest,
    ) -> Result<EmbeddingVector, RunnerError> {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| RunnerError::Closed)?;

        let start = Instant::now();
        let handle = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            embedder.represent(&request)
        });

        match tokio::time::timeout(self.timeout, handle).await {
            Ok(Ok(result)) => Ok(result?),
            Ok(Err(e)) => {
                let message = panic_message(e);
                tracing::error!(error = %message, "Embedding worker panicked");
                Err(RunnerError::Panicked(message))
            }
            Err(_elapsed) => {
                let elapsed_ms = start.elapsed().as_millis() as u64;
                tracing::error!(elapsed_ms, "Embedding worker timed out");
                Err(RunnerError::Timeout { elapsed_ms })
            }
        }
    }
}

fn panic_message(err: JoinError) -> String {
    if !err.is_panic() {
        return err.to_string();
    }
    let payload = err.into_panic();
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use assert_matches::assert_matches;

    use super::*;
    use crate::model::ModelName;
    use crate::types::FaceRepresentation;

    fn request() -> RepresentRequest {
        RepresentRequest {
            img_path: "/tmp/face.jpg".into(),
            model_name: ModelName::Facenet,
        }
    }

    fn one_face() -> EmbeddingVector {
        EmbeddingVector::new(vec![FaceRepresentation {
            embedding: vec![0.1, 0.2],
            facial_area: None,
            face_confidence: None,
        }])
    }

    fn embedder_fn<F>(f: F) -> Arc<dyn Embedder>
    where
        F: Fn(&RepresentRequest) -> Result<EmbeddingVector, EmbedError> + Send + Sync + 'static,
    {
        Arc::new(f)
    }

    fn ok_embedder() -> Arc<dyn Embedder> {
        embedder_fn(|_| Ok(one_face()))
    }

    #[tokio::test]
    async fn inline_runner_passes_result_through() {
        let vector = InlineRunner.run(ok_embedder(), request()).await.expect("run");
        assert_eq!(vector, one_face());
    }

    #[tokio::test]
    async fn inline_runner_propagates_routine_error() {
        let embedder = embedder_fn(|req| Err(EmbedError::NoFace(req.img_path.clone())));
        assert_matches!(
            InlineRunner.run(embedder, request()).await,
            Err(RunnerError::Embed(EmbedError::NoFace(_)))
        );
    }

    #[tokio::test]
    async fn pool_runner_runs_off_the_calling_thread() {
        let caller = std::thread::current().id();
        let embedder = embedder_fn(move |_| {
            if std::thread::current().id() == caller {
                Err(EmbedError::Routine("ran on the caller thread".into()))
            } else {
                Ok(one_face())
            }
        });

        let runner = PoolRunner::new(1, Duration::from_secs(5));
        assert!(runner.run(embedder, request()).await.is_ok());
        assert_eq!(runner.available_workers(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn pool_runner_bounds_concurrency() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let embedder = {
            let active = Arc::clone(&active);
            let peak = Arc::clone(&peak);
            embedder_fn(move |_| {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(50));
                active.fetch_sub(1, Ordering::SeqCst);
                Ok(one_face())
            })
        };

        let runner = Arc::new(PoolRunner::new(2, Duration::from_secs(5)));
        let mut jobs = tokio::task::JoinSet::new();
        for _ in 0..6 {
            let runner = Arc::clone(&runner);
            let embedder = Arc::clone(&embedder);
            jobs.spawn(async move { runner.run(embedder, request()).await });
        }
        while let Some(joined) = jobs.join_next().await {
            assert!(joined.expect("task").is_ok());
        }

        assert!(peak.load(Ordering::SeqCst) <= 2, "at most two workers at once");
        assert_eq!(runner.available_workers(), 2);
    }

    #[tokio::test]
    async fn pool_runner_surfaces_panic_as_error() {
        let embedder = embedder_fn(|_| panic!("model weights missing"));

        let runner = PoolRunner::new(1, Duration::from_secs(5));
        assert_matches!(
            runner.run(embedder, request()).await,
            Err(RunnerError::Panicked(msg)) if msg.contains("model weights missing")
        );
        // The slot is released even though the routine panicked.
        assert_eq!(runner.available_workers(), 1);
    }

    #[tokio::test]
    async fn pool_runner_times_out_and_holds_slot_until_work_ends() {
        let embedder = embedder_fn(|_| {
            std::thread::sleep(Duration::from_millis(400));
            Ok(one_face())
        });

        let runner = PoolRunner::new(1, Duration::from_millis(50));
        assert_matches!(
            runner.run(embedder, request()).await,
            Err(RunnerError::Timeout { .. })
        );
        assert_eq!(runner.available_workers(), 0);

        tokio::time::sleep(Duration::from_millis(800)).await;
        assert_eq!(runner.available_workers(), 1);
    }

    #[tokio::test]
    async fn closed_pool_rejects_work() {
        let runner = PoolRunner::new(2, Duration::from_secs(5));
        runner.close();

        assert!(runner.is_closed());
        assert_matches!(
            runner.run(ok_embedder(), request()).await,
            Err(RunnerError::Closed)
        );
    }

    #[test]
    fn zero_workers_is_clamped_to_one() {
        let runner = PoolRunner::new(0, DEFAULT_TIMEOUT);
        assert_eq!(runner.max_workers(), 1);
        assert_eq!(runner.timeout(), DEFAULT_TIMEOUT);
    }
}
