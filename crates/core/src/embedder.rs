//! The blocking face-embedding routine and its external-process adapter.
//!
//! [`Embedder`] is the opaque, blocking callable the verification service
//! hands to a [`Runner`](crate::runner::Runner). Its only inputs are the
//! primitive fields of [`RepresentRequest`], so an implementation can run in
//! an isolated worker with no shared state.
//!
//! [`CommandEmbedder`] is the production implementation: every call spawns
//! the configured representation program (a DeepFace wrapper by default),
//! pipes the request as JSON to stdin, and parses the JSON it prints.

use std::io::{Read, Write};
use std::process::{Child, Command, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use wait_timeout::ChildExt;

use crate::model::ModelName;
use crate::types::{EmbeddingVector, FaceRepresentation};

/// Maximum stdout or stderr size captured per stream (10 MiB).
const MAX_OUTPUT_BYTES: u64 = 10 * 1024 * 1024;

/// Longest stderr excerpt carried in an error message.
const MAX_STDERR_IN_ERROR: usize = 2048;

// ---------------------------------------------------------------------------
// Request / error
// ---------------------------------------------------------------------------

/// Arguments of a single representation call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepresentRequest {
    pub img_path: String,
    pub model_name: ModelName,
}

/// Failures of the embedding routine.
#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    /// Spawning or talking to the routine failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The routine ran but exited with a non-zero code.
    #[error("Embedding routine failed with exit code {exit_code}: {stderr}")]
    ExecutionFailed { exit_code: i32, stderr: String },

    /// The routine exceeded its timeout and was killed.
    #[error("Embedding routine timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    /// The request could not be serialized for the routine's stdin.
    #[error("Failed to encode embedding request: {0}")]
    Encode(#[source] serde_json::Error),

    /// Stdout was not a representation list or an error object.
    #[error("Malformed embedding output: {0}")]
    MalformedOutput(String),

    /// The routine reported its own error (e.g. no face could be detected).
    #[error("Embedding routine error: {0}")]
    Routine(String),

    /// The routine succeeded but returned no faces.
    #[error("No face found in {0}")]
    NoFace(String),
}

// ---------------------------------------------------------------------------
// Embedder
// ---------------------------------------------------------------------------

/// A blocking routine that turns an image into an [`EmbeddingVector`].
///
/// Implementations may block for a long time and must only be driven through
/// a [`Runner`](crate::runner::Runner).
pub trait Embedder: Send + Sync + 'static {
    fn represent(&self, request: &RepresentRequest) -> Result<EmbeddingVector, EmbedError>;
}

impl<F> Embedder for F
where
    F: Fn(&RepresentRequest) -> Result<EmbeddingVector, EmbedError> + Send + Sync + 'static,
{
    fn represent(&self, request: &RepresentRequest) -> Result<EmbeddingVector, EmbedError> {
        self(request)
    }
}

// ---------------------------------------------------------------------------
// CommandEmbedder
// ---------------------------------------------------------------------------

/// Runs the representation program as a child process per call.
#[derive(Debug, Clone)]
pub struct CommandEmbedder {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

/// What the representation program prints on stdout.
#[derive(Deserialize)]
#[serde(untagged)]
enum RoutineOutput {
    Faces(Vec<FaceRepresentation>),
    Failure { error: String },
}

impl CommandEmbedder {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }

    /// Build from a whitespace-separated command line such as
    /// `python3 scripts/represent.py`. Returns `None` for a blank line.
    pub fn from_command_line(command_line: &str, timeout: Duration) -> Option<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self::new(program, parts.collect(), timeout))
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn spawn(&self) -> Result<Child, EmbedError> {
        let child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;
        Ok(child)
    }
}

impl Embedder for CommandEmbedder {
    fn represent(&self, request: &RepresentRequest) -> Result<EmbeddingVector, EmbedError> {
        let payload = encode_request(request)?;
        let start = Instant::now();
        let mut child = self.spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            // The routine may exit before reading stdin; its exit status tells the story.
            let _ = stdin.write_all(&payload);
        }

        // Drain both pipes on their own threads so a chatty child never
        // blocks on a full pipe while we wait for it.
        let stdout_reader = spawn_reader(child.stdout.take());
        let stderr_reader = spawn_reader(child.stderr.take());

        let status = match child.wait_timeout(self.timeout)? {
            Some(status) => status,
            None => {
                let _ = child.kill();
                let _ = child.wait();
                let elapsed_ms = start.elapsed().as_millis() as u64;
                tracing::warn!(
                    img_path = %request.img_path,
                    elapsed_ms,
                    "Embedding routine timed out, killed"
                );
                return Err(EmbedError::Timeout { elapsed_ms });
            }
        };

        let stdout = stdout_reader.join().unwrap_or_default();
        let stderr = stderr_reader.join().unwrap_or_default();

        tracing::debug!(
            img_path = %request.img_path,
            model_name = %request.model_name,
            duration_ms = start.elapsed().as_millis() as u64,
            exit_code = ?status.code(),
            "Embedding routine finished"
        );

        if !status.success() {
            return Err(EmbedError::ExecutionFailed {
                exit_code: status.code().unwrap_or(-1),
                stderr: truncate(String::from_utf8_lossy(&stderr).trim()),
            });
        }

        parse_output(&stdout, &request.img_path)
    }
}

fn spawn_reader<R>(handle: Option<R>) -> JoinHandle<Vec<u8>>
where
    R: Read + Send + 'static,
{
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(h) = handle {
            let _ = h.take(MAX_OUTPUT_BYTES).read_to_end(&mut buf);
        }
        buf
    })
}

/// JSON document written to the routine's stdin.
fn encode_request(request: &RepresentRequest) -> Result<Vec<u8>, EmbedError> {
    serde_json::to_vec(request).map_err(EmbedError::Encode)
}

/// Interpret the routine's stdout.
fn parse_output(stdout: &[u8], img_path: &str) -> Result<EmbeddingVector, EmbedError> {
    match serde_json::from_slice::<RoutineOutput>(stdout) {
        Ok(RoutineOutput::Faces(faces)) if faces.is_empty() => {
            Err(EmbedError::NoFace(img_path.to_string()))
        }
        Ok(RoutineOutput::Faces(faces)) => Ok(EmbeddingVector::new(faces)),
        Ok(RoutineOutput::Failure { error }) => Err(EmbedError::Routine(error)),
        Err(e) => Err(EmbedError::MalformedOutput(e.to_string())),
    }
}

fn truncate(s: &str) -> String {
    if s.len() <= MAX_STDERR_IN_ERROR {
        return s.to_string();
    }
    let mut end = MAX_STDERR_IN_ERROR;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
