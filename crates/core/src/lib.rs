//! Face verification core.
//!
//! Pure domain logic with no database or HTTP dependencies:
//!
//! - [`types`]: messages, embedding vectors, users.
//! - [`model`]: the closed set of supported recognition models.
//! - [`validation`]: precondition checks.
//! - [`embedder`]: the blocking embedding routine and its process adapter.
//! - [`runner`]: inline and bounded-pool execution strategies.
//! - [`storage`]: the upsert seam plus an in-memory store.
//! - [`service`]: the verification orchestration.

pub mod embedder;
pub mod error;
pub mod model;
pub mod runner;
pub mod service;
pub mod storage;
pub mod types;
pub mod validation;

pub use error::CoreError;
pub use service::{VerificationOutcome, VerificationService};
