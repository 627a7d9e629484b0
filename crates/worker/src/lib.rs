//! Queue-driven face verification worker.
//!
//! Exposes configuration, service wiring, the serial [`Consumer`] loop and
//! its message sources so that the HTTP server and the worker binary build
//! the verification service the same way.

pub mod bootstrap;
pub mod config;
pub mod consumer;
#[cfg(feature = "kafka")]
pub mod kafka;
pub mod message;
pub mod source;
pub mod telemetry;
pub mod uploads;

pub use bootstrap::{bootstrap, Services};
pub use config::{ConfigError, MessageSource, QueueConfig, ServiceConfig};
pub use consumer::{Consumer, ConsumerStats};
