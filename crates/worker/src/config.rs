//! Process configuration built once at startup from environment variables.
//!
//! Both binaries construct these structs in `main` and hand them to the
//! components that need them. Nothing here is cached globally.

use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use facecheck_core::runner::DEFAULT_TIMEOUT;

/// Default external representation program.
pub const DEFAULT_EMBED_COMMAND: &str = "python3 scripts/represent.py";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} has an invalid value {value:?}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// Message source
// ---------------------------------------------------------------------------

/// Where the worker reads queued requests from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MessageSource {
    /// Newline-delimited JSON on standard input.
    #[default]
    Stdin,
    /// Kafka consumer group (requires the `kafka` feature).
    Kafka,
}

impl FromStr for MessageSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stdin" => Ok(Self::Stdin),
            "kafka" => Ok(Self::Kafka),
            other => Err(format!("expected `stdin` or `kafka`, got `{other}`")),
        }
    }
}

// ---------------------------------------------------------------------------
// ServiceConfig
// ---------------------------------------------------------------------------

/// Settings shared by the worker and the HTTP server.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Postgres DSN. `None` selects the in-memory store.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    /// Directory uploaded images are written to.
    pub storage_path: PathBuf,
    /// Size of the embedding pool.
    pub max_workers: usize,
    pub embed_timeout: Duration,
    /// Whitespace-separated program and arguments.
    pub embed_command: String,
}

impl ServiceConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var              | Default                        |
    /// |----------------------|--------------------------------|
    /// | `DATABASE_URL`       | unset (in-memory storage)      |
    /// | `DB_MAX_CONNECTIONS` | `10`                           |
    /// | `STORAGE_PATH`       | `uploads`                      |
    /// | `RUNNER_MAX_WORKERS` | available parallelism          |
    /// | `EMBED_TIMEOUT_SECS` | `120`                          |
    /// | `EMBED_COMMAND`      | `python3 scripts/represent.py` |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").filter(|v| !v.trim().is_empty());

        let db_max_connections = parse_or(
            &lookup,
            "DB_MAX_CONNECTIONS",
            facecheck_db::DEFAULT_MAX_CONNECTIONS,
        )?;

        let storage_path = lookup("STORAGE_PATH")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("uploads"));

        let default_workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let max_workers: usize = parse_or(&lookup, "RUNNER_MAX_WORKERS", default_workers)?;
        if max_workers == 0 {
            return Err(ConfigError::Invalid {
                name: "RUNNER_MAX_WORKERS",
                value: "0".into(),
                reason: "must be at least 1".into(),
            });
        }

        let timeout_secs = parse_or(&lookup, "EMBED_TIMEOUT_SECS", DEFAULT_TIMEOUT.as_secs())?;

        let embed_command = lookup("EMBED_COMMAND").unwrap_or_else(|| DEFAULT_EMBED_COMMAND.into());
        if embed_command.split_whitespace().next().is_none() {
            return Err(ConfigError::Invalid {
                name: "EMBED_COMMAND",
                value: embed_command,
                reason: "must name a program".into(),
            });
        }

        Ok(Self {
            database_url,
            db_max_connections,
            storage_path,
            max_workers,
            embed_timeout: Duration::from_secs(timeout_secs),
            embed_command,
        })
    }
}

// ---------------------------------------------------------------------------
// QueueConfig
// ---------------------------------------------------------------------------

/// Message queue connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    pub source: MessageSource,
    /// `host:port` list passed to the client as-is.
    pub brokers: String,
    pub topics: Vec<String>,
    pub group_id: String,
}

impl QueueConfig {
    /// | Env Var          | Default          |
    /// |------------------|------------------|
    /// | `MESSAGE_SOURCE` | `stdin`          |
    /// | `KAFKA_BROKERS`  | `localhost:9092` |
    /// | `KAFKA_TOPICS`   | `faces`          |
    /// | `KAFKA_GROUP_ID` | `facecheck`      |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let source = parse_or(&lookup, "MESSAGE_SOURCE", MessageSource::default())?;
        let brokers = lookup("KAFKA_BROKERS").unwrap_or_else(|| "localhost:9092".into());

        let raw_topics = lookup("KAFKA_TOPICS").unwrap_or_else(|| "faces".into());
        let topics: Vec<String> = raw_topics
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if topics.is_empty() {
            return Err(ConfigError::Invalid {
                name: "KAFKA_TOPICS",
                value: raw_topics,
                reason: "at least one topic is required".into(),
            });
        }

        let group_id = lookup("KAFKA_GROUP_ID").unwrap_or_else(|| "facecheck".into());

        Ok(Self {
            source,
            brokers,
            topics,
            group_id,
        })
    }
}

fn parse_or<T, F>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            value,
            reason: e.to_string(),
        }),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
