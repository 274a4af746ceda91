//! Error types for the coldstart bootstrap.

use std::path::PathBuf;

use thiserror::Error;

/// Configuration-related errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),
}

/// Per-attempt download failures.
///
/// Absorbed by the fetcher's retry loop; they surface as a failed
/// `DownloadOutcome`, never as a crate error.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} for {url}")]
    Status { status: u16, url: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{tool} exited with {status}")]
    Tool {
        tool: &'static str,
        status: std::process::ExitStatus,
    },
}

/// Shard merge failures.
///
/// Advisory: the pipeline logs them and continues with the asset missing.
#[derive(Error, Debug)]
pub enum MergeError {
    #[error("failed to read shard index {path}: {reason}")]
    ManifestUnreadable { path: PathBuf, reason: String },

    #[error("shard listed in index is missing: {path}")]
    MissingShard { path: PathBuf },

    #[error("failed to load shard {path}: {reason}")]
    ShardUnreadable { path: PathBuf, reason: String },

    #[error("tensor {name} appears in both {first} and {second}")]
    TensorConflict {
        name: String,
        first: String,
        second: String,
    },

    #[error("failed to serialize merged tensors: {0}")]
    Serialize(String),

    #[error("failed to write merged file: {0}")]
    WriteFailed(#[source] std::io::Error),
}

/// Service lifecycle failures. All variants are fatal to a bootstrap.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("failed to spawn {command}: {source}")]
    SpawnFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("service exited during startup with {status}")]
    ExitedEarly { status: std::process::ExitStatus },

    #[error("service not ready after {waited_secs}s at {url}")]
    Unresponsive { url: String, waited_secs: u64 },
}

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("failed to launch handler {command}: {source}")]
    Handoff {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
