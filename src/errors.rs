// src/errors.rs

//! Error type shared by the whole crate.
//!
//! Worker failures are not errors: they are [`WorkerOutcome`]s booked by the
//! retry logic. A `TaskloopError` means a collaborator (config, task source,
//! process spawning) did not work at all.
//!
//! [`WorkerOutcome`]: crate::exec::WorkerOutcome

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TaskloopError {
    /// Invalid or inconsistent configuration value.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// The task tracker failed or returned something unreadable.
    #[error("Task source error: {0}")]
    SourceError(String),

    /// A worker could not be started or waited on.
    #[error("Worker error: {0}")]
    WorkerError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TaskloopError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        TaskloopError::ConfigError(msg.into())
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, TaskloopError>;
