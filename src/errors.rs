// src/errors.rs

//! Crate-wide error types and the `Result` alias.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// Failures raised by the dependency graph algorithms.
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("node '{key}' failed to build: {source:#}")]
    Build {
        key: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("input {index} of '{key}' has not been computed yet")]
    NotComputed { key: String, index: usize },

    #[error("input {index} of '{key}' does not hold a value of the requested type")]
    TypeMismatch { key: String, index: usize },

    #[error("'{key}' has no input {index} (it has {len})")]
    NoSuchInput { key: String, index: usize, len: usize },

    #[error("'{parent}' does not list '{child}' as a child")]
    MissingEdge { parent: String, child: String },
}

/// Failures of the file watching layer.
#[derive(Error, Debug)]
pub enum WatchError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("file watch error: {0}")]
    Notify(#[from] notify::Error),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("watch task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Error carried by a resolved [`Pending`](crate::asynchronous::Pending).
///
/// Shared futures hand the same output to every awaiter, so the error has to
/// be cheap to clone.
#[derive(Debug, Clone)]
pub struct AsyncError(Arc<anyhow::Error>);

impl AsyncError {
    pub fn new(err: impl Into<anyhow::Error>) -> Self {
        Self(Arc::new(err.into()))
    }

    pub fn inner(&self) -> &anyhow::Error {
        &self.0
    }
}

impl From<anyhow::Error> for AsyncError {
    fn from(err: anyhow::Error) -> Self {
        Self(Arc::new(err))
    }
}

impl From<GraphError> for AsyncError {
    fn from(err: GraphError) -> Self {
        Self::new(err)
    }
}

impl fmt::Display for AsyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#}", self.0)
    }
}

impl std::error::Error for AsyncError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.chain().nth(1)
    }
}

#[derive(Error, Debug)]
pub enum IncrError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Cycle detected in target graph: {0}")]
    DagCycle(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Watch(#[from] WatchError),

    #[error(transparent)]
    Async(#[from] AsyncError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, IncrError>;
