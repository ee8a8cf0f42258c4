//! Error types for Palaver Core

use std::time::Duration;

use thiserror::Error;

/// Result type alias using Palaver Error
pub type Result<T> = std::result::Result<T, Error>;

/// Palaver error types
#[derive(Error, Debug)]
pub enum Error {
    /// Every pooled connection was busy or quarantined for the whole wait budget.
    #[error(
        "all {pool_size} connections are busy after waiting {elapsed:?} (timeout: {timeout:?})"
    )]
    PoolExhausted {
        pool_size: usize,
        elapsed: Duration,
        timeout: Duration,
    },

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Agent error: {0}")]
    Agent(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Operation cancelled")]
    Cancelled,
}

impl Error {
    /// Whether the caller can reasonably retry or queue the request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::PoolExhausted { .. })
    }
}
