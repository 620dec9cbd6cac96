//! Pool error types.

use thiserror::Error;

/// Errors that can occur while configuring or using a pool.
#[derive(Debug, Error)]
pub enum PoolError {
    /// The pool configuration is invalid.
    #[error("invalid pool configuration: {0}")]
    InvalidConfig(String),

    /// The calling thread already holds the lease of a thread-local pool.
    #[error("thread already holds a lease on this pool")]
    AlreadyLeased,

    /// Opening or preparing a connection failed.
    #[error(transparent)]
    Client(#[from] rowbind_client::Error),
}

impl PoolError {
    /// Whether the error was caused by an unreachable or broken data source.
    #[must_use]
    pub fn is_connection_failure(&self) -> bool {
        matches!(self, Self::Client(e) if e.is_connection_failure())
    }
}
