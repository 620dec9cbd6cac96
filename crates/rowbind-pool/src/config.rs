//! Pool configuration.

use crate::error::PoolError;

/// How a pool hands out bundles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PoolPolicy {
    /// One bundle per calling thread, created on the thread's first acquire.
    /// Acquiring never blocks.
    #[default]
    ThreadLocal,
    /// `size` bundles shared by all threads. Acquiring blocks while all of
    /// them are leased.
    FixedSize {
        /// Number of bundles.
        size: usize,
    },
}

/// Configuration for a connection pool.
#[derive(Debug, Clone, Default)]
pub struct PoolConfig {
    /// Leasing policy.
    pub policy: PoolPolicy,
}

impl PoolConfig {
    /// Create a new pool configuration with the thread-local policy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use one bundle per thread.
    #[must_use]
    pub fn thread_local(mut self) -> Self {
        self.policy = PoolPolicy::ThreadLocal;
        self
    }

    /// Use `size` shared bundles.
    #[must_use]
    pub fn fixed_size(mut self, size: usize) -> Self {
        self.policy = PoolPolicy::FixedSize { size };
        self
    }

    /// Maximum number of bundles, if the policy bounds it.
    #[must_use]
    pub fn max_bundles(&self) -> Option<usize> {
        match self.policy {
            PoolPolicy::ThreadLocal => None,
            PoolPolicy::FixedSize { size } => Some(size),
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), PoolError> {
        if let PoolPolicy::FixedSize { size: 0 } = self.policy {
            return Err(PoolError::InvalidConfig(
                "fixed pool size must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

/// `None` selects the thread-local policy, `Some(n)` a fixed pool of `n`.
impl From<Option<usize>> for PoolConfig {
    fn from(size: Option<usize>) -> Self {
        match size {
            None => Self::new().thread_local(),
            Some(size) => Self::new().fixed_size(size),
        }
    }
}
