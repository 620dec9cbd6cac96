//! Connection pool implementation.
//!
//! A pool hands out exclusive leases on bundles: a connection together with
//! the statements prepared on it. Two policies share the same lease
//! protocol:
//!
//! - **Thread-local**: each thread owns one bundle, created on its first
//!   acquire and closed when the thread exits. Acquiring never blocks.
//! - **Fixed size**: `N` slots are allocated up front and shared by all
//!   threads. Acquiring pops a free slot or blocks until a lease is dropped.
//!
//! Connections are opened lazily, the first time a lease runs an action on
//! a slot, so building a pool does not touch the data source.

use std::cell::RefCell;
use std::sync::{Arc, Weak};
use std::thread::ThreadId;
use std::time::{Duration, Instant};

use hashbrown::HashMap;
use parking_lot::{Condvar, Mutex};
use rowbind_client::{Config, Connection, Driver, Environment};

use crate::config::{PoolConfig, PoolPolicy};
use crate::error::PoolError;
use crate::lifecycle::{ConnectionMetadata, Slot, Statements};

/// A connection pool.
///
/// The pool is a cheap handle around shared state; clone it to share
/// between threads.
///
/// # Example
///
/// ```rust,ignore
/// use rowbind_pool::Pool;
///
/// let pool: Pool = Pool::new(driver, "DSN=app;UID=app;PWD=secret", Some(4))?;
///
/// let mut lease = pool.acquire()?;
/// lease.run(|conn, _| {
///     conn.execute("DELETE FROM sessions")?;
///     conn.commit()
/// })?;
/// ```
pub struct Pool<S: Statements = ()> {
    inner: Arc<PoolInner<S>>,
}

struct PoolInner<S> {
    /// Pool configuration.
    config: PoolConfig,

    /// Options applied to every connection.
    client_config: Config,

    /// Driver environment; opens are serialized inside.
    environment: Environment,

    /// Bundle slots.
    slots: Slots<S>,

    /// When the pool was created.
    created_at: Instant,

    /// Pool metrics.
    metrics: Mutex<PoolMetricsInner>,
}

enum Slots<S> {
    /// One slot per thread; `None` while that thread holds its lease.
    ThreadLocal(Mutex<HashMap<ThreadId, Option<Slot<S>>>>),
    /// Free list of a fixed number of slots.
    Fixed {
        idle: Mutex<Vec<Slot<S>>>,
        returned: Condvar,
        size: usize,
    },
}

/// Internal metrics tracking.
#[derive(Debug, Default)]
struct PoolMetricsInner {
    /// Total connections created.
    connections_created: u64,
    /// Connections dropped after being found dead.
    connections_discarded: u64,
    /// Failed connection attempts.
    connection_failures: u64,
    /// Leases handed out.
    leases_granted: u64,
    /// Acquires that had to wait for a release.
    lease_waits: u64,
}

impl Pool {
    /// Create a new pool builder.
    #[must_use]
    pub fn builder() -> PoolBuilder {
        PoolBuilder::new()
    }
}

impl<S: Statements> Pool<S> {
    /// Create a pool for `connection_string`: thread-local when `size` is
    /// `None`, otherwise a fixed pool of `size` bundles.
    pub fn new(
        driver: Arc<dyn Driver>,
        connection_string: &str,
        size: Option<usize>,
    ) -> Result<Self, PoolError> {
        let client_config = Config::from_connection_string(connection_string)?;
        Self::with_config(driver, client_config, PoolConfig::from(size))
    }

    /// Create a pool from explicit client and pool configurations.
    pub fn with_config(
        driver: Arc<dyn Driver>,
        client_config: Config,
        config: PoolConfig,
    ) -> Result<Self, PoolError> {
        config.validate()?;
        client_config.validate()?;

        let slots = match config.policy {
            PoolPolicy::ThreadLocal => Slots::ThreadLocal(Mutex::new(HashMap::new())),
            PoolPolicy::FixedSize { size } => Slots::Fixed {
                idle: Mutex::new((0..size).map(|_| Slot::default()).collect()),
                returned: Condvar::new(),
                size,
            },
        };

        tracing::info!(policy = ?config.policy, "connection pool created");

        Ok(Self {
            inner: Arc::new(PoolInner {
                config,
                client_config,
                environment: Environment::new(driver),
                slots,
                created_at: Instant::now(),
                metrics: Mutex::new(PoolMetricsInner::default()),
            }),
        })
    }

    /// Lease a bundle.
    ///
    /// On a fixed pool this blocks until a bundle is free; there is no
    /// timeout. On a thread-local pool it never blocks, but fails with
    /// [`PoolError::AlreadyLeased`] if the calling thread still holds its
    /// lease.
    pub fn acquire(&self) -> Result<Lease<'_, S>, PoolError> {
        let thread = std::thread::current().id();
        let slot = match &self.inner.slots {
            Slots::ThreadLocal(slots) => {
                let mut slots = slots.lock();
                if !slots.contains_key(&thread) {
                    slots.insert(thread, Some(Slot::default()));
                    let pool: Weak<dyn ThreadRelease> = Arc::<PoolInner<S>>::downgrade(&self.inner);
                    register_thread_exit(thread, pool);
                }
                slots
                    .get_mut(&thread)
                    .and_then(Option::take)
                    .ok_or(PoolError::AlreadyLeased)?
            }
            Slots::Fixed { idle, returned, .. } => {
                let mut idle = idle.lock();
                let mut waited = false;
                loop {
                    if let Some(slot) = idle.pop() {
                        break slot;
                    }
                    if !waited {
                        waited = true;
                        self.inner.metrics.lock().lease_waits += 1;
                        tracing::debug!("waiting for a pooled connection");
                    }
                    returned.wait(&mut idle);
                }
            }
        };

        self.inner.metrics.lock().leases_granted += 1;
        tracing::trace!(
            connection_id = slot.metadata().map(|m| m.id),
            "lease acquired"
        );
        Ok(Lease {
            pool: &self.inner,
            slot,
            thread,
        })
    }

    /// Acquire a lease, run `action` on it and release it.
    pub fn run<R, E, F>(&self, action: F) -> Result<R, E>
    where
        F: FnOnce(&mut Connection, &mut S) -> Result<R, E>,
        E: From<PoolError> + From<rowbind_client::Error>,
    {
        let mut lease = self.acquire()?;
        lease.run(action)
    }

    /// Get the current pool status.
    #[must_use]
    pub fn status(&self) -> PoolStatus {
        match &self.inner.slots {
            Slots::ThreadLocal(slots) => {
                let slots = slots.lock();
                let in_use = slots.values().filter(|slot| slot.is_none()).count();
                PoolStatus {
                    available: slots.len() - in_use,
                    in_use,
                    total: slots.len(),
                    max: None,
                }
            }
            Slots::Fixed { idle, size, .. } => {
                let available = idle.lock().len();
                PoolStatus {
                    available,
                    in_use: size - available,
                    total: *size,
                    max: Some(*size),
                }
            }
        }
    }

    /// Get pool metrics.
    #[must_use]
    pub fn metrics(&self) -> PoolMetrics {
        let inner = self.inner.metrics.lock();
        PoolMetrics {
            connections_created: inner.connections_created,
            connections_discarded: inner.connections_discarded,
            connection_failures: inner.connection_failures,
            leases_granted: inner.leases_granted,
            lease_waits: inner.lease_waits,
            uptime: self.inner.created_at.elapsed(),
        }
    }

    /// Get the pool configuration.
    #[must_use]
    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    /// Options applied to every pooled connection.
    #[must_use]
    pub fn client_config(&self) -> &Config {
        &self.inner.client_config
    }
}

/// A pool holding bundles owned by individual threads.
trait ThreadRelease {
    /// Drop the bundle of `thread`, which is exiting.
    fn release_thread(&self, thread: ThreadId);
}

impl<S: Statements> ThreadRelease for PoolInner<S> {
    fn release_thread(&self, thread: ThreadId) {
        let Slots::ThreadLocal(slots) = &self.slots else {
            return;
        };
        let released = slots.lock().remove(&thread).flatten();
        if let Some(slot) = released {
            tracing::debug!(
                connection_id = slot.metadata().map(|m| m.id),
                "thread exited, bundle released"
            );
        }
    }
}

/// Releases the current thread's bundles from every thread-local pool it
/// used when the thread exits.
struct ThreadExit {
    thread: ThreadId,
    pools: Vec<Weak<dyn ThreadRelease>>,
}

impl Drop for ThreadExit {
    fn drop(&mut self) {
        for pool in self.pools.drain(..) {
            if let Some(pool) = pool.upgrade() {
                pool.release_thread(self.thread);
            }
        }
    }
}

thread_local! {
    static THREAD_EXIT: RefCell<Option<ThreadExit>> = const { RefCell::new(None) };
}

fn register_thread_exit(thread: ThreadId, pool: Weak<dyn ThreadRelease>) {
    // fails only while the thread is already tearing down
    let _ = THREAD_EXIT.try_with(|exit| {
        exit.borrow_mut()
            .get_or_insert_with(|| ThreadExit {
                thread,
                pools: Vec::new(),
            })
            .pools
            .push(pool);
    });
}

impl<S: Statements> Clone for Pool<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: Statements> std::fmt::Debug for Pool<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("config", &self.inner.config)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

/// An exclusive checkout of one bundle.
///
/// Dropping the lease returns the bundle to the pool and wakes one waiter.
pub struct Lease<'p, S: Statements> {
    pool: &'p PoolInner<S>,
    slot: Slot<S>,
    thread: ThreadId,
}

impl<S: Statements> Lease<'_, S> {
    /// Run `action` on the bundle's connection and statements.
    ///
    /// The connection is opened on first use. If `action` fails and the
    /// connection reports itself dead, the bundle is discarded so the next
    /// lease opens a fresh one; the error is returned either way.
    pub fn run<R, E, F>(&mut self, action: F) -> Result<R, E>
    where
        F: FnOnce(&mut Connection, &mut S) -> Result<R, E>,
        E: From<rowbind_client::Error>,
    {
        let fresh = !self.slot.is_materialized();
        let bundle = match self
            .slot
            .materialize(&self.pool.environment, &self.pool.client_config)
        {
            Ok(bundle) => bundle,
            Err(e) => {
                self.pool.metrics.lock().connection_failures += 1;
                tracing::debug!(error = %e, "pooled connection could not be opened");
                return Err(e.into());
            }
        };
        if fresh {
            self.pool.metrics.lock().connections_created += 1;
        }

        bundle.metadata.touch();
        let result = action(&mut bundle.connection, &mut bundle.statements);

        if result.is_err() && self.slot.discard_if_dead() {
            self.pool.metrics.lock().connections_discarded += 1;
        }
        result
    }

    /// Metadata of the leased connection, if it has been opened.
    #[must_use]
    pub fn metadata(&self) -> Option<&ConnectionMetadata> {
        self.slot.metadata()
    }

    /// Whether the leased bundle has an open connection.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.slot.is_materialized()
    }
}

impl<S: Statements> Drop for Lease<'_, S> {
    fn drop(&mut self) {
        let slot = std::mem::take(&mut self.slot);
        tracing::trace!(
            connection_id = slot.metadata().map(|m| m.id),
            "lease released"
        );
        match &self.pool.slots {
            Slots::ThreadLocal(slots) => {
                let orphan = match slots.lock().get_mut(&self.thread) {
                    Some(entry) => {
                        *entry = Some(slot);
                        None
                    }
                    None => Some(slot),
                };
                // the owning thread has exited; close the bundle outside the lock
                drop(orphan);
            }
            Slots::Fixed { idle, returned, .. } => {
                idle.lock().push(slot);
                returned.notify_one();
            }
        }
    }
}

impl<S: Statements> std::fmt::Debug for Lease<'_, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lease")
            .field("metadata", &self.slot.metadata())
            .field("thread", &self.thread)
            .finish_non_exhaustive()
    }
}

/// Builder for creating a connection pool.
///
/// # Example
///
/// ```rust,ignore
/// let pool: Pool<AppStatements> = Pool::builder()
///     .connection_string("DSN=app")
///     .fixed_size(8)
///     .build(driver)?;
/// ```
#[derive(Debug, Default)]
pub struct PoolBuilder {
    pool_config: PoolConfig,
    client_config: Option<Config>,
    connection_string: Option<String>,
}

impl PoolBuilder {
    /// Create a new pool builder with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the pool configuration.
    #[must_use]
    pub fn pool_config(mut self, config: PoolConfig) -> Self {
        self.pool_config = config;
        self
    }

    /// One bundle per thread.
    #[must_use]
    pub fn thread_local(mut self) -> Self {
        self.pool_config = self.pool_config.thread_local();
        self
    }

    /// A fixed number of shared bundles.
    #[must_use]
    pub fn fixed_size(mut self, size: usize) -> Self {
        self.pool_config = self.pool_config.fixed_size(size);
        self
    }

    /// Set the client configuration used for every connection.
    #[must_use]
    pub fn config(mut self, config: Config) -> Self {
        self.client_config = Some(config);
        self
    }

    /// Set the connection string; parsed when the pool is built. Ignored if
    /// a full [`config`](Self::config) is given.
    #[must_use]
    pub fn connection_string(mut self, connection_string: impl Into<String>) -> Self {
        self.connection_string = Some(connection_string.into());
        self
    }

    /// Build the pool.
    pub fn build<S: Statements>(self, driver: Arc<dyn Driver>) -> Result<Pool<S>, PoolError> {
        let client_config = match (self.client_config, self.connection_string) {
            (Some(config), _) => config,
            (None, Some(connection_string)) => Config::from_connection_string(&connection_string)?,
            (None, None) => {
                return Err(PoolError::InvalidConfig(
                    "no connection string or client configuration given".into(),
                ));
            }
        };
        Pool::with_config(driver, client_config, self.pool_config)
    }
}

/// Status information about the pool.
#[derive(Debug, Clone, Copy)]
pub struct PoolStatus {
    /// Number of bundles free to lease.
    pub available: usize,
    /// Number of bundles currently leased.
    pub in_use: usize,
    /// Number of bundle slots.
    pub total: usize,
    /// Maximum number of bundles, if bounded.
    pub max: Option<usize>,
}

impl PoolStatus {
    /// Calculate the utilization percentage.
    #[must_use]
    pub fn utilization(&self) -> f64 {
        let capacity = self.max.unwrap_or(self.total);
        if capacity == 0 {
            return 0.0;
        }
        (self.in_use as f64 / capacity as f64) * 100.0
    }

    /// Check if every bundle is leased.
    #[must_use]
    pub fn is_at_capacity(&self) -> bool {
        self.max.is_some_and(|max| self.in_use >= max)
    }
}

/// Metrics collected from the pool.
#[derive(Debug, Clone)]
pub struct PoolMetrics {
    /// Total connections created since pool start.
    pub connections_created: u64,
    /// Connections discarded after being found dead.
    pub connections_discarded: u64,
    /// Connection attempts that failed.
    pub connection_failures: u64,
    /// Leases handed out.
    pub leases_granted: u64,
    /// Acquires that blocked waiting for a release.
    pub lease_waits: u64,
    /// Time since pool creation.
    pub uptime: Duration,
}

impl PoolMetrics {
    /// Calculate connection success rate (0.0 to 1.0).
    #[must_use]
    pub fn connection_success_rate(&self) -> f64 {
        let total = self.connections_created + self.connection_failures;
        if total == 0 {
            return 1.0;
        }
        self.connections_created as f64 / total as f64
    }

    /// Fraction of leases that had to wait (0.0 to 1.0).
    #[must_use]
    pub fn wait_rate(&self) -> f64 {
        if self.leases_granted == 0 {
            return 0.0;
        }
        self.lease_waits as f64 / self.leases_granted as f64
    }
}
