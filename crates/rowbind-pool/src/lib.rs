//! # rowbind-pool
//!
//! Connection pool for rowbind with thread-local and fixed-size policies.
//!
//! A pool leases out bundles: one connection plus the statements prepared
//! on it (any type implementing [`Statements`], such as a struct of
//! [`Table`](rowbind_client::Table)s or a
//! [`StatementCache`](rowbind_client::StatementCache)). Leases are
//! exclusive, so the statements of a bundle are never used by two threads
//! at once.
//!
//! ## Features
//!
//! - Thread-local policy: one bundle per thread, released when the thread
//!   exits; acquiring never blocks
//! - Fixed-size policy: `N` bundles, acquiring blocks until one is free
//! - Lazy connection: a bundle's connection is opened on its first use
//! - Dead connection replacement: a bundle whose connection died during a
//!   failed action is discarded and rebuilt by the next lease
//! - Status and metrics for observability
//!
//! ## Example
//!
//! ```rust,ignore
//! use rowbind_client::{Connection, Table};
//! use rowbind_pool::{Pool, Statements};
//!
//! struct AppStatements {
//!     users: Table<(i32, FixedString<32>)>,
//! }
//!
//! impl Statements for AppStatements {
//!     fn prepare(_conn: &mut Connection) -> rowbind_client::Result<Self> {
//!         Ok(Self { users: Table::new("users", &["id", "name"], &[0])? })
//!     }
//! }
//!
//! let pool: Pool<AppStatements> = Pool::builder()
//!     .connection_string("DSN=app")
//!     .fixed_size(4)
//!     .build(driver)?;
//!
//! let user = pool.run(|conn, stmts| -> Result<_, PoolError> {
//!     Ok(stmts.users.select(conn, &(42,))?)
//! })?;
//!
//! let status = pool.status();
//! println!("Pool utilization: {:.1}%", status.utilization());
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod pool;

// Configuration
pub use config::{PoolConfig, PoolPolicy};

// Error types
pub use error::PoolError;

// Pool types
pub use pool::{Lease, Pool, PoolBuilder, PoolMetrics, PoolStatus};

// Lifecycle management
pub use lifecycle::{ConnectionMetadata, Statements};
