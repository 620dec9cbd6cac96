//! # rowbind-testing
//!
//! An in-memory driver for exercising rowbind without a database server.
//!
//! [`MemDriver`] implements the driver boundary over a small SQL engine:
//! `CREATE [TEMPORARY] TABLE`, `DROP TABLE [IF EXISTS]`, `INSERT`,
//! `UPDATE`, `DELETE` and `SELECT` with conjunctive `WHERE` clauses,
//! cross joins and `ORDER BY`. Sessions are transactional: writes are
//! invisible to other connections until committed, and a rollback (or a
//! disconnect with work pending) discards them.
//!
//! Every driver call is counted in [`MemStats`], so tests can assert how
//! many binds, executes and fetches an operation issued. Faults can be
//! armed to make the next connect or execute fail, optionally marking the
//! connection dead.
//!
//! ## Example
//!
//! ```rust,ignore
//! use rowbind_client::TypedStatement;
//! use rowbind_testing::MemDriver;
//!
//! let driver = MemDriver::new();
//! let mut conn = driver.connection()?;
//! conn.execute("CREATE TABLE t (id INTEGER NOT NULL, PRIMARY KEY (id))")?;
//!
//! let mut insert: TypedStatement<(i32,), ()> =
//!     TypedStatement::prepare(&mut conn, "INSERT INTO t (id) VALUES (?)")?;
//! insert.params_mut().0 = 1;
//! insert.exec()?;
//! conn.commit()?;
//!
//! assert_eq!(driver.rows("t").map(|rows| rows.len()), Some(1));
//! assert_eq!(driver.stats().executes, 2);
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

mod convert;
pub mod driver;
mod engine;
pub mod parser;
pub mod stats;

pub use driver::{CONNECTION_STRING, DEFAULT_DBMS_NAME, MemDriver};
pub use stats::MemStats;
