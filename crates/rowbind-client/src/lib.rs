//! # rowbind-client
//!
//! Typed statements, statement caching and transactions over a call-level
//! database interface.
//!
//! Parameters and result columns are described as Rust tuples (or structs
//! deriving `Record`). A statement binds their slots once and only rebinds
//! when a bulk buffer moves or changes length, so the hot path of
//! execute/fetch makes no redundant driver calls.
//!
//! ## Features
//!
//! - **Typed statements**: [`TypedStatement`] (one row in, one row out),
//!   [`BatchStatement`] (parameter arrays), [`CursorStatement`] (block fetch)
//!   and [`StagedStatement`] (bulk parameters through a temporary table)
//! - **Statement cache**: [`StatementCache`] prepares one statement per
//!   `(operation, column set)` and reuses it for the connection's lifetime
//! - **Tables**: [`Table`] generates and caches the statements for typed
//!   CRUD operations over projections of a record
//! - **Transactions**: [`Transaction`] rolls back unless committed
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use rowbind_client::{Config, CursorStatement, Environment, FixedString, Transaction};
//!
//! let env = Environment::new(Arc::new(driver));
//! let mut conn = env.connect(&Config::from_connection_string("DSN=app;UID=app;PWD=secret")?)?;
//!
//! let mut stmt: CursorStatement<(i16,), (i32, FixedString<32>)> =
//!     CursorStatement::prepare(&mut conn, "SELECT id, name FROM users WHERE age > ?", 128)?;
//! stmt.params_mut().0 = 18;
//! for row in stmt.iter()? {
//!     let (id, name) = row?;
//!     println!("{id}: {name}");
//! }
//!
//! let mut tx = Transaction::begin(&mut conn);
//! tx.execute("DELETE FROM sessions")?;
//! tx.commit()?;
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod binding;
pub mod config;
pub mod connection;
pub mod error;
pub mod result_set;
pub mod sql;
pub mod staged;
pub mod statement;
pub mod statement_cache;
pub mod table;
pub mod transaction;
pub mod typed;

// Re-export commonly used types
pub use binding::{Shape, StatementState};
pub use config::Config;
pub use connection::{Connection, Environment};
pub use error::{Error, Result};
pub use result_set::{RowSource, Rows};
pub use rowbind_driver::{Dbms, Diagnostic, Driver, IsolationLevel, SqlState};
pub use rowbind_types::{
    Cell, ColumnType, FixedString, NamedRecord, Nullable, Number, Record, SqlType, SqlValue,
    Timestamp, TypeError, TypeTag,
};
pub use sql::CreateFlags;
pub use staged::StagedStatement;
pub use statement::Statement;
pub use statement_cache::{CacheKey, CacheStats, ColumnSet, OperationKind, StatementCache};
pub use table::Table;
pub use transaction::Transaction;
pub use typed::{BatchStatement, CursorStatement, TypedStatement};
