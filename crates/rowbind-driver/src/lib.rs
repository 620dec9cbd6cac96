//! # rowbind-driver
//!
//! The capability boundary between rowbind and a call-level database
//! interface.
//!
//! A [`Driver`] opens [`DriverConnection`]s from a connection string; a
//! connection prepares [`DriverStatement`]s. Every call reports failure as a
//! [`Diagnostic`] carrying a five character state code and the native error
//! number of the data source. Parameter and result values are exchanged
//! through [`BindBuffer`]s: row-major runs of [`Cell`](rowbind_types::Cell)s
//! whose address and row count are what a statement is bound to.
//!
//! This crate contains no I/O. Implementations wrap a real driver manager
//! or, for tests, an in-memory engine.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod buffer;
pub mod dbms;
pub mod diagnostic;
pub mod isolation;
pub mod traits;

pub use buffer::BindBuffer;
pub use dbms::Dbms;
pub use diagnostic::{Diagnostic, SqlState};
pub use isolation::IsolationLevel;
pub use traits::{Completion, ConnectionAttribute, Driver, DriverConnection, DriverStatement};
