//! Driver capability traits.

use rowbind_types::ColumnType;

use crate::buffer::BindBuffer;
use crate::diagnostic::Diagnostic;
use crate::isolation::IsolationLevel;

/// A connection attribute set through `SQLSetConnectAttr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionAttribute {
    /// `SQL_ATTR_AUTOCOMMIT`.
    AutoCommit(bool),
    /// `SQL_ATTR_ACCESS_MODE`.
    ReadOnly(bool),
    /// `SQL_ATTR_TXN_ISOLATION`.
    Isolation(IsolationLevel),
}

/// How `SQLEndTran` finishes the current transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Make the transaction's changes durable.
    Commit,
    /// Discard the transaction's changes.
    Rollback,
}

/// Opens physical connections.
///
/// Implementations share one environment between all connections; callers
/// serialize [`connect`](Self::connect) because that environment is not safe
/// for concurrent opens.
pub trait Driver: Send + Sync {
    /// Open a connection described by an ODBC-style connection string.
    fn connect(&self, connection_string: &str) -> Result<Box<dyn DriverConnection>, Diagnostic>;
}

/// One physical session with a data source.
///
/// A connection is used by one thread at a time; it may move between threads.
pub trait DriverConnection: Send {
    /// Prepare `sql` for repeated execution.
    fn prepare(&mut self, sql: &str) -> Result<Box<dyn DriverStatement>, Diagnostic>;

    /// Set a connection attribute.
    fn set_attribute(&mut self, attribute: ConnectionAttribute) -> Result<(), Diagnostic>;

    /// Commit or roll back the current transaction.
    fn end_transaction(&mut self, completion: Completion) -> Result<(), Diagnostic>;

    /// Query `SQL_ATTR_CONNECTION_DEAD`.
    fn is_dead(&self) -> bool;

    /// Query `SQL_DBMS_NAME`.
    fn dbms_name(&self) -> Result<String, Diagnostic>;

    /// Close the session. Further calls fail.
    fn disconnect(&mut self) -> Result<(), Diagnostic>;
}

/// A prepared statement handle.
///
/// Slots are numbered from 1. Parameter and row arrays default to one row
/// until [`bind_parameter_array`](Self::bind_parameter_array) or
/// [`bind_row_array`](Self::bind_row_array) sets another size.
pub trait DriverStatement: Send {
    /// Bind parameter `slot` to a buffer of type `column`.
    fn bind_parameter(&mut self, slot: u16, column: ColumnType) -> Result<(), Diagnostic>;

    /// Bind result column `slot` to a buffer of type `column`.
    fn bind_column(&mut self, slot: u16, column: ColumnType) -> Result<(), Diagnostic>;

    /// Set row-wise parameter array binding: `count` sets of `stride` slots.
    fn bind_parameter_array(&mut self, stride: usize, count: usize) -> Result<(), Diagnostic>;

    /// Set row-wise result array binding: up to `count` rows of `stride` slots
    /// per fetch.
    fn bind_row_array(&mut self, stride: usize, count: usize) -> Result<(), Diagnostic>;

    /// Execute once per bound parameter set, reading values from `params`.
    fn execute(&mut self, params: &BindBuffer) -> Result<(), Diagnostic>;

    /// Fetch the next block of rows into `rows`, returning how many arrived.
    /// Zero means the result set is exhausted.
    fn fetch(&mut self, rows: &mut BindBuffer) -> Result<usize, Diagnostic>;

    /// Close an open cursor. Closing when no cursor is open is not an error.
    fn close_cursor(&mut self) -> Result<(), Diagnostic>;
}
