//! Untyped prepared statements.

use rowbind_driver::{BindBuffer, Dbms, Diagnostic, DriverStatement};
use rowbind_types::ColumnType;

use crate::error::{Error, Result};

/// A prepared statement handle.
///
/// This is the thin, untyped layer over the driver: every call maps one to
/// one onto a driver call and tags failures with the DBMS family. Typed
/// shapes are built on top of it in [`typed`](crate::typed).
pub struct Statement {
    handle: Box<dyn DriverStatement>,
    connection_id: u64,
    dbms: Dbms,
    sql: String,
}

impl Statement {
    pub(crate) fn new(
        handle: Box<dyn DriverStatement>,
        connection_id: u64,
        dbms: Dbms,
        sql: &str,
    ) -> Self {
        Self {
            handle,
            connection_id,
            dbms,
            sql: sql.to_string(),
        }
    }

    /// The statement text.
    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Identifier of the connection that prepared this statement.
    #[must_use]
    pub fn connection_id(&self) -> u64 {
        self.connection_id
    }

    /// Bind parameter `slot` (1-based).
    pub fn bind_param(&mut self, slot: u16, column: ColumnType) -> Result<()> {
        let result = self.handle.bind_parameter(slot, column);
        self.check(result)
    }

    /// Bind result column `slot` (1-based).
    pub fn bind_col(&mut self, slot: u16, column: ColumnType) -> Result<()> {
        let result = self.handle.bind_column(slot, column);
        self.check(result)
    }

    /// Bind `count` parameter sets of `stride` slots.
    pub fn bind_param_array(&mut self, stride: usize, count: usize) -> Result<()> {
        tracing::trace!(sql = %self.sql, stride, count, "binding parameter array");
        let result = self.handle.bind_parameter_array(stride, count);
        self.check(result)
    }

    /// Bind up to `count` result rows of `stride` slots per fetch.
    pub fn bind_col_array(&mut self, stride: usize, count: usize) -> Result<()> {
        tracing::trace!(sql = %self.sql, stride, count, "binding row array");
        let result = self.handle.bind_row_array(stride, count);
        self.check(result)
    }

    /// Close any open cursor, then execute with `params`.
    pub fn exec(&mut self, params: &BindBuffer) -> Result<()> {
        let result = self.handle.close_cursor();
        self.check(result)?;
        let result = self.handle.execute(params);
        self.check(result)
    }

    /// Fetch the next block of rows into `rows`.
    pub fn fetch(&mut self, rows: &mut BindBuffer) -> Result<usize> {
        let result = self.handle.fetch(rows);
        self.check(result)
    }

    /// Close an open cursor.
    pub fn close_cursor(&mut self) -> Result<()> {
        let result = self.handle.close_cursor();
        self.check(result)
    }

    fn check<T>(&self, result: std::result::Result<T, Diagnostic>) -> Result<T> {
        result.map_err(|source| Error::driver(self.dbms, source))
    }
}

impl std::fmt::Debug for Statement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Statement")
            .field("connection_id", &self.connection_id)
            .field("sql", &self.sql)
            .finish_non_exhaustive()
    }
}
