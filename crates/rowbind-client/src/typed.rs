//! Statically typed statement shapes.
//!
//! | Shape | Parameters | Results |
//! |-------|------------|---------|
//! | [`TypedStatement<P, C>`] | one `P` | one `C` per fetch |
//! | [`BatchStatement<P>`] | `Vec<P>`, one driver call | none |
//! | [`CursorStatement<P, C>`] | one `P` | up to fetch size `C`s per fetch |
//!
//! Use `()` for a side that has no slots. All shapes share the binding core,
//! so rebinding only happens when a buffer moves or changes its row count.

use rowbind_types::Record;

use crate::binding::{BoundStatement, Shape, Slots, StatementState};
use crate::connection::Connection;
use crate::error::Result;
use crate::result_set::{RowSource, Rows};
use crate::statement::Statement;

/// Scalar parameters, scalar result row.
///
/// ```rust,ignore
/// let mut stmt: TypedStatement<(i32,), (i32, FixedString<32>)> =
///     TypedStatement::prepare(&mut conn, "SELECT id, name FROM users WHERE id = ?")?;
/// stmt.params_mut().0 = 42;
/// stmt.exec()?;
/// while stmt.fetch()? {
///     println!("{}", stmt.cols().1);
/// }
/// ```
#[derive(Debug)]
pub struct TypedStatement<P: Record, C: Record> {
    core: BoundStatement,
    params: P,
    cols: C,
}

impl<P: Record, C: Record> TypedStatement<P, C> {
    /// Prepare `sql` on `conn` and bind both sides.
    pub fn prepare(conn: &mut Connection, sql: &str) -> Result<Self> {
        let statement = conn.prepare(sql)?;
        Self::from_statement(statement)
    }

    /// Bind an already prepared statement.
    pub fn from_statement(statement: Statement) -> Result<Self> {
        let core = BoundStatement::new(
            statement,
            Slots::new(P::column_types(), Shape::Scalar),
            Slots::new(C::column_types(), Shape::Scalar),
        )?;
        Ok(Self {
            core,
            params: P::default(),
            cols: C::default(),
        })
    }

    /// Current parameter values.
    #[must_use]
    pub fn params(&self) -> &P {
        &self.params
    }

    /// Mutable parameter values, read at the next [`exec`](Self::exec).
    pub fn params_mut(&mut self) -> &mut P {
        &mut self.params
    }

    /// The row read by the last successful [`fetch`](Self::fetch).
    #[must_use]
    pub fn cols(&self) -> &C {
        &self.cols
    }

    /// Statement text.
    #[must_use]
    pub fn sql(&self) -> &str {
        self.core.statement().sql()
    }

    /// Lifecycle state.
    #[must_use]
    pub fn state(&self) -> StatementState {
        self.core.state()
    }

    /// Execute with the current parameters.
    pub fn exec(&mut self) -> Result<()> {
        self.params.write(self.core.params_mut().row_mut(0));
        self.core.exec()
    }

    /// Replace the parameters, then execute.
    pub fn exec_with(&mut self, params: P) -> Result<()> {
        self.params = params;
        self.exec()
    }

    /// Fetch the next row into [`cols`](Self::cols). Returns `false` once the
    /// result set is exhausted.
    pub fn fetch(&mut self) -> Result<bool> {
        if self.core.fetch()? == 0 {
            return Ok(false);
        }
        self.cols.read(self.core.cols().row(0))?;
        Ok(true)
    }

    /// Execute and iterate over every result row.
    pub fn rows(&mut self) -> Result<Rows<'_, Self>> {
        self.exec()?;
        Ok(Rows::new(self))
    }
}

impl<P: Record, C: Record> RowSource for TypedStatement<P, C> {
    type Row = C;

    fn fetch_batch(&mut self) -> Result<bool> {
        self.fetch()
    }

    fn batch(&self) -> &[C] {
        std::slice::from_ref(&self.cols)
    }
}

/// Bulk parameter array, no result.
///
/// All parameter sets are sent in one driver call. The array binding is
/// reissued only when the number of sets changes (or the buffer has to
/// grow), so repeated batches of the same size bind once.
#[derive(Debug)]
pub struct BatchStatement<P: Record> {
    core: BoundStatement,
    params: Vec<P>,
}

impl<P: Record> BatchStatement<P> {
    /// Prepare `sql` on `conn`.
    pub fn prepare(conn: &mut Connection, sql: &str) -> Result<Self> {
        let statement = conn.prepare(sql)?;
        Self::from_statement(statement)
    }

    /// Wrap an already prepared statement.
    pub fn from_statement(statement: Statement) -> Result<Self> {
        let core = BoundStatement::new(
            statement,
            Slots::new(P::column_types(), Shape::ParamArray),
            Slots::new(Vec::new(), Shape::Scalar),
        )?;
        Ok(Self {
            core,
            params: Vec::new(),
        })
    }

    /// Parameter sets.
    #[must_use]
    pub fn params(&self) -> &[P] {
        &self.params
    }

    /// Mutable parameter sets, read at the next [`exec`](Self::exec).
    pub fn params_mut(&mut self) -> &mut Vec<P> {
        &mut self.params
    }

    /// Statement text.
    #[must_use]
    pub fn sql(&self) -> &str {
        self.core.statement().sql()
    }

    /// Lifecycle state.
    #[must_use]
    pub fn state(&self) -> StatementState {
        self.core.state()
    }

    /// Execute once for every parameter set. An empty batch does nothing.
    pub fn exec(&mut self) -> Result<()> {
        let buffer = self.core.params_mut();
        buffer.resize_rows(self.params.len());
        for (index, params) in self.params.iter().enumerate() {
            params.write(buffer.row_mut(index));
        }
        self.core.exec()
    }
}

/// Scalar parameters, bulk result set.
///
/// Each [`fetch`](Self::fetch) retrieves up to [`fetch_size`](Self::fetch_size)
/// rows in one round trip.
#[derive(Debug)]
pub struct CursorStatement<P: Record, C: Record> {
    core: BoundStatement,
    params: P,
    rows: Vec<C>,
}

impl<P: Record, C: Record> CursorStatement<P, C> {
    /// Prepare `sql` on `conn` with a result buffer of `fetch_size` rows.
    pub fn prepare(conn: &mut Connection, sql: &str, fetch_size: usize) -> Result<Self> {
        let statement = conn.prepare(sql)?;
        Self::from_statement(statement, fetch_size)
    }

    /// Wrap an already prepared statement.
    pub fn from_statement(statement: Statement, fetch_size: usize) -> Result<Self> {
        if fetch_size == 0 {
            return Err(crate::error::Error::Config(
                "fetch size must be greater than 0".into(),
            ));
        }
        let core = BoundStatement::new(
            statement,
            Slots::new(P::column_types(), Shape::Scalar),
            Slots::new(C::column_types(), Shape::RowArray { fetch_size }),
        )?;
        Ok(Self {
            core,
            params: P::default(),
            rows: Vec::with_capacity(fetch_size),
        })
    }

    /// Current parameter values.
    #[must_use]
    pub fn params(&self) -> &P {
        &self.params
    }

    /// Mutable parameter values, read at the next [`exec`](Self::exec).
    pub fn params_mut(&mut self) -> &mut P {
        &mut self.params
    }

    /// Rows delivered by the last fetch.
    #[must_use]
    pub fn rows(&self) -> &[C] {
        &self.rows
    }

    /// Rows per driver round trip.
    #[must_use]
    pub fn fetch_size(&self) -> usize {
        self.core.fetch_size()
    }

    /// Change the rows per round trip; takes effect at the next execution.
    pub fn set_fetch_size(&mut self, fetch_size: usize) -> Result<()> {
        self.core.set_fetch_size(fetch_size)
    }

    /// Statement text.
    #[must_use]
    pub fn sql(&self) -> &str {
        self.core.statement().sql()
    }

    /// Lifecycle state.
    #[must_use]
    pub fn state(&self) -> StatementState {
        self.core.state()
    }

    /// Execute with the current parameters.
    pub fn exec(&mut self) -> Result<()> {
        self.rows.clear();
        self.params.write(self.core.params_mut().row_mut(0));
        self.core.exec()
    }

    /// Replace the parameters, then execute.
    pub fn exec_with(&mut self, params: P) -> Result<()> {
        self.params = params;
        self.exec()
    }

    /// Fetch the next block into [`rows`](Self::rows). Returns `false` once
    /// the result set is exhausted.
    pub fn fetch(&mut self) -> Result<bool> {
        let fetched = self.core.fetch()?;
        self.rows.resize_with(fetched, C::default);
        let block = self.core.cols();
        for (index, row) in self.rows.iter_mut().enumerate() {
            row.read(block.row(index))?;
        }
        Ok(fetched != 0)
    }

    /// Execute and iterate over every result row, block by block.
    pub fn iter(&mut self) -> Result<Rows<'_, Self>> {
        self.exec()?;
        Ok(Rows::new(self))
    }

    /// Execute and collect every result row.
    pub fn fetch_all(&mut self) -> Result<Vec<C>> {
        self.iter()?.collect()
    }
}

impl<P: Record, C: Record> RowSource for CursorStatement<P, C> {
    type Row = C;

    fn fetch_batch(&mut self) -> Result<bool> {
        self.fetch()
    }

    fn batch(&self) -> &[C] {
        &self.rows
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use rowbind_types::{Cell, Nullable, SqlValue};

    use super::*;
    use crate::binding::tests::Recorder;

    #[test]
    fn test_typed_statement_decodes_rows() {
        let (statement, calls) = Recorder::statement(2);
        let mut stmt: TypedStatement<(i32,), (i64,)> =
            TypedStatement::from_statement(statement).unwrap();
        stmt.exec_with((7,)).unwrap();
        assert_eq!(
            calls.lock().executed_rows[0],
            vec![Cell::new(SqlValue::Int(7))]
        );

        let values: Vec<i64> = stmt.rows().unwrap().map(|row| row.unwrap().0).collect();
        assert_eq!(values, vec![0, 1]);
    }

    #[test]
    fn test_batch_statement_sends_every_set() {
        let (statement, calls) = Recorder::statement(0);
        let mut stmt: BatchStatement<(i32, Nullable<i32>)> =
            BatchStatement::from_statement(statement).unwrap();
        stmt.params_mut()
            .extend([(1, Nullable::new(10)), (2, Nullable::null())]);
        stmt.exec().unwrap();
        stmt.exec().unwrap();

        let calls = calls.lock();
        assert_eq!(calls.executes, 2);
        assert_eq!(calls.param_array_binds, 1);
        assert_eq!(calls.executed_rows.len(), 4);
        assert!(calls.executed_rows[1][1].is_null());
    }

    #[test]
    fn test_cursor_statement_fetches_blocks() {
        let (statement, calls) = Recorder::statement(5);
        let mut stmt: CursorStatement<(), (i32,)> =
            CursorStatement::from_statement(statement, 2).unwrap();
        stmt.exec().unwrap();

        let mut sizes = Vec::new();
        while stmt.fetch().unwrap() {
            sizes.push(stmt.rows().len());
        }
        assert_eq!(sizes, vec![2, 2, 1]);
        assert_eq!(calls.lock().fetches, 3);
        assert!(stmt.rows().is_empty());
    }

    #[test]
    fn test_cursor_fetch_all() {
        let (statement, _calls) = Recorder::statement(7);
        let mut stmt: CursorStatement<(), (u32,)> =
            CursorStatement::from_statement(statement, 3).unwrap();
        let rows = stmt.fetch_all().unwrap();
        assert_eq!(rows.len(), 7);
        assert_eq!(rows[6], (6,));
    }

    #[test]
    fn test_zero_fetch_size_rejected() {
        let (statement, _calls) = Recorder::statement(0);
        assert!(CursorStatement::<(), (i32,)>::from_statement(statement, 0).is_err());
    }
}
