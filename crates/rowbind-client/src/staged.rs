//! Bulk parameters pushed through a staging table.
//!
//! A query that needs many parameter sets at once (an `IN` list of tuples,
//! say) would otherwise need a statement text per list length. Instead the
//! sets are inserted into a temporary table, each row tagged with its
//! position in the `stg_idx` column, and the query joins that table.

use rowbind_types::{ColumnType, Record, TypeError, TypeTag};

use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::result_set::{RowSource, Rows};
use crate::sql::{self, CreateFlags};
use crate::typed::{BatchStatement, CursorStatement, TypedStatement};

/// Name of the sequence column that leads every staging table.
pub const STAGING_INDEX_COLUMN: &str = "stg_idx";

/// Staged parameter rows `S`, scalar parameters `P`, bulk results `C`.
///
/// [`exec`](Self::exec) clears the staging table, inserts the staged rows
/// in one batch with indices `0..n`, then executes the joined query.
///
/// ```rust,ignore
/// let mut stmt: StagedStatement<(i32,), (), (i32, FixedString<32>)> = StagedStatement::prepare(
///     &mut conn,
///     "stg_ids",
///     &["id"],
///     "SELECT u.id, u.name FROM users u, stg_ids s WHERE u.id = s.id ORDER BY s.stg_idx",
///     64,
/// )?;
/// stmt.staged_rows_mut().extend([(3,), (1,), (4,)]);
/// stmt.exec()?;
/// while stmt.fetch()? {
///     for row in stmt.cols() { println!("{}", row.1); }
/// }
/// ```
#[derive(Debug)]
pub struct StagedStatement<S: Record, P: Record, C: Record> {
    staging_table: String,
    staged: Vec<S>,
    clear: TypedStatement<(), ()>,
    insert: BatchStatement<(i32, S)>,
    main: CursorStatement<P, C>,
}

impl<S: Record, P: Record, C: Record> StagedStatement<S, P, C> {
    /// Create the temporary staging table and prepare the three statements.
    ///
    /// `staged_columns` names the columns of `S`; the table's first column
    /// is [`STAGING_INDEX_COLUMN`]. An existing table of the same name is
    /// dropped.
    pub fn prepare<N: AsRef<str>>(
        conn: &mut Connection,
        staging_table: &str,
        staged_columns: &[N],
        sql: &str,
        fetch_size: usize,
    ) -> Result<Self> {
        if staged_columns.len() != S::WIDTH {
            return Err(Error::ColumnCount {
                expected: S::WIDTH,
                actual: staged_columns.len(),
            });
        }

        let mut names = Vec::with_capacity(S::WIDTH + 1);
        names.push(STAGING_INDEX_COLUMN);
        names.extend(staged_columns.iter().map(|name| name.as_ref()));
        let mut types = vec![ColumnType::new(TypeTag::Integer)];
        types.extend(S::column_types());

        let ddl = sql::create_table(
            conn.dbms(),
            staging_table,
            &names,
            &types,
            &[0],
            CreateFlags::DROP_TABLE_IF_EXISTS | CreateFlags::TEMPORARY_TABLE,
        )?;
        for statement in &ddl {
            conn.execute(statement)?;
        }

        let clear = TypedStatement::prepare(conn, &sql::delete_from::<&str>(staging_table, &[])?)?;
        let insert = BatchStatement::prepare(conn, &sql::insert(staging_table, &names)?)?;
        let main = CursorStatement::prepare(conn, sql, fetch_size)?;

        tracing::debug!(
            connection_id = conn.id(),
            staging_table,
            "staged statement prepared"
        );
        Ok(Self {
            staging_table: staging_table.to_string(),
            staged: Vec::new(),
            clear,
            insert,
            main,
        })
    }

    /// Name of the staging table.
    #[must_use]
    pub fn staging_table(&self) -> &str {
        &self.staging_table
    }

    /// Staged rows, in index order.
    #[must_use]
    pub fn staged(&self) -> &[S] {
        &self.staged
    }

    /// Staged row `index`, if present.
    pub fn staged_mut(&mut self, index: usize) -> Option<&mut S> {
        self.staged.get_mut(index)
    }

    /// All staged rows, for pushing or clearing.
    pub fn staged_rows_mut(&mut self) -> &mut Vec<S> {
        &mut self.staged
    }

    /// Grow or shrink the staged rows; new rows are defaults.
    pub fn resize_staged(&mut self, len: usize) {
        self.staged.resize_with(len, S::default);
    }

    /// Scalar parameters of the joined query.
    pub fn params_mut(&mut self) -> &mut P {
        self.main.params_mut()
    }

    /// Rows delivered by the last fetch.
    #[must_use]
    pub fn cols(&self) -> &[C] {
        self.main.rows()
    }

    /// Text of the joined query.
    #[must_use]
    pub fn sql(&self) -> &str {
        self.main.sql()
    }

    /// Clear the staging table, insert the staged rows, run the query.
    pub fn exec(&mut self) -> Result<()> {
        self.clear.exec()?;

        let batch = self.insert.params_mut();
        batch.clear();
        for (index, row) in self.staged.iter().enumerate() {
            let index = i32::try_from(index).map_err(|_| TypeError::OutOfRange {
                value: index.to_string(),
                target: "i32",
            })?;
            batch.push((index, row.clone()));
        }
        self.insert.exec()?;

        self.main.exec()
    }

    /// Fetch the next block of results into [`cols`](Self::cols).
    pub fn fetch(&mut self) -> Result<bool> {
        self.main.fetch()
    }

    /// Execute and iterate over every result row.
    pub fn iter(&mut self) -> Result<Rows<'_, Self>> {
        self.exec()?;
        Ok(Rows::new(self))
    }
}

impl<S: Record, P: Record, C: Record> RowSource for StagedStatement<S, P, C> {
    type Row = C;

    fn fetch_batch(&mut self) -> Result<bool> {
        self.fetch()
    }

    fn batch(&self) -> &[C] {
        self.main.rows()
    }
}
