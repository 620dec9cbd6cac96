//! Typed tables with cached projections.

use rowbind_types::{Cell, ColumnType, NamedRecord, Record};

use crate::binding::{BoundStatement, Shape, Slots};
use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::sql::{self, CreateFlags};
use crate::statement_cache::{CacheStats, ColumnSet, OperationKind, StatementCache};

/// A table whose rows are records of type `C`.
///
/// Every operation takes the connection that owns the table's statement
/// cache. Key and value columns are given as indices into `C`; the order of
/// the indices in a call does not matter, and a key tuple is matched to the
/// indices in the order given.
///
/// ```rust,ignore
/// let mut users: Table<(i32, FixedString<32>, i16)> =
///     Table::new("users", &["id", "name", "age"], &[0])?;
/// users.create(&mut conn, CreateFlags::DROP_TABLE_IF_EXISTS)?;
/// users.insert(&mut conn, &(1, FixedString::new("ann")?, 41))?;
/// let adults = users.select_by(&mut conn, &[2], &(18i16,))?;
/// ```
#[derive(Debug)]
pub struct Table<C: Record> {
    name: String,
    columns: Vec<String>,
    types: Vec<ColumnType>,
    primary_key: Vec<usize>,
    fetch_size: Option<usize>,
    cache: StatementCache<BoundStatement>,
    _row: std::marker::PhantomData<fn() -> C>,
}

impl<C: Record> Table<C> {
    /// Describe table `name` with one column name per slot of `C` and the
    /// primary key column indices.
    pub fn new<S: AsRef<str>>(name: &str, columns: &[S], primary_key: &[usize]) -> Result<Self> {
        sql::validate_identifier(name)?;
        for column in columns {
            sql::validate_identifier(column.as_ref())?;
        }
        if columns.len() != C::WIDTH {
            return Err(Error::ColumnCount {
                expected: C::WIDTH,
                actual: columns.len(),
            });
        }
        let primary_key = sorted_indices(primary_key, C::WIDTH)?;

        Ok(Self {
            name: name.to_string(),
            columns: columns.iter().map(|c| c.as_ref().to_string()).collect(),
            types: C::column_types(),
            primary_key,
            fetch_size: None,
            cache: StatementCache::new(),
            _row: std::marker::PhantomData,
        })
    }

    /// Rows per round trip for multi-row selects, instead of the
    /// connection's. Applies to statements prepared after the call.
    #[must_use]
    pub fn with_fetch_size(mut self, fetch_size: usize) -> Self {
        self.fetch_size = Some(fetch_size.max(1));
        self
    }

    /// Table name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Column names in declared order.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Primary key column indices, ascending.
    #[must_use]
    pub fn primary_key(&self) -> &[usize] {
        &self.primary_key
    }

    /// Statement cache counters.
    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Create the table.
    pub fn create(&self, conn: &mut Connection, flags: CreateFlags) -> Result<()> {
        let statements = sql::create_table(
            conn.dbms(),
            &self.name,
            &self.columns,
            &self.types,
            &self.primary_key,
            flags,
        )?;
        for statement in &statements {
            conn.execute(statement)?;
        }
        Ok(())
    }

    /// Drop the table.
    pub fn drop(&self, conn: &mut Connection) -> Result<()> {
        conn.execute(&sql::drop_table(&self.name, false)?)
    }

    /// The row with primary key `key`, if any.
    pub fn select<K: Record>(&mut self, conn: &mut Connection, key: &K) -> Result<Option<C>> {
        let indices = self.primary_key.clone();
        let mut rows = self.select_where(conn, &indices, key, 1)?;
        Ok(rows.pop())
    }

    /// Every row.
    pub fn select_all(&mut self, conn: &mut Connection) -> Result<Vec<C>> {
        self.select_where(conn, &[], &(), usize::MAX)
    }

    /// Every row whose columns at `key_indices` equal `key`.
    pub fn select_by<K: Record>(
        &mut self,
        conn: &mut Connection,
        key_indices: &[usize],
        key: &K,
    ) -> Result<Vec<C>> {
        self.select_where(conn, key_indices, key, usize::MAX)
    }

    /// Insert `row`.
    pub fn insert(&mut self, conn: &mut Connection, row: &C) -> Result<()> {
        let all: Vec<usize> = (0..C::WIDTH).collect();
        self.insert_at(conn, row, &all)
    }

    /// Insert only the columns of `row` at `value_indices`; the others take
    /// their defaults.
    pub fn insert_at(&mut self, conn: &mut Connection, row: &C, value_indices: &[usize]) -> Result<()> {
        let values = sorted_indices(value_indices, C::WIDTH)?;
        let cells = row.to_cells();
        let params: Vec<Cell> = values.iter().map(|&i| cells[i].clone()).collect();

        let set = ColumnSet::from_indices(values.iter().copied());
        let statement = self.lookup(conn, OperationKind::Insert, &set, &values, &[])?;
        run(statement, &params)
    }

    /// Update every non-key column of the row with `row`'s primary key.
    pub fn update(&mut self, conn: &mut Connection, row: &C) -> Result<()> {
        let keys = self.primary_key.clone();
        self.update_columns(conn, row, None, &keys)
    }

    /// Update every column except `key_indices` of the rows matching `row`
    /// at `key_indices`.
    pub fn update_by(&mut self, conn: &mut Connection, row: &C, key_indices: &[usize]) -> Result<()> {
        self.update_columns(conn, row, None, key_indices)
    }

    /// Update the columns at `value_indices` of the row with `row`'s primary
    /// key.
    pub fn update_at(&mut self, conn: &mut Connection, row: &C, value_indices: &[usize]) -> Result<()> {
        let keys = self.primary_key.clone();
        self.update_columns(conn, row, Some(value_indices), &keys)
    }

    /// Update the columns at `value_indices` of the rows matching `row` at
    /// `key_indices`.
    pub fn update_at_by(
        &mut self,
        conn: &mut Connection,
        row: &C,
        value_indices: &[usize],
        key_indices: &[usize],
    ) -> Result<()> {
        self.update_columns(conn, row, Some(value_indices), key_indices)
    }

    /// Delete the row with primary key `key`.
    pub fn delete<K: Record>(&mut self, conn: &mut Connection, key: &K) -> Result<()> {
        let indices = self.primary_key.clone();
        self.delete_by(conn, &indices, key)
    }

    /// Delete every row.
    pub fn delete_all(&mut self, conn: &mut Connection) -> Result<()> {
        self.delete_by(conn, &[], &())
    }

    /// Delete every row whose columns at `key_indices` equal `key`.
    pub fn delete_by<K: Record>(
        &mut self,
        conn: &mut Connection,
        key_indices: &[usize],
        key: &K,
    ) -> Result<()> {
        let (keys, params) = self.key_params(key_indices, key)?;
        let set = ColumnSet::from_indices(keys.iter().copied());
        let statement = self.lookup(conn, OperationKind::Delete, &set, &[], &keys)?;
        run(statement, &params)
    }

    fn select_where<K: Record>(
        &mut self,
        conn: &mut Connection,
        key_indices: &[usize],
        key: &K,
        limit: usize,
    ) -> Result<Vec<C>> {
        let (keys, params) = self.key_params(key_indices, key)?;
        let set = ColumnSet::from_indices(keys.iter().copied());
        let statement = self.lookup(conn, OperationKind::Select, &set, &[], &keys)?;
        run(statement, &params)?;

        let mut rows = Vec::new();
        while rows.len() < limit {
            let fetched = statement.fetch()?;
            if fetched == 0 {
                break;
            }
            let block = statement.cols();
            for index in 0..fetched.min(limit - rows.len()) {
                rows.push(C::from_cells(block.row(index))?);
            }
        }
        Ok(rows)
    }

    fn update_columns(
        &mut self,
        conn: &mut Connection,
        row: &C,
        value_indices: Option<&[usize]>,
        key_indices: &[usize],
    ) -> Result<()> {
        let keys = sorted_indices(key_indices, C::WIDTH)?;
        let values = match value_indices {
            Some(indices) => sorted_indices(indices, C::WIDTH)?,
            None => (0..C::WIDTH).filter(|i| !keys.contains(i)).collect(),
        };
        // nothing to set
        if values.is_empty() {
            return Ok(());
        }

        let cells = row.to_cells();
        let params: Vec<Cell> = values
            .iter()
            .chain(&keys)
            .map(|&i| cells[i].clone())
            .collect();

        let set = ColumnSet::from_indices(values.iter().copied())
            .with_offset(&ColumnSet::from_indices(keys.iter().copied()), C::WIDTH);
        let statement = self.lookup(conn, OperationKind::Update, &set, &values, &keys)?;
        run(statement, &params)
    }

    /// Validate `key` against the columns at `indices` and return the
    /// indices ascending with the key cells in the same order.
    fn key_params<K: Record>(&self, indices: &[usize], key: &K) -> Result<(Vec<usize>, Vec<Cell>)> {
        if K::WIDTH != indices.len() {
            return Err(Error::ColumnCount {
                expected: indices.len(),
                actual: K::WIDTH,
            });
        }
        sorted_indices(indices, C::WIDTH)?;

        let key_types = K::column_types();
        for (&index, supplied) in indices.iter().zip(&key_types) {
            let expected = self.types[index].tag;
            if supplied.tag != expected {
                return Err(Error::ColumnType {
                    index,
                    expected,
                    actual: supplied.tag,
                });
            }
        }

        let mut pairs: Vec<(usize, Cell)> = indices.iter().copied().zip(key.to_cells()).collect();
        pairs.sort_unstable_by_key(|(index, _)| *index);
        Ok(pairs.into_iter().unzip())
    }

    /// Fetch or prepare the statement for `(kind, set)`. `values` and `keys`
    /// are ascending and only used to generate the text on a miss.
    fn lookup(
        &mut self,
        conn: &mut Connection,
        kind: OperationKind,
        set: &ColumnSet,
        values: &[usize],
        keys: &[usize],
    ) -> Result<&mut BoundStatement> {
        let Self {
            name,
            columns,
            types,
            fetch_size,
            cache,
            ..
        } = self;

        cache.lookup(conn, kind, set, |conn| {
            let text = match kind {
                OperationKind::Select => {
                    let all: Vec<&str> = columns.iter().map(String::as_str).collect();
                    sql::select(name, &all, &pick(columns, keys))?
                }
                OperationKind::Insert => sql::insert(name, &pick(columns, values))?,
                OperationKind::Update => {
                    sql::update(name, &pick(columns, values), &pick(columns, keys))?
                }
                OperationKind::Delete => sql::delete_from(name, &pick(columns, keys))?,
            };

            let param_types = values.iter().chain(keys).map(|&i| types[i]).collect();
            let col_types = match kind {
                OperationKind::Select => types.clone(),
                OperationKind::Insert | OperationKind::Update | OperationKind::Delete => Vec::new(),
            };
            let cols = if col_types.is_empty() {
                Slots::new(col_types, Shape::Scalar)
            } else {
                let fetch_size = fetch_size.unwrap_or_else(|| conn.fetch_size());
                Slots::new(col_types, Shape::RowArray { fetch_size })
            };

            let statement = conn.prepare(&text)?;
            BoundStatement::new(statement, Slots::new(param_types, Shape::Scalar), cols)
        })
    }
}

impl<C: NamedRecord> Table<C> {
    /// Describe table `name` with the record's own column names.
    pub fn named(name: &str, primary_key: &[usize]) -> Result<Self> {
        Self::new(name, &C::column_names(), primary_key)
    }
}

fn pick<'a>(columns: &'a [String], indices: &[usize]) -> Vec<&'a str> {
    indices.iter().map(|&i| columns[i].as_str()).collect()
}

/// Write `params` into the statement's single parameter row and execute.
fn run(statement: &mut BoundStatement, params: &[Cell]) -> Result<()> {
    statement.params_mut().row_mut(0).clone_from_slice(params);
    statement.exec()
}

/// `indices` ascending, rejecting duplicates and indices past `width`.
fn sorted_indices(indices: &[usize], width: usize) -> Result<Vec<usize>> {
    let mut sorted = indices.to_vec();
    sorted.sort_unstable();
    for pair in sorted.windows(2) {
        if pair[0] == pair[1] {
            return Err(Error::ColumnIndex {
                index: pair[0],
                columns: width,
            });
        }
    }
    if let Some(&index) = sorted.iter().find(|&&index| index >= width) {
        return Err(Error::ColumnIndex {
            index,
            columns: width,
        });
    }
    Ok(sorted)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::binding::tests::Loopback;

    type Row = (i32, i32, i16);

    fn table() -> Table<Row> {
        Table::new("bar", &["a", "b", "c"], &[0]).unwrap()
    }

    #[test]
    fn test_new_validates() {
        assert!(matches!(
            Table::<Row>::new("bar", &["a", "b"], &[0]),
            Err(Error::ColumnCount { expected: 3, actual: 2 })
        ));
        assert!(matches!(
            Table::<Row>::new("bar", &["a", "b", "c"], &[3]),
            Err(Error::ColumnIndex { index: 3, .. })
        ));
        assert!(Table::<Row>::new("bar;", &["a", "b", "c"], &[0]).is_err());
        assert!(Table::<Row>::new("bar", &["a", "b c", "c"], &[0]).is_err());
    }

    #[test]
    fn test_key_order_shares_statement() {
        let (mut conn, prepared) = Loopback::connection();
        let mut bar = table();
        bar.select_by(&mut conn, &[1, 2], &(1i32, 2i16)).unwrap();
        bar.select_by(&mut conn, &[2, 1], &(2i16, 1i32)).unwrap();

        let prepared = prepared.lock();
        assert_eq!(*prepared, vec!["SELECT a, b, c FROM bar WHERE b = ? AND c = ?"]);
        assert_eq!(bar.cache_stats().hits, 1);
    }

    #[test]
    fn test_update_texts() {
        let (mut conn, prepared) = Loopback::connection();
        let mut bar = table();
        let row = (1, 2, 3);
        bar.update(&mut conn, &row).unwrap();
        bar.update_at(&mut conn, &row, &[2]).unwrap();
        bar.update_by(&mut conn, &row, &[1]).unwrap();
        bar.update_at_by(&mut conn, &row, &[1], &[1]).unwrap();
        bar.update_at_by(&mut conn, &row, &[2], &[0]).unwrap();

        assert_eq!(
            *prepared.lock(),
            vec![
                "UPDATE bar SET b = ?, c = ? WHERE a = ?",
                "UPDATE bar SET c = ? WHERE a = ?",
                "UPDATE bar SET a = ?, c = ? WHERE b = ?",
                "UPDATE bar SET b = ? WHERE b = ?",
            ]
        );
        assert_eq!(bar.cache_stats().entries, 4);
    }

    #[test]
    fn test_insert_delete_texts() {
        let (mut conn, prepared) = Loopback::connection();
        let mut bar = table();
        bar.insert(&mut conn, &(1, 2, 3)).unwrap();
        bar.insert_at(&mut conn, &(1, 2, 3), &[2, 0]).unwrap();
        bar.delete(&mut conn, &(1i32,)).unwrap();
        bar.delete_all(&mut conn).unwrap();
        assert!(bar.select(&mut conn, &(1i32,)).unwrap().is_none());

        assert_eq!(
            *prepared.lock(),
            vec![
                "INSERT INTO bar (a, b, c) VALUES (?, ?, ?)",
                "INSERT INTO bar (a, c) VALUES (?, ?)",
                "DELETE FROM bar WHERE a = ?",
                "DELETE FROM bar",
                "SELECT a, b, c FROM bar WHERE a = ?",
            ]
        );
    }

    #[test]
    fn test_key_type_checked() {
        let (mut conn, _prepared) = Loopback::connection();
        let mut bar = table();
        let err = bar.select_by(&mut conn, &[2], &(1i64,)).unwrap_err();
        assert!(matches!(err, Error::ColumnType { index: 2, .. }));

        let err = bar.delete_by(&mut conn, &[0, 1], &(1i32,)).unwrap_err();
        assert!(matches!(err, Error::ColumnCount { expected: 2, actual: 1 }));

        let err = bar.select_by(&mut conn, &[1, 1], &(1i32, 1i32)).unwrap_err();
        assert!(matches!(err, Error::ColumnIndex { index: 1, .. }));
    }
}
