//! Storage and execution for the in-memory engine.
//!
//! Committed tables live in a [`Database`] shared by every session. A
//! session reads committed state until its first write; from then on it
//! works on a private snapshot and records each change. Commit replays the
//! recorded changes against the current committed state, so transactions
//! of different sessions that touch different rows both succeed, and one
//! that no longer applies fails with a serialization failure. Rollback
//! simply forgets the snapshot.
//!
//! Temporary tables belong to one session and are not transactional.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::Mutex;
use rowbind_driver::{Diagnostic, SqlState};
use rowbind_types::SqlValue;

use crate::convert;
use crate::parser::{
    ColumnDef, ColumnRef, CompareOp, Comparison, CreateTable, DataType, Delete, Insert, Operand,
    Parsed, Select, Statement, TableRef, Update,
};

/// One stored row.
pub(crate) type Row = Vec<SqlValue>;

/// SQLite's `SQLITE_CONSTRAINT`.
const CONSTRAINT_NATIVE: i32 = 19;

fn table_not_found(name: &str) -> Diagnostic {
    Diagnostic::new(SqlState::TABLE_NOT_FOUND, 1, format!("no such table: {name}"))
}

fn column_not_found(column: &ColumnRef) -> Diagnostic {
    Diagnostic::new(SqlState::COLUMN_NOT_FOUND, 1, format!("no such column: {column}"))
}

fn syntax(message: String) -> Diagnostic {
    Diagnostic::new(SqlState::SYNTAX_ERROR, 1, message)
}

fn constraint(message: String) -> Diagnostic {
    Diagnostic::new(SqlState::INTEGRITY_CONSTRAINT, CONSTRAINT_NATIVE, message)
}

// ============================================================================
// Tables
// ============================================================================

/// A table: its schema and rows in insertion order.
#[derive(Debug, Clone)]
pub(crate) struct Table {
    name: String,
    columns: Vec<ColumnDef>,
    primary_key: Vec<usize>,
    rows: Vec<Row>,
}

impl Table {
    fn new(create: &CreateTable) -> Result<Self, Diagnostic> {
        for (index, column) in create.columns.iter().enumerate() {
            if create.columns[..index].iter().any(|c| c.name == column.name) {
                return Err(syntax(format!("duplicate column name: {}", column.name)));
            }
        }
        let primary_key = create
            .primary_key
            .iter()
            .map(|name| {
                create
                    .columns
                    .iter()
                    .position(|column| column.name == *name)
                    .ok_or_else(|| {
                        column_not_found(&ColumnRef {
                            qualifier: None,
                            name: name.clone(),
                        })
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            name: create.name.clone(),
            columns: create.columns.clone(),
            primary_key,
            rows: Vec::new(),
        })
    }

    pub(crate) fn rows(&self) -> &[Row] {
        &self.rows
    }

    fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column.name == name)
    }

    fn require_column(&self, name: &str) -> Result<usize, Diagnostic> {
        self.column_index(name).ok_or_else(|| {
            column_not_found(&ColumnRef {
                qualifier: None,
                name: name.to_string(),
            })
        })
    }

    /// Check NOT NULL on `row` and key uniqueness against every row except
    /// the one at `skip`.
    fn check(&self, row: &Row, rows: &[Row], skip: Option<usize>) -> Result<(), Diagnostic> {
        for (column, value) in self.columns.iter().zip(row) {
            if column.not_null && value.is_null() {
                return Err(constraint(format!(
                    "NOT NULL constraint failed: {}.{}",
                    self.name, column.name
                )));
            }
        }
        if self.primary_key.is_empty() {
            return Ok(());
        }
        let same_key = |other: &Row| {
            self.primary_key
                .iter()
                .all(|&index| row[index].sql_cmp(&other[index]) == Some(Ordering::Equal))
        };
        let duplicate = rows
            .iter()
            .enumerate()
            .any(|(index, other)| Some(index) != skip && same_key(other));
        if duplicate {
            let key: Vec<&str> = self
                .primary_key
                .iter()
                .map(|&index| self.columns[index].name.as_str())
                .collect();
            return Err(constraint(format!(
                "UNIQUE constraint failed: {}.{}",
                self.name,
                key.join(", ")
            )));
        }
        Ok(())
    }

    fn insert(&mut self, insert: &Insert, params: &[SqlValue]) -> Result<usize, Diagnostic> {
        let targets = if insert.columns.is_empty() {
            (0..self.columns.len()).collect()
        } else {
            insert
                .columns
                .iter()
                .map(|name| self.require_column(name))
                .collect::<Result<Vec<_>, _>>()?
        };
        if targets.len() != insert.values.len() {
            return Err(syntax(format!(
                "{} values for {} columns",
                insert.values.len(),
                targets.len()
            )));
        }

        let mut row = vec![SqlValue::Null; self.columns.len()];
        for (&index, operand) in targets.iter().zip(&insert.values) {
            let value = constant(operand, params)?;
            row[index] = convert::store(value, self.columns[index].data_type)?;
        }
        self.check(&row, &self.rows, None)?;
        self.rows.push(row);
        Ok(1)
    }

    fn update(&mut self, update: &Update, params: &[SqlValue]) -> Result<usize, Diagnostic> {
        let assignments = update
            .assignments
            .iter()
            .map(|(name, operand)| {
                let index = self.require_column(name)?;
                let value = constant(operand, params)?;
                Ok((index, convert::store(value, self.columns[index].data_type)?))
            })
            .collect::<Result<Vec<_>, Diagnostic>>()?;
        let filter = Filter::plan(&update.filter, &[&*self], &[])?;

        // all or nothing
        let mut rows = self.rows.clone();
        let mut changed = Vec::new();
        for (index, row) in rows.iter_mut().enumerate() {
            if filter.matches(&[&*row], params) {
                for (column, value) in &assignments {
                    row[*column] = value.clone();
                }
                changed.push(index);
            }
        }
        for &index in &changed {
            self.check(&rows[index], &rows, Some(index))?;
        }
        self.rows = rows;
        Ok(changed.len())
    }

    fn delete(&mut self, delete: &Delete, params: &[SqlValue]) -> Result<usize, Diagnostic> {
        let filter = Filter::plan(&delete.filter, &[&*self], &[])?;
        let before = self.rows.len();
        self.rows.retain(|row| !filter.matches(&[row], params));
        Ok(before - self.rows.len())
    }
}

/// The value of an operand that cannot refer to a row.
fn constant(operand: &Operand, params: &[SqlValue]) -> Result<SqlValue, Diagnostic> {
    match operand {
        Operand::Parameter(index) => Ok(params.get(*index).cloned().unwrap_or(SqlValue::Null)),
        Operand::Literal(value) => Ok(value.clone()),
        Operand::Column(column) => Err(syntax(format!("column {column} not allowed here"))),
    }
}

// ============================================================================
// Expressions
// ============================================================================

/// An operand resolved against the tables in scope.
#[derive(Debug, Clone)]
enum Term {
    Column {
        table: usize,
        column: usize,
        data_type: DataType,
    },
    Parameter(usize),
    Literal(SqlValue),
}

/// Find `column` among `tables`; qualifiers match a table's alias or name.
fn resolve(
    column: &ColumnRef,
    tables: &[&Table],
    refs: &[TableRef],
) -> Result<(usize, usize), Diagnostic> {
    let mut found = None;
    for (position, table) in tables.iter().enumerate() {
        if let Some(qualifier) = &column.qualifier {
            let named = refs.get(position).map_or(table.name.as_str(), |r| {
                r.alias.as_deref().unwrap_or(r.name.as_str())
            });
            if named != qualifier {
                continue;
            }
        }
        if let Some(index) = table.column_index(&column.name) {
            if found.is_some() {
                return Err(syntax(format!("ambiguous column name: {column}")));
            }
            found = Some((position, index));
        }
    }
    found.ok_or_else(|| column_not_found(column))
}

impl Term {
    fn plan(operand: &Operand, tables: &[&Table], refs: &[TableRef]) -> Result<Self, Diagnostic> {
        Ok(match operand {
            Operand::Parameter(index) => Self::Parameter(*index),
            Operand::Literal(value) => Self::Literal(value.clone()),
            Operand::Column(column) => {
                let (table, column) = resolve(column, tables, refs)?;
                Self::Column {
                    table,
                    column,
                    data_type: tables[table].columns[column].data_type,
                }
            }
        })
    }

    /// The term's value for `rows`. A constant compared with a column is
    /// coerced to that column's storage class; one that does not convert
    /// becomes NULL and so matches nothing.
    fn value<'a>(&'a self, other: &Term, rows: &[&'a Row], params: &'a [SqlValue]) -> Cow<'a, SqlValue> {
        let constant = match self {
            Self::Column { table, column, .. } => return Cow::Borrowed(&rows[*table][*column]),
            Self::Parameter(index) => params.get(*index).unwrap_or(&SqlValue::Null),
            Self::Literal(value) => value,
        };
        match other {
            Self::Column { data_type, .. } => {
                Cow::Owned(convert::store(constant.clone(), *data_type).unwrap_or(SqlValue::Null))
            }
            Self::Parameter(_) | Self::Literal(_) => Cow::Borrowed(constant),
        }
    }
}

#[derive(Debug, Clone)]
struct Condition {
    left: Term,
    op: CompareOp,
    right: Term,
}

/// A conjunction of resolved comparisons.
#[derive(Debug, Clone, Default)]
struct Filter {
    conditions: Vec<Condition>,
}

impl Filter {
    fn plan(
        comparisons: &[Comparison],
        tables: &[&Table],
        refs: &[TableRef],
    ) -> Result<Self, Diagnostic> {
        let conditions = comparisons
            .iter()
            .map(|comparison| {
                Ok(Condition {
                    left: Term::plan(&comparison.left, tables, refs)?,
                    op: comparison.op,
                    right: Term::plan(&comparison.right, tables, refs)?,
                })
            })
            .collect::<Result<_, Diagnostic>>()?;
        Ok(Self { conditions })
    }

    /// Whether every condition holds. Comparisons involving NULL fail.
    fn matches(&self, rows: &[&Row], params: &[SqlValue]) -> bool {
        self.conditions.iter().all(|condition| {
            let left = condition.left.value(&condition.right, rows, params);
            let right = condition.right.value(&condition.left, rows, params);
            left.sql_cmp(&right)
                .is_some_and(|ordering| condition.op.matches(ordering))
        })
    }
}

// ============================================================================
// Queries
// ============================================================================

/// Visit every combination of one row per table.
fn for_each_combination<'t>(
    tables: &[&'t Table],
    current: &mut Vec<&'t Row>,
    visit: &mut dyn FnMut(&[&'t Row]),
) {
    match tables.split_first() {
        None => visit(current),
        Some((first, rest)) => {
            for row in &first.rows {
                current.push(row);
                for_each_combination(rest, current, visit);
                current.pop();
            }
        }
    }
}

/// NULLs sort first.
fn order_values(a: &SqlValue, b: &SqlValue) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a.sql_cmp(b).unwrap_or(Ordering::Equal),
    }
}

/// The `(table, column)` position of each output column.
fn projection(select: &Select, tables: &[&Table]) -> Result<Vec<(usize, usize)>, Diagnostic> {
    match &select.columns {
        Some(columns) => columns
            .iter()
            .map(|column| resolve(column, tables, &select.from))
            .collect(),
        None => Ok(tables
            .iter()
            .enumerate()
            .flat_map(|(table, t)| (0..t.columns.len()).map(move |column| (table, column)))
            .collect()),
    }
}

fn query(select: &Select, tables: &[&Table], params: &[SqlValue]) -> Result<Vec<Row>, Diagnostic> {
    let outputs = projection(select, tables)?;
    let filter = Filter::plan(&select.filter, tables, &select.from)?;
    let order = select
        .order_by
        .iter()
        .map(|key| Ok((resolve(&key.column, tables, &select.from)?, key.descending)))
        .collect::<Result<Vec<_>, Diagnostic>>()?;

    let mut matched: Vec<(Row, Row)> = Vec::new();
    for_each_combination(tables, &mut Vec::with_capacity(tables.len()), &mut |rows| {
        if filter.matches(rows, params) {
            let keys = order
                .iter()
                .map(|((table, column), _)| rows[*table][*column].clone())
                .collect();
            let output = outputs
                .iter()
                .map(|(table, column)| rows[*table][*column].clone())
                .collect();
            matched.push((keys, output));
        }
    });

    if !order.is_empty() {
        matched.sort_by(|(a, _), (b, _)| {
            a.iter()
                .zip(b)
                .zip(&order)
                .map(|((a, b), (_, descending))| {
                    let ordering = order_values(a, b);
                    if *descending { ordering.reverse() } else { ordering }
                })
                .find(|ordering| *ordering != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });
    }
    Ok(matched.into_iter().map(|(_, output)| output).collect())
}

// ============================================================================
// Catalog
// ============================================================================

/// A set of named tables.
#[derive(Debug, Clone, Default)]
pub(crate) struct Catalog {
    tables: HashMap<String, Table>,
}

impl Catalog {
    pub(crate) fn get(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    fn contains(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    pub(crate) fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.keys().cloned().collect();
        names.sort_unstable();
        names
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut Table, Diagnostic> {
        self.tables.get_mut(name).ok_or_else(|| table_not_found(name))
    }

    /// Apply a schema or data change, returning the affected row count.
    fn apply(&mut self, statement: &Statement, params: &[SqlValue]) -> Result<usize, Diagnostic> {
        match statement {
            Statement::CreateTable(create) => {
                if self.contains(&create.name) {
                    return Err(Diagnostic::new(
                        SqlState::TABLE_EXISTS,
                        1,
                        format!("table {} already exists", create.name),
                    ));
                }
                let table = Table::new(create)?;
                self.tables.insert(create.name.clone(), table);
                Ok(0)
            }
            Statement::DropTable { name, if_exists } => {
                if self.tables.remove(name).is_none() && !*if_exists {
                    return Err(table_not_found(name));
                }
                Ok(0)
            }
            Statement::Insert(insert) => self.table_mut(&insert.table)?.insert(insert, params),
            Statement::Update(update) => self.table_mut(&update.table)?.update(update, params),
            Statement::Delete(delete) => self.table_mut(&delete.table)?.delete(delete, params),
            Statement::Select(_) => Err(syntax("a query changes nothing".into())),
        }
    }
}

/// Committed state shared by all sessions of a driver.
#[derive(Debug, Default)]
pub(crate) struct Database {
    committed: Mutex<Committed>,
}

#[derive(Debug, Default)]
struct Committed {
    catalog: Catalog,
    /// Bumped by every commit.
    version: u64,
}

impl Database {
    pub(crate) fn committed_names(&self) -> Vec<String> {
        self.committed.lock().catalog.names()
    }

    pub(crate) fn committed_rows(&self, table: &str) -> Option<Vec<Row>> {
        let name = table.to_ascii_lowercase();
        self.committed
            .lock()
            .catalog
            .get(&name)
            .map(|table| table.rows().to_vec())
    }
}

// ============================================================================
// Sessions
// ============================================================================

/// Outcome of executing one parameter set.
#[derive(Debug)]
pub(crate) enum Outcome {
    /// A query's result rows.
    Rows(Vec<Row>),
    /// Rows changed by a data change; zero for schema changes.
    Affected(usize),
}

#[derive(Debug)]
struct Change {
    statement: Arc<Parsed>,
    params: Vec<SqlValue>,
}

/// Uncommitted work of a session.
#[derive(Debug)]
struct Work {
    snapshot: Catalog,
    base_version: u64,
    changes: Vec<Change>,
}

/// Per-connection engine state.
#[derive(Debug)]
pub(crate) struct Session {
    temporary: Catalog,
    work: Option<Work>,
    pub(crate) autocommit: bool,
    pub(crate) read_only: bool,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            temporary: Catalog::default(),
            work: None,
            autocommit: true,
            read_only: false,
        }
    }
}

impl Session {
    /// Whether uncommitted changes exist.
    pub(crate) fn in_transaction(&self) -> bool {
        self.work.is_some()
    }

    /// Check that `parsed` can run against the current schema and return
    /// the number of result columns it produces.
    pub(crate) fn describe(&self, database: &Database, parsed: &Parsed) -> Result<usize, Diagnostic> {
        let committed = database.committed.lock();
        let view = self.view(&committed.catalog);
        let lookup = |name: &str| {
            self.temporary
                .get(name)
                .or_else(|| view.get(name))
                .ok_or_else(|| table_not_found(name))
        };

        match &parsed.statement {
            Statement::Select(select) => {
                let tables = select
                    .from
                    .iter()
                    .map(|from| lookup(&from.name))
                    .collect::<Result<Vec<_>, _>>()?;
                Filter::plan(&select.filter, &tables, &select.from)?;
                for key in &select.order_by {
                    resolve(&key.column, &tables, &select.from)?;
                }
                Ok(projection(select, &tables)?.len())
            }
            Statement::Insert(insert) => {
                let table = lookup(&insert.table)?;
                for name in &insert.columns {
                    table.require_column(name)?;
                }
                Ok(0)
            }
            Statement::Update(update) => {
                let table = lookup(&update.table)?;
                for (name, _) in &update.assignments {
                    table.require_column(name)?;
                }
                Filter::plan(&update.filter, &[table], &[])?;
                Ok(0)
            }
            Statement::Delete(delete) => {
                let table = lookup(&delete.table)?;
                Filter::plan(&delete.filter, &[table], &[])?;
                Ok(0)
            }
            Statement::CreateTable(_) | Statement::DropTable { .. } => Ok(0),
        }
    }

    /// The non-temporary tables this session sees.
    fn view<'a>(&'a self, committed: &'a Catalog) -> &'a Catalog {
        self.work.as_ref().map_or(committed, |work| &work.snapshot)
    }

    /// Execute one parameter set.
    pub(crate) fn execute(
        &mut self,
        database: &Database,
        parsed: &Arc<Parsed>,
        params: &[SqlValue],
    ) -> Result<Outcome, Diagnostic> {
        let statement = &parsed.statement;
        if let Statement::Select(select) = statement {
            let committed = database.committed.lock();
            let view = self.view(&committed.catalog);
            let tables = select
                .from
                .iter()
                .map(|from| {
                    self.temporary
                        .get(&from.name)
                        .or_else(|| view.get(&from.name))
                        .ok_or_else(|| table_not_found(&from.name))
                })
                .collect::<Result<Vec<_>, _>>()?;
            return query(select, &tables, params).map(Outcome::Rows);
        }

        let temporary = match statement {
            Statement::CreateTable(create) => create.temporary,
            other => other
                .target()
                .is_some_and(|name| self.temporary.contains(name)),
        };
        if temporary {
            return self.temporary.apply(statement, params).map(Outcome::Affected);
        }

        if let Statement::DropTable {
            name,
            if_exists: true,
        } = statement
        {
            let committed = database.committed.lock();
            if !self.view(&committed.catalog).contains(name) {
                return Ok(Outcome::Affected(0));
            }
        }

        if self.read_only {
            return Err(Diagnostic::new(
                SqlState::READ_ONLY_TRANSACTION,
                8,
                "attempt to write a readonly database",
            ));
        }

        let work = self.work.get_or_insert_with(|| {
            let committed = database.committed.lock();
            Work {
                snapshot: committed.catalog.clone(),
                base_version: committed.version,
                changes: Vec::new(),
            }
        });
        let affected = work.snapshot.apply(statement, params)?;
        work.changes.push(Change {
            statement: Arc::clone(parsed),
            params: params.to_vec(),
        });

        if self.autocommit {
            self.commit(database)?;
        }
        Ok(Outcome::Affected(affected))
    }

    /// Publish the session's changes.
    pub(crate) fn commit(&mut self, database: &Database) -> Result<(), Diagnostic> {
        let Some(work) = self.work.take() else {
            return Ok(());
        };
        let mut committed = database.committed.lock();

        if committed.version == work.base_version {
            committed.catalog = work.snapshot;
        } else {
            let mut replayed = committed.catalog.clone();
            for change in &work.changes {
                replayed
                    .apply(&change.statement.statement, &change.params)
                    .map_err(|diagnostic| {
                        tracing::debug!(%diagnostic, "commit conflicts with a concurrent commit");
                        Diagnostic::new(
                            SqlState::SERIALIZATION_FAILURE,
                            5,
                            format!("could not serialize transaction: {}", diagnostic.message),
                        )
                    })?;
            }
            committed.catalog = replayed;
        }
        committed.version += 1;
        tracing::trace!(
            version = committed.version,
            changes = work.changes.len(),
            "transaction committed"
        );
        Ok(())
    }

    /// Discard the session's changes.
    pub(crate) fn rollback(&mut self) {
        if let Some(work) = self.work.take() {
            tracing::trace!(changes = work.changes.len(), "transaction rolled back");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn run(
        session: &mut Session,
        database: &Database,
        sql: &str,
        params: &[SqlValue],
    ) -> Result<Outcome, Diagnostic> {
        let parsed = Arc::new(parse(sql).map_err(Diagnostic::from)?);
        session.describe(database, &parsed)?;
        session.execute(database, &parsed, params)
    }

    fn rows(outcome: Outcome) -> Vec<Row> {
        match outcome {
            Outcome::Rows(rows) => rows,
            Outcome::Affected(n) => panic!("expected rows, got {n} affected"),
        }
    }

    fn manual() -> Session {
        Session {
            autocommit: false,
            ..Session::default()
        }
    }

    fn setup(database: &Database) {
        let mut session = Session::default();
        run(
            &mut session,
            database,
            "CREATE TABLE users (id INTEGER NOT NULL, name VARCHAR(16), age SMALLINT, PRIMARY KEY (id))",
            &[],
        )
        .unwrap();
        for (id, name, age) in [(1, "ann", 31), (2, "bob", 17), (3, "cyd", 45)] {
            run(
                &mut session,
                database,
                "INSERT INTO users (id, name, age) VALUES (?, ?, ?)",
                &[
                    SqlValue::Int(id),
                    SqlValue::Text(name.into()),
                    SqlValue::Int(age),
                ],
            )
            .unwrap();
        }
    }

    #[test]
    fn test_select_filter_and_order() {
        let database = Database::default();
        setup(&database);
        let mut session = Session::default();
        let result = rows(
            run(
                &mut session,
                &database,
                "SELECT name FROM users WHERE age > ? ORDER BY age DESC",
                &[SqlValue::Int(18)],
            )
            .unwrap(),
        );
        assert_eq!(
            result,
            vec![
                vec![SqlValue::Text("cyd".into())],
                vec![SqlValue::Text("ann".into())],
            ]
        );
    }

    #[test]
    fn test_primary_key_and_not_null() {
        let database = Database::default();
        setup(&database);
        let mut session = Session::default();
        let err = run(
            &mut session,
            &database,
            "INSERT INTO users (id, name) VALUES (?, ?)",
            &[SqlValue::Int(2), SqlValue::Text("dup".into())],
        )
        .unwrap_err();
        assert_eq!(err.state, SqlState::INTEGRITY_CONSTRAINT);
        assert_eq!(err.native_error, 19);

        let err = run(
            &mut session,
            &database,
            "INSERT INTO users (name) VALUES (?)",
            &[SqlValue::Text("anon".into())],
        )
        .unwrap_err();
        assert!(err.message.contains("NOT NULL"));

        // an update that would collide leaves the table untouched
        let err = run(
            &mut session,
            &database,
            "UPDATE users SET id = ? WHERE id = ?",
            &[SqlValue::Int(1), SqlValue::Int(3)],
        )
        .unwrap_err();
        assert_eq!(err.state, SqlState::INTEGRITY_CONSTRAINT);
        assert_eq!(database.committed_rows("users").unwrap().len(), 3);
    }

    #[test]
    fn test_cross_join_with_aliases() {
        let database = Database::default();
        setup(&database);
        let mut session = Session::default();
        run(
            &mut session,
            &database,
            "CREATE TEMPORARY TABLE picks (pos INTEGER NOT NULL, id INTEGER)",
            &[],
        )
        .unwrap();
        for (pos, id) in [(0, 3), (1, 1)] {
            run(
                &mut session,
                &database,
                "INSERT INTO picks (pos, id) VALUES (?, ?)",
                &[SqlValue::Int(pos), SqlValue::Int(id)],
            )
            .unwrap();
        }
        let result = rows(
            run(
                &mut session,
                &database,
                "SELECT u.name, p.pos FROM users u, picks p WHERE u.id = p.id ORDER BY p.pos",
                &[],
            )
            .unwrap(),
        );
        assert_eq!(result.len(), 2);
        assert_eq!(result[0][0], SqlValue::Text("cyd".into()));
        assert_eq!(result[1][0], SqlValue::Text("ann".into()));

        // temporary tables are invisible to other sessions
        let mut other = Session::default();
        let err = run(&mut other, &database, "SELECT pos FROM picks", &[]).unwrap_err();
        assert_eq!(err.state, SqlState::TABLE_NOT_FOUND);
        assert!(!database.committed_names().contains(&"picks".to_string()));
    }

    #[test]
    fn test_rollback_discards_snapshot() {
        let database = Database::default();
        setup(&database);
        let mut session = manual();
        run(&mut session, &database, "DELETE FROM users", &[]).unwrap();
        assert!(session.in_transaction());
        assert!(rows(run(&mut session, &database, "SELECT id FROM users", &[]).unwrap()).is_empty());
        assert_eq!(database.committed_rows("users").unwrap().len(), 3);

        session.rollback();
        assert!(!session.in_transaction());
        assert_eq!(
            rows(run(&mut session, &database, "SELECT id FROM users", &[]).unwrap()).len(),
            3
        );
    }

    #[test]
    fn test_concurrent_commits_replay() {
        let database = Database::default();
        setup(&database);
        let mut first = manual();
        let mut second = manual();
        let insert = "INSERT INTO users (id, name) VALUES (?, ?)";
        run(&mut first, &database, insert, &[SqlValue::Int(10), SqlValue::Text("x".into())]).unwrap();
        run(&mut second, &database, insert, &[SqlValue::Int(11), SqlValue::Text("y".into())]).unwrap();
        first.commit(&database).unwrap();
        second.commit(&database).unwrap();
        assert_eq!(database.committed_rows("users").unwrap().len(), 5);

        // both insert the same key: the later commit conflicts
        run(&mut first, &database, insert, &[SqlValue::Int(20), SqlValue::Text("x".into())]).unwrap();
        run(&mut second, &database, insert, &[SqlValue::Int(20), SqlValue::Text("y".into())]).unwrap();
        first.commit(&database).unwrap();
        let err = second.commit(&database).unwrap_err();
        assert_eq!(err.state, SqlState::SERIALIZATION_FAILURE);
        assert_eq!(database.committed_rows("users").unwrap().len(), 6);
    }

    #[test]
    fn test_read_only_session() {
        let database = Database::default();
        setup(&database);
        let mut session = Session {
            read_only: true,
            ..Session::default()
        };
        let err = run(&mut session, &database, "DELETE FROM users", &[]).unwrap_err();
        assert_eq!(err.state, SqlState::READ_ONLY_TRANSACTION);
        // dropping a missing table changes nothing, so it is allowed
        run(&mut session, &database, "DROP TABLE IF EXISTS scratch", &[]).unwrap();
    }

    #[test]
    fn test_describe_reports_missing_objects() {
        let database = Database::default();
        setup(&database);
        let session = Session::default();
        let parsed = parse("SELECT * FROM users").unwrap();
        assert_eq!(session.describe(&database, &parsed).unwrap(), 3);

        let parsed = parse("SELECT nope FROM users").unwrap();
        let err = session.describe(&database, &parsed).unwrap_err();
        assert_eq!(err.state, SqlState::COLUMN_NOT_FOUND);

        let parsed = parse("DELETE FROM missing").unwrap();
        let err = session.describe(&database, &parsed).unwrap_err();
        assert_eq!(err.state, SqlState::TABLE_NOT_FOUND);
    }
}
