//! The in-memory implementation of the driver boundary.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use rowbind_client::{Config, Connection, Environment};
use rowbind_driver::{
    BindBuffer, Completion, ConnectionAttribute, Diagnostic, Driver, DriverConnection,
    DriverStatement, SqlState,
};
use rowbind_types::{Cell, ColumnType, SqlValue};

use crate::convert;
use crate::engine::{Database, Outcome, Row, Session};
use crate::parser::{self, Parsed, Statement};
use crate::stats::{Counter, Counters, MemStats};

/// Connection string used by [`MemDriver::connection`].
pub const CONNECTION_STRING: &str = "DRIVER=rowbind-mem;DATABASE=main";

/// DBMS name reported unless overridden.
pub const DEFAULT_DBMS_NAME: &str = "SQLite";

/// Faults armed for the next matching call.
#[derive(Debug, Default)]
struct Faults {
    execute: Option<(Diagnostic, bool)>,
    connect: Option<Diagnostic>,
}

#[derive(Debug)]
struct MemServer {
    database: Database,
    counters: Counters,
    faults: Mutex<Faults>,
    dbms_name: Mutex<String>,
    next_connection: AtomicU64,
}

/// A driver backed by an in-memory SQL engine.
///
/// Every connection opened through one `MemDriver` (or its clones) shares
/// the same committed tables, counters and armed faults.
///
/// ```rust,ignore
/// let driver = MemDriver::new();
/// let mut conn = driver.connection()?;
/// conn.execute("CREATE TABLE t (id INTEGER NOT NULL, PRIMARY KEY (id))")?;
/// conn.commit()?;
/// assert_eq!(driver.stats().connections_opened, 1);
/// ```
#[derive(Debug, Clone)]
pub struct MemDriver {
    server: Arc<MemServer>,
}

impl MemDriver {
    /// Create a driver with an empty database.
    #[must_use]
    pub fn new() -> Self {
        Self {
            server: Arc::new(MemServer {
                database: Database::default(),
                counters: Counters::default(),
                faults: Mutex::new(Faults::default()),
                dbms_name: Mutex::new(DEFAULT_DBMS_NAME.to_string()),
                next_connection: AtomicU64::new(1),
            }),
        }
    }

    /// Report `name` as the DBMS name of every connection.
    #[must_use]
    pub fn with_dbms_name(self, name: &str) -> Self {
        *self.server.dbms_name.lock() = name.to_string();
        self
    }

    /// This driver as a shared trait object, as environments and pools take it.
    #[must_use]
    pub fn shared(&self) -> Arc<dyn Driver> {
        Arc::new(self.clone())
    }

    /// An environment over this driver.
    #[must_use]
    pub fn environment(&self) -> Environment {
        Environment::new(self.shared())
    }

    /// Open a client connection with default options.
    pub fn connection(&self) -> rowbind_client::Result<Connection> {
        let config = Config::from_connection_string(CONNECTION_STRING)?;
        self.environment().connect(&config)
    }

    /// Counters of the calls served so far.
    #[must_use]
    pub fn stats(&self) -> MemStats {
        self.server.counters.snapshot()
    }

    /// Zero every counter.
    pub fn reset_stats(&self) {
        self.server.counters.reset();
    }

    /// Make the next `execute` on any connection fail with `diagnostic`.
    /// With `kill_connection` the connection is reported dead afterwards.
    pub fn fail_next_execute(&self, diagnostic: Diagnostic, kill_connection: bool) {
        self.server.faults.lock().execute = Some((diagnostic, kill_connection));
    }

    /// Make the next connection attempt fail with `diagnostic`.
    pub fn fail_next_connect(&self, diagnostic: Diagnostic) {
        self.server.faults.lock().connect = Some(diagnostic);
    }

    /// Names of the committed tables, sorted.
    #[must_use]
    pub fn table_names(&self) -> Vec<String> {
        self.server.database.committed_names()
    }

    /// Committed rows of `table` in insertion order, if it exists.
    #[must_use]
    pub fn rows(&self, table: &str) -> Option<Vec<Vec<SqlValue>>> {
        self.server.database.committed_rows(table)
    }
}

impl Default for MemDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl Driver for MemDriver {
    fn connect(&self, connection_string: &str) -> Result<Box<dyn DriverConnection>, Diagnostic> {
        if let Some(diagnostic) = self.server.faults.lock().connect.take() {
            tracing::debug!(%diagnostic, "injected connect failure");
            return Err(diagnostic);
        }

        let id = self.server.next_connection.fetch_add(1, Ordering::Relaxed);
        self.server.counters.record(Counter::ConnectionOpened);
        tracing::debug!(session_id = id, connection_string, "in-memory session opened");
        Ok(Box::new(MemConnection {
            server: Arc::clone(&self.server),
            state: Arc::new(Mutex::new(SessionState {
                id,
                session: Session::default(),
                dead: false,
                closed: false,
            })),
        }))
    }
}

/// A session and its liveness, shared by a connection and its statements.
#[derive(Debug)]
struct SessionState {
    id: u64,
    session: Session,
    dead: bool,
    closed: bool,
}

impl SessionState {
    fn check_alive(&self) -> Result<(), Diagnostic> {
        if self.closed {
            Err(Diagnostic::new(
                SqlState::CONNECTION_DOES_NOT_EXIST,
                0,
                "connection is closed",
            ))
        } else if self.dead {
            Err(Diagnostic::new(
                SqlState::COMMUNICATION_LINK_FAILURE,
                0,
                "communication link failure",
            ))
        } else {
            Ok(())
        }
    }
}

struct MemConnection {
    server: Arc<MemServer>,
    state: Arc<Mutex<SessionState>>,
}

impl DriverConnection for MemConnection {
    fn prepare(&mut self, sql: &str) -> Result<Box<dyn DriverStatement>, Diagnostic> {
        let state = self.state.lock();
        state.check_alive()?;
        self.server.counters.record(Counter::Prepare);

        let parsed = parser::parse(sql)?;
        let result_columns = state.session.describe(&self.server.database, &parsed)?;
        let parameters = parsed.parameters;
        Ok(Box::new(MemStatement {
            server: Arc::clone(&self.server),
            state: Arc::clone(&self.state),
            parsed: Arc::new(parsed),
            parameters: vec![None; parameters],
            columns: vec![None; result_columns],
            param_array: 1,
            row_array: 1,
            cursor: None,
        }))
    }

    fn set_attribute(&mut self, attribute: ConnectionAttribute) -> Result<(), Diagnostic> {
        let mut state = self.state.lock();
        state.check_alive()?;
        match attribute {
            ConnectionAttribute::AutoCommit(on) => {
                if on && !state.session.autocommit {
                    state.session.commit(&self.server.database)?;
                }
                state.session.autocommit = on;
            }
            ConnectionAttribute::ReadOnly(read_only) => state.session.read_only = read_only,
            ConnectionAttribute::Isolation(level) => {
                tracing::trace!(session_id = state.id, ?level, "isolation level set");
            }
        }
        Ok(())
    }

    fn end_transaction(&mut self, completion: Completion) -> Result<(), Diagnostic> {
        let mut state = self.state.lock();
        state.check_alive()?;
        match completion {
            Completion::Commit => {
                state.session.commit(&self.server.database)?;
                self.server.counters.record(Counter::Commit);
            }
            Completion::Rollback => {
                state.session.rollback();
                self.server.counters.record(Counter::Rollback);
            }
        }
        Ok(())
    }

    fn is_dead(&self) -> bool {
        self.state.lock().dead
    }

    fn dbms_name(&self) -> Result<String, Diagnostic> {
        Ok(self.server.dbms_name.lock().clone())
    }

    fn disconnect(&mut self) -> Result<(), Diagnostic> {
        let mut state = self.state.lock();
        if state.closed {
            return state.check_alive();
        }
        if state.session.in_transaction() {
            tracing::debug!(session_id = state.id, "open transaction rolled back on disconnect");
            state.session.rollback();
        }
        state.closed = true;
        self.server.counters.record(Counter::ConnectionClosed);
        tracing::debug!(session_id = state.id, "in-memory session closed");
        Ok(())
    }
}

/// An open result set.
#[derive(Debug)]
struct Cursor {
    rows: Vec<Row>,
    position: usize,
}

struct MemStatement {
    server: Arc<MemServer>,
    state: Arc<Mutex<SessionState>>,
    parsed: Arc<Parsed>,
    parameters: Vec<Option<ColumnType>>,
    columns: Vec<Option<ColumnType>>,
    param_array: usize,
    row_array: usize,
    cursor: Option<Cursor>,
}

fn invalid_index(slot: u16, available: usize) -> Diagnostic {
    Diagnostic::new(
        SqlState::INVALID_DESCRIPTOR_INDEX,
        25,
        format!("slot {slot} is not between 1 and {available}"),
    )
}

fn bind_slot(
    slots: &mut [Option<ColumnType>],
    slot: u16,
    column: ColumnType,
) -> Result<(), Diagnostic> {
    let available = slots.len();
    let target = usize::from(slot)
        .checked_sub(1)
        .and_then(|index| slots.get_mut(index))
        .ok_or_else(|| invalid_index(slot, available))?;
    *target = Some(column);
    Ok(())
}

fn invalid_buffer(message: String) -> Diagnostic {
    Diagnostic::new(SqlState::INVALID_BUFFER_LENGTH, 0, message)
}

impl MemStatement {
    fn check_alive(&self) -> Result<(), Diagnostic> {
        self.state.lock().check_alive()
    }
}

impl DriverStatement for MemStatement {
    fn bind_parameter(&mut self, slot: u16, column: ColumnType) -> Result<(), Diagnostic> {
        self.check_alive()?;
        self.server.counters.record(Counter::ParameterBind);
        bind_slot(&mut self.parameters, slot, column)
    }

    fn bind_column(&mut self, slot: u16, column: ColumnType) -> Result<(), Diagnostic> {
        self.check_alive()?;
        self.server.counters.record(Counter::ColumnBind);
        bind_slot(&mut self.columns, slot, column)
    }

    fn bind_parameter_array(&mut self, stride: usize, count: usize) -> Result<(), Diagnostic> {
        self.check_alive()?;
        self.server.counters.record(Counter::ParameterArrayBind);
        if stride < self.parameters.len() {
            return Err(invalid_buffer(format!(
                "parameter stride {stride} is shorter than {} parameters",
                self.parameters.len()
            )));
        }
        self.param_array = count;
        Ok(())
    }

    fn bind_row_array(&mut self, stride: usize, count: usize) -> Result<(), Diagnostic> {
        self.check_alive()?;
        self.server.counters.record(Counter::RowArrayBind);
        if count == 0 {
            return Err(invalid_buffer("row array size must be at least 1".into()));
        }
        if stride < self.columns.len() {
            return Err(invalid_buffer(format!(
                "row stride {stride} is shorter than {} columns",
                self.columns.len()
            )));
        }
        self.row_array = count;
        Ok(())
    }

    fn execute(&mut self, params: &BindBuffer) -> Result<(), Diagnostic> {
        let mut state = self.state.lock();
        state.check_alive()?;
        self.server.counters.record(Counter::Execute);

        let fault = self.server.faults.lock().execute.take();
        if let Some((diagnostic, kill)) = fault {
            tracing::debug!(session_id = state.id, %diagnostic, kill, "injected execute failure");
            state.dead |= kill;
            return Err(diagnostic);
        }

        if self.cursor.is_some() {
            return Err(Diagnostic::new(
                SqlState::INVALID_CURSOR_STATE,
                0,
                "a cursor is already open on this statement",
            ));
        }
        let bound = self.parameters.iter().filter(|slot| slot.is_some()).count();
        if bound != self.parameters.len() {
            return Err(Diagnostic::new(
                SqlState::COUNT_MISMATCH,
                0,
                format!(
                    "statement has {} parameters, {bound} bound",
                    self.parameters.len()
                ),
            ));
        }
        if params.stride() < self.parameters.len() || params.rows() < self.param_array {
            return Err(invalid_buffer(format!(
                "parameter buffer of {} rows x {} slots is smaller than {} x {}",
                params.rows(),
                params.stride(),
                self.param_array,
                self.parameters.len()
            )));
        }
        let is_query = matches!(self.parsed.statement, Statement::Select(_));
        if is_query && self.param_array > 1 {
            return Err(Diagnostic::new(
                SqlState::GENERAL_ERROR,
                0,
                "parameter arrays are not supported for queries",
            ));
        }

        let width = self.parameters.len();
        for index in 0..self.param_array {
            let values: Vec<SqlValue> = params.row(index)[..width]
                .iter()
                .map(|cell| {
                    if cell.is_null() {
                        SqlValue::Null
                    } else {
                        cell.value.clone()
                    }
                })
                .collect();
            match state
                .session
                .execute(&self.server.database, &self.parsed, &values)?
            {
                Outcome::Rows(rows) => {
                    tracing::trace!(session_id = state.id, rows = rows.len(), "query executed");
                    self.cursor = Some(Cursor { rows, position: 0 });
                }
                Outcome::Affected(affected) => {
                    tracing::trace!(session_id = state.id, affected, "statement executed");
                }
            }
        }
        Ok(())
    }

    fn fetch(&mut self, rows: &mut BindBuffer) -> Result<usize, Diagnostic> {
        self.check_alive()?;
        self.server.counters.record(Counter::Fetch);

        let Some(cursor) = self.cursor.as_mut() else {
            return Err(Diagnostic::new(
                SqlState::INVALID_CURSOR_STATE,
                0,
                "no cursor is open on this statement",
            ));
        };
        let last_bound = self
            .columns
            .iter()
            .rposition(Option::is_some)
            .map_or(0, |index| index + 1);
        if rows.rows() < self.row_array || rows.stride() < last_bound {
            return Err(invalid_buffer(format!(
                "row buffer of {} rows x {} slots is smaller than {} x {last_bound}",
                rows.rows(),
                rows.stride(),
                self.row_array
            )));
        }

        let remaining = &cursor.rows[cursor.position..];
        let count = remaining.len().min(self.row_array);
        for (index, source) in remaining[..count].iter().enumerate() {
            let target = rows.row_mut(index);
            for (slot, column) in self.columns.iter().enumerate() {
                if let Some(column) = column {
                    target[slot] = Cell::new(convert::fetch(&source[slot], column.tag)?);
                }
            }
        }
        cursor.position += count;
        Ok(count)
    }

    fn close_cursor(&mut self) -> Result<(), Diagnostic> {
        self.cursor = None;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use rowbind_types::TypeTag;

    use super::*;

    fn open(driver: &MemDriver) -> Box<dyn DriverConnection> {
        let mut conn = driver.connect(CONNECTION_STRING).unwrap();
        conn.set_attribute(ConnectionAttribute::AutoCommit(false))
            .unwrap();
        conn
    }

    fn exec(conn: &mut Box<dyn DriverConnection>, sql: &str) {
        let mut stmt = conn.prepare(sql).unwrap();
        stmt.execute(&BindBuffer::new(0, 1)).unwrap();
    }

    fn int() -> ColumnType {
        ColumnType::new(TypeTag::Integer)
    }

    #[test]
    fn test_parameter_array_and_row_array() {
        let driver = MemDriver::new();
        let mut conn = open(&driver);
        exec(&mut conn, "CREATE TABLE t (a INTEGER NOT NULL, PRIMARY KEY (a))");

        let mut insert = conn.prepare("INSERT INTO t (a) VALUES (?)").unwrap();
        insert.bind_parameter(1, int()).unwrap();
        insert.bind_parameter_array(1, 5).unwrap();
        let mut params = BindBuffer::new(1, 5);
        for i in 0..5 {
            params.row_mut(i)[0] = Cell::new(SqlValue::Int(i as i64));
        }
        insert.execute(&params).unwrap();

        let mut select = conn.prepare("SELECT a FROM t ORDER BY a").unwrap();
        select.bind_column(1, int()).unwrap();
        select.bind_row_array(1, 2).unwrap();
        select.execute(&BindBuffer::new(0, 1)).unwrap();
        let mut rows = BindBuffer::new(1, 2);
        assert_eq!(select.fetch(&mut rows).unwrap(), 2);
        assert_eq!(select.fetch(&mut rows).unwrap(), 2);
        assert_eq!(rows.row(1)[0].value, SqlValue::Int(3));
        assert_eq!(select.fetch(&mut rows).unwrap(), 1);
        assert_eq!(select.fetch(&mut rows).unwrap(), 0);

        let stats = driver.stats();
        assert_eq!(stats.parameter_array_binds, 1);
        assert_eq!(stats.row_array_binds, 1);
        assert_eq!(stats.fetches, 4);
    }

    #[test]
    fn test_cursor_state_errors() {
        let driver = MemDriver::new();
        let mut conn = open(&driver);
        exec(&mut conn, "CREATE TABLE t (a INTEGER)");

        let mut select = conn.prepare("SELECT a FROM t").unwrap();
        let mut rows = BindBuffer::new(1, 1);
        let err = select.fetch(&mut rows).unwrap_err();
        assert_eq!(err.state, SqlState::INVALID_CURSOR_STATE);

        select.execute(&BindBuffer::new(0, 1)).unwrap();
        let err = select.execute(&BindBuffer::new(0, 1)).unwrap_err();
        assert_eq!(err.state, SqlState::INVALID_CURSOR_STATE);
        select.close_cursor().unwrap();
        select.execute(&BindBuffer::new(0, 1)).unwrap();
    }

    #[test]
    fn test_binding_errors() {
        let driver = MemDriver::new();
        let mut conn = open(&driver);
        exec(&mut conn, "CREATE TABLE t (a INTEGER, b INTEGER)");

        let mut stmt = conn.prepare("SELECT a FROM t WHERE b = ?").unwrap();
        assert_eq!(
            stmt.bind_column(2, int()).unwrap_err().state,
            SqlState::INVALID_DESCRIPTOR_INDEX
        );
        assert_eq!(
            stmt.bind_parameter(0, int()).unwrap_err().state,
            SqlState::INVALID_DESCRIPTOR_INDEX
        );
        let err = stmt.execute(&BindBuffer::new(0, 1)).unwrap_err();
        assert_eq!(err.state, SqlState::COUNT_MISMATCH);

        stmt.bind_parameter(1, int()).unwrap();
        stmt.bind_column(1, int()).unwrap();
        stmt.bind_row_array(1, 4).unwrap();
        stmt.execute(&BindBuffer::new(1, 1)).unwrap();
        let mut short = BindBuffer::new(1, 2);
        let err = stmt.fetch(&mut short).unwrap_err();
        assert_eq!(err.state, SqlState::INVALID_BUFFER_LENGTH);
    }

    #[test]
    fn test_injected_faults() {
        let driver = MemDriver::new();
        driver.fail_next_connect(Diagnostic::new(SqlState::UNABLE_TO_CONNECT, 0, "refused"));
        assert!(driver.connect(CONNECTION_STRING).is_err());

        let mut conn = open(&driver);
        exec(&mut conn, "CREATE TABLE t (a INTEGER)");
        driver.fail_next_execute(
            Diagnostic::new(SqlState::COMMUNICATION_LINK_FAILURE, 0, "reset by peer"),
            true,
        );
        let mut stmt = conn.prepare("DELETE FROM t").unwrap();
        let err = stmt.execute(&BindBuffer::new(0, 1)).unwrap_err();
        assert!(err.is_connection_failure());
        assert!(conn.is_dead());
        assert!(conn.prepare("DELETE FROM t").is_err());
        conn.disconnect().unwrap();
        assert_eq!(driver.stats().open_connections(), 0);
    }

    #[test]
    fn test_disconnect_rolls_back() {
        let driver = MemDriver::new();
        let mut conn = open(&driver);
        exec(&mut conn, "CREATE TABLE t (a INTEGER)");
        conn.end_transaction(Completion::Commit).unwrap();
        exec(&mut conn, "INSERT INTO t (a) VALUES (1)");
        conn.disconnect().unwrap();
        assert_eq!(driver.rows("t").unwrap().len(), 0);
        assert_eq!(
            conn.disconnect().unwrap_err().state,
            SqlState::CONNECTION_DOES_NOT_EXIST
        );
    }

    #[test]
    fn test_dbms_name_override() {
        let driver = MemDriver::new().with_dbms_name("PostgreSQL");
        let conn = driver.connect(CONNECTION_STRING).unwrap();
        assert_eq!(conn.dbms_name().unwrap(), "PostgreSQL");
    }
}
