//! Connections and the environment that opens them.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use once_cell::unsync::OnceCell;
use parking_lot::Mutex;
use rowbind_driver::{
    BindBuffer, Completion, ConnectionAttribute, Dbms, Diagnostic, Driver, DriverConnection,
    IsolationLevel,
};

use crate::config::{Config, DEFAULT_FETCH_SIZE};
use crate::error::{Error, Result};
use crate::statement::Statement;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// The shared driver environment.
///
/// Opening connections goes through one mutex because the driver's
/// environment handle is not safe for concurrent opens; once open,
/// connections are independent.
pub struct Environment {
    driver: Arc<dyn Driver>,
    open_lock: Mutex<()>,
}

impl Environment {
    /// Wrap a driver.
    pub fn new(driver: Arc<dyn Driver>) -> Self {
        Self {
            driver,
            open_lock: Mutex::new(()),
        }
    }

    /// Open a connection and apply the client options of `config`.
    ///
    /// Auto-commit is always switched off: changes become durable only
    /// through an explicit commit.
    pub fn connect(&self, config: &Config) -> Result<Connection> {
        let handle = {
            let _guard = self.open_lock.lock();
            self.driver.connect(config.connection_string())
        }
        .map_err(|source| Error::driver(Dbms::Unknown, source))?;

        let mut connection = Connection::new(handle);
        connection.fetch_size = config.fetch_size;
        connection.set_attribute(ConnectionAttribute::AutoCommit(false))?;
        if let Some(level) = config.isolation_level {
            connection.set_isolation_level(level)?;
        }
        if config.read_only {
            connection.set_read_only(true)?;
        }

        tracing::debug!(
            connection_id = connection.id,
            dbms = %connection.dbms(),
            "connection opened"
        );
        Ok(connection)
    }
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment").finish_non_exhaustive()
    }
}

/// One open database session.
///
/// The session is closed when the `Connection` is dropped. Statements
/// prepared on it carry its [`id`](Self::id) so that caches can refuse to
/// mix statements of different sessions.
pub struct Connection {
    id: u64,
    handle: Box<dyn DriverConnection>,
    dbms: OnceCell<Dbms>,
    isolation_level: Option<IsolationLevel>,
    read_only: bool,
    fetch_size: usize,
}

impl Connection {
    pub(crate) fn new(handle: Box<dyn DriverConnection>) -> Self {
        Self {
            id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            handle,
            dbms: OnceCell::new(),
            isolation_level: None,
            read_only: false,
            fetch_size: DEFAULT_FETCH_SIZE,
        }
    }

    /// Process-unique identifier of this connection.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Family of the connected data source, classified once and cached.
    #[must_use]
    pub fn dbms(&self) -> Dbms {
        *self.dbms.get_or_init(|| match self.handle.dbms_name() {
            Ok(name) => Dbms::from_name(&name),
            Err(diagnostic) => {
                tracing::debug!(connection_id = self.id, %diagnostic, "DBMS name unavailable");
                Dbms::Unknown
            }
        })
    }

    /// Rows per round trip for bulk selects that do not set their own.
    #[must_use]
    pub fn fetch_size(&self) -> usize {
        self.fetch_size
    }

    /// Whether the driver reports the session as unusable.
    #[must_use]
    pub fn is_dead(&self) -> bool {
        self.handle.is_dead()
    }

    /// Isolation level last set on this connection.
    #[must_use]
    pub fn isolation_level(&self) -> Option<IsolationLevel> {
        self.isolation_level
    }

    /// Set the transaction isolation level.
    pub fn set_isolation_level(&mut self, level: IsolationLevel) -> Result<()> {
        self.set_attribute(ConnectionAttribute::Isolation(level))?;
        self.isolation_level = Some(level);
        Ok(())
    }

    /// Whether the connection is in read-only access mode.
    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Switch read-only access mode.
    pub fn set_read_only(&mut self, read_only: bool) -> Result<()> {
        self.set_attribute(ConnectionAttribute::ReadOnly(read_only))?;
        self.read_only = read_only;
        Ok(())
    }

    /// Prepare a statement.
    pub fn prepare(&mut self, sql: &str) -> Result<Statement> {
        let result = self.handle.prepare(sql);
        let handle = self.check(result)?;
        tracing::debug!(connection_id = self.id, sql, "statement prepared");
        Ok(Statement::new(handle, self.id, self.dbms(), sql))
    }

    /// Prepare and execute a statement without parameters or results,
    /// typically DDL.
    pub fn execute(&mut self, sql: &str) -> Result<()> {
        let mut statement = self.prepare(sql)?;
        statement.exec(&BindBuffer::new(0, 1))
    }

    /// Commit the current transaction.
    pub fn commit(&mut self) -> Result<()> {
        let result = self.handle.end_transaction(Completion::Commit);
        self.check(result)?;
        tracing::debug!(connection_id = self.id, "transaction committed");
        Ok(())
    }

    /// Roll back the current transaction.
    pub fn rollback(&mut self) -> Result<()> {
        let result = self.handle.end_transaction(Completion::Rollback);
        self.check(result)?;
        tracing::debug!(connection_id = self.id, "transaction rolled back");
        Ok(())
    }

    fn set_attribute(&mut self, attribute: ConnectionAttribute) -> Result<()> {
        let result = self.handle.set_attribute(attribute);
        self.check(result)
    }

    fn check<T>(&self, result: std::result::Result<T, Diagnostic>) -> Result<T> {
        result.map_err(|source| Error::driver(self.dbms(), source))
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("dbms", &self.dbms.get())
            .field("isolation_level", &self.isolation_level)
            .field("read_only", &self.read_only)
            .finish_non_exhaustive()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Err(diagnostic) = self.handle.disconnect() {
            tracing::warn!(connection_id = self.id, %diagnostic, "disconnect failed");
        } else {
            tracing::debug!(connection_id = self.id, "connection closed");
        }
    }
}
