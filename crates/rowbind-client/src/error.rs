//! Client error types.

use rowbind_driver::{Dbms, Diagnostic};
use rowbind_types::{TypeError, TypeTag};
use thiserror::Error;

use crate::binding::StatementState;

/// Errors that can occur while using connections and statements.
#[derive(Debug, Error)]
pub enum Error {
    /// A driver call failed.
    #[error("{dbms} error: {source}")]
    Driver {
        /// Family of the data source that reported the failure.
        dbms: Dbms,
        /// The driver diagnostic.
        #[source]
        source: Diagnostic,
    },

    /// A value could not be converted.
    #[error("type conversion error: {0}")]
    Type(#[from] TypeError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// A table or column name is not a valid identifier.
    #[error("invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    /// A statement cache was used with a connection other than the one
    /// whose statements it holds.
    #[error("statement cache belongs to connection {expected}, used with connection {actual}")]
    ForeignConnection {
        /// Connection the cache is bound to.
        expected: u64,
        /// Connection it was used with.
        actual: u64,
    },

    /// A record does not have the number of columns required.
    #[error("expected {expected} columns, got {actual}")]
    ColumnCount {
        /// Required column count.
        expected: usize,
        /// Supplied column count.
        actual: usize,
    },

    /// A key value does not have the type of the column it addresses.
    #[error("column {index} has type {expected}, got {actual}")]
    ColumnType {
        /// Column index in the table.
        index: usize,
        /// Type of the table column.
        expected: TypeTag,
        /// Type supplied by the caller.
        actual: TypeTag,
    },

    /// A column index is out of range or repeated.
    #[error("invalid column index {index} for a table of {columns} columns")]
    ColumnIndex {
        /// The rejected index.
        index: usize,
        /// Number of columns in the table.
        columns: usize,
    },

    /// An operation was attempted in a state that does not allow it.
    #[error("cannot {operation} a statement that is {state}")]
    InvalidState {
        /// The attempted operation.
        operation: &'static str,
        /// State of the statement.
        state: StatementState,
    },
}

impl Error {
    pub(crate) fn driver(dbms: Dbms, source: Diagnostic) -> Self {
        Self::Driver { dbms, source }
    }

    /// The driver diagnostic, if this error came from the driver.
    #[must_use]
    pub fn diagnostic(&self) -> Option<&Diagnostic> {
        match self {
            Self::Driver { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Check if this error reports an expired timeout.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Driver { dbms, source } => source.is_timeout(*dbms),
            _ => false,
        }
    }

    /// Check if this error reports an integrity constraint violation.
    #[must_use]
    pub fn is_constraint_violation(&self) -> bool {
        match self {
            Self::Driver { dbms, source } => source.is_constraint_violation(*dbms),
            _ => false,
        }
    }

    /// Check if this error reports a broken connection.
    #[must_use]
    pub fn is_connection_failure(&self) -> bool {
        match self {
            Self::Driver { source, .. } => source.is_connection_failure(),
            _ => false,
        }
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;
