//! Driver diagnostics and their classification.

use std::fmt;

use thiserror::Error;

use crate::dbms::Dbms;

/// A five character SQLSTATE code such as `23000` or `HYT00`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SqlState([u8; 5]);

impl SqlState {
    /// `HY000` general error.
    pub const GENERAL_ERROR: Self = Self(*b"HY000");
    /// `HY010` function sequence error.
    pub const FUNCTION_SEQUENCE: Self = Self(*b"HY010");
    /// `HY090` invalid buffer length.
    pub const INVALID_BUFFER_LENGTH: Self = Self(*b"HY090");
    /// `HYT00` timeout expired.
    pub const TIMEOUT: Self = Self(*b"HYT00");
    /// `HYT01` connection timeout expired.
    pub const CONNECTION_TIMEOUT: Self = Self(*b"HYT01");
    /// `07002` COUNT field incorrect.
    pub const COUNT_MISMATCH: Self = Self(*b"07002");
    /// `07006` restricted data type attribute violation.
    pub const RESTRICTED_DATA_TYPE: Self = Self(*b"07006");
    /// `07009` invalid descriptor index.
    pub const INVALID_DESCRIPTOR_INDEX: Self = Self(*b"07009");
    /// `08001` client unable to establish connection.
    pub const UNABLE_TO_CONNECT: Self = Self(*b"08001");
    /// `08003` connection does not exist.
    pub const CONNECTION_DOES_NOT_EXIST: Self = Self(*b"08003");
    /// `08S01` communication link failure.
    pub const COMMUNICATION_LINK_FAILURE: Self = Self(*b"08S01");
    /// `22001` string data, right truncation.
    pub const STRING_TRUNCATION: Self = Self(*b"22001");
    /// `22003` numeric value out of range.
    pub const NUMERIC_OUT_OF_RANGE: Self = Self(*b"22003");
    /// `22018` invalid character value for cast specification.
    pub const INVALID_CAST: Self = Self(*b"22018");
    /// `23000` integrity constraint violation.
    pub const INTEGRITY_CONSTRAINT: Self = Self(*b"23000");
    /// `24000` invalid cursor state.
    pub const INVALID_CURSOR_STATE: Self = Self(*b"24000");
    /// `25006` read-only SQL transaction.
    pub const READ_ONLY_TRANSACTION: Self = Self(*b"25006");
    /// `40001` serialization failure.
    pub const SERIALIZATION_FAILURE: Self = Self(*b"40001");
    /// `42000` syntax error or access violation.
    pub const SYNTAX_ERROR: Self = Self(*b"42000");
    /// `42S01` base table or view already exists.
    pub const TABLE_EXISTS: Self = Self(*b"42S01");
    /// `42S02` base table or view not found.
    pub const TABLE_NOT_FOUND: Self = Self(*b"42S02");
    /// `42S22` column not found.
    pub const COLUMN_NOT_FOUND: Self = Self(*b"42S22");

    /// Parse a state code; it must be exactly five ASCII alphanumerics.
    #[must_use]
    pub fn parse(code: &str) -> Option<Self> {
        let bytes: [u8; 5] = code.as_bytes().try_into().ok()?;
        if bytes.iter().all(u8::is_ascii_alphanumeric) {
            Some(Self(bytes.map(|b| b.to_ascii_uppercase())))
        } else {
            None
        }
    }

    /// The code as text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        // Constructors only admit ASCII.
        std::str::from_utf8(&self.0).unwrap_or("?????")
    }

    /// The two character class, e.g. `23` for integrity violations.
    #[must_use]
    pub fn class(&self) -> &str {
        &self.as_str()[..2]
    }
}

impl fmt::Display for SqlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for SqlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SqlState({})", self.as_str())
    }
}

/// A failure reported by a driver call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("[{state}] ({native_error}) {message}")]
pub struct Diagnostic {
    /// SQLSTATE code.
    pub state: SqlState,
    /// Native error number of the data source.
    pub native_error: i32,
    /// Diagnostic message text.
    pub message: String,
}

impl Diagnostic {
    /// Create a diagnostic.
    pub fn new(state: SqlState, native_error: i32, message: impl Into<String>) -> Self {
        Self {
            state,
            native_error,
            message: message.into(),
        }
    }

    /// Whether this diagnostic reports an expired timeout or a lock wait
    /// giving up, under the conventions of `dbms`.
    #[must_use]
    pub fn is_timeout(&self, dbms: Dbms) -> bool {
        if self.state == SqlState::TIMEOUT || self.state == SqlState::CONNECTION_TIMEOUT {
            return true;
        }
        match dbms {
            Dbms::PostgreSql => self.state.as_str() == "57014" || self.state.as_str() == "55P03",
            Dbms::MySql => matches!(self.native_error, 1205 | 3024),
            Dbms::SqlServer => self.native_error == 1222,
            Dbms::Sqlite => matches!(self.native_error, 5 | 6),
            Dbms::Oracle => matches!(self.native_error, 1013 | 30006),
            Dbms::Unknown => false,
        }
    }

    /// Whether this diagnostic reports an integrity constraint violation
    /// under the conventions of `dbms`.
    #[must_use]
    pub fn is_constraint_violation(&self, dbms: Dbms) -> bool {
        if self.state.class() == "23" {
            return true;
        }
        match dbms {
            Dbms::Sqlite => self.native_error == 19,
            Dbms::MySql => matches!(self.native_error, 1062 | 1451 | 1452),
            Dbms::SqlServer => matches!(self.native_error, 547 | 2601 | 2627),
            Dbms::Oracle => matches!(self.native_error, 1 | 2291 | 2292),
            Dbms::PostgreSql | Dbms::Unknown => false,
        }
    }

    /// Whether this diagnostic reports a broken or missing connection.
    #[must_use]
    pub fn is_connection_failure(&self) -> bool {
        self.state.class() == "08"
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_state() {
        let state = SqlState::parse("hyt00").unwrap();
        assert_eq!(state, SqlState::TIMEOUT);
        assert_eq!(state.class(), "HY");
        assert!(SqlState::parse("2300").is_none());
        assert!(SqlState::parse("23-00").is_none());
    }

    #[test]
    fn test_display() {
        let diag = Diagnostic::new(SqlState::INTEGRITY_CONSTRAINT, 19, "UNIQUE constraint failed");
        assert_eq!(diag.to_string(), "[23000] (19) UNIQUE constraint failed");
    }

    #[test]
    fn test_timeout_classification() {
        let generic = Diagnostic::new(SqlState::TIMEOUT, 0, "timeout");
        assert!(generic.is_timeout(Dbms::Unknown));

        let pg = Diagnostic::new(SqlState::parse("57014").unwrap(), 0, "canceling statement");
        assert!(pg.is_timeout(Dbms::PostgreSql));
        assert!(!pg.is_timeout(Dbms::MySql));

        let mysql = Diagnostic::new(SqlState::GENERAL_ERROR, 1205, "Lock wait timeout exceeded");
        assert!(mysql.is_timeout(Dbms::MySql));
        assert!(!mysql.is_timeout(Dbms::SqlServer));
    }

    #[test]
    fn test_constraint_classification() {
        let class23 = Diagnostic::new(SqlState::parse("23505").unwrap(), 0, "duplicate key");
        assert!(class23.is_constraint_violation(Dbms::PostgreSql));

        let sqlite = Diagnostic::new(SqlState::GENERAL_ERROR, 19, "constraint failed");
        assert!(sqlite.is_constraint_violation(Dbms::Sqlite));
        assert!(!sqlite.is_constraint_violation(Dbms::PostgreSql));
    }

    #[test]
    fn test_connection_failure() {
        let diag = Diagnostic::new(SqlState::COMMUNICATION_LINK_FAILURE, 0, "link down");
        assert!(diag.is_connection_failure());
        assert!(!Diagnostic::new(SqlState::SYNTAX_ERROR, 0, "").is_connection_failure());
    }
}
