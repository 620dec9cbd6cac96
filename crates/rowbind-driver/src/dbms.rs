//! Database product families.

use std::fmt;

/// The family of database product behind a connection.
///
/// Classified once from the DBMS name the driver reports, then used to pick
/// dialect details and to interpret native error numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Dbms {
    /// PostgreSQL.
    PostgreSql,
    /// MySQL or MariaDB.
    MySql,
    /// SQLite.
    Sqlite,
    /// Microsoft SQL Server.
    SqlServer,
    /// Oracle Database.
    Oracle,
    /// Anything else, or not yet known.
    #[default]
    Unknown,
}

impl Dbms {
    /// Classify a `SQL_DBMS_NAME` value.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        let name = name.to_ascii_lowercase();
        if name.contains("postgres") {
            Self::PostgreSql
        } else if name.contains("mysql") || name.contains("mariadb") {
            Self::MySql
        } else if name.contains("sqlite") {
            Self::Sqlite
        } else if name.contains("sql server") {
            Self::SqlServer
        } else if name.contains("oracle") {
            Self::Oracle
        } else {
            Self::Unknown
        }
    }

    /// Whether the dialect has one byte integer columns.
    #[must_use]
    pub fn has_tiny_int(self) -> bool {
        !matches!(self, Self::PostgreSql | Self::Oracle)
    }

    /// Whether the dialect has unsigned integer columns.
    #[must_use]
    pub fn has_unsigned(self) -> bool {
        matches!(self, Self::MySql)
    }
}

impl fmt::Display for Dbms {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::PostgreSql => "PostgreSQL",
            Self::MySql => "MySQL",
            Self::Sqlite => "SQLite",
            Self::SqlServer => "SQL Server",
            Self::Oracle => "Oracle",
            Self::Unknown => "unknown DBMS",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_name() {
        assert_eq!(Dbms::from_name("PostgreSQL"), Dbms::PostgreSql);
        assert_eq!(Dbms::from_name("MariaDB"), Dbms::MySql);
        assert_eq!(Dbms::from_name("Microsoft SQL Server"), Dbms::SqlServer);
        assert_eq!(Dbms::from_name("SQLite"), Dbms::Sqlite);
        assert_eq!(Dbms::from_name("Informix"), Dbms::Unknown);
    }

    #[test]
    fn test_dialect_capabilities() {
        assert!(!Dbms::PostgreSql.has_tiny_int());
        assert!(!Dbms::PostgreSql.has_unsigned());
        assert!(Dbms::MySql.has_unsigned());
        assert!(Dbms::SqlServer.has_tiny_int());
    }
}
