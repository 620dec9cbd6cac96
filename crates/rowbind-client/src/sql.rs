//! SQL text generation for table statements.
//!
//! Statements address columns by name in the table's declared order and use
//! `?` placeholders, so one generated text serves every call with the same
//! column set.

use once_cell::sync::Lazy;
use regex::Regex;
use rowbind_driver::Dbms;
use rowbind_types::{ColumnType, TypeTag};

use crate::error::{Error, Result};

bitflags::bitflags! {
    /// Options for [`create_table`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CreateFlags: u8 {
        /// Drop an existing table of the same name first.
        const DROP_TABLE_IF_EXISTS = 0b01;
        /// Create a session-local temporary table.
        const TEMPORARY_TABLE = 0b10;
    }
}

static IDENTIFIER_RE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]{0,127}$").ok());

/// Validate a table or column name to prevent SQL injection.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidIdentifier(
            "identifier cannot be empty".into(),
        ));
    }

    let valid = IDENTIFIER_RE
        .as_ref()
        .is_some_and(|re| re.is_match(name));
    if !valid {
        return Err(Error::InvalidIdentifier(format!(
            "invalid identifier '{name}': must start with letter/underscore, \
             contain only alphanumerics/_, and be 1-128 characters"
        )));
    }

    Ok(())
}

fn validate_all<S: AsRef<str>>(names: &[S]) -> Result<()> {
    names.iter().try_for_each(|name| validate_identifier(name.as_ref()))
}

fn join<S: AsRef<str>>(names: &[S], suffix: &str, separator: &str) -> String {
    names
        .iter()
        .map(|name| format!("{}{suffix}", name.as_ref()))
        .collect::<Vec<_>>()
        .join(separator)
}

/// The column type as written in DDL for `dbms`.
///
/// Dialects without one byte or unsigned integers get the next wider signed
/// type.
#[must_use]
pub fn column_ddl(tag: TypeTag, dbms: Dbms) -> String {
    let unsigned = dbms.has_unsigned();
    match tag {
        TypeTag::TinyInt if !dbms.has_tiny_int() => "SMALLINT".into(),
        TypeTag::UTinyInt if !unsigned => "SMALLINT".into(),
        TypeTag::USmallInt if !unsigned => "INTEGER".into(),
        TypeTag::UInteger if !unsigned => "BIGINT".into(),
        TypeTag::UBigInt if !unsigned => "NUMERIC(20)".into(),
        TypeTag::Double if dbms == Dbms::SqlServer => "FLOAT".into(),
        TypeTag::Bit if dbms == Dbms::SqlServer => "BIT".into(),
        TypeTag::Timestamp if dbms == Dbms::SqlServer => "DATETIME2".into(),
        other => other.to_string(),
    }
}

/// `CREATE [TEMPORARY] TABLE`, preceded by `DROP TABLE IF EXISTS` when
/// requested.
pub fn create_table<S: AsRef<str>>(
    dbms: Dbms,
    table: &str,
    names: &[S],
    types: &[ColumnType],
    primary_key: &[usize],
    flags: CreateFlags,
) -> Result<Vec<String>> {
    validate_identifier(table)?;
    validate_all(names)?;
    if names.len() != types.len() {
        return Err(Error::ColumnCount {
            expected: types.len(),
            actual: names.len(),
        });
    }

    let mut statements = Vec::with_capacity(2);
    if flags.contains(CreateFlags::DROP_TABLE_IF_EXISTS) {
        statements.push(drop_table(table, true)?);
    }

    let mut stmt = String::from("CREATE ");
    if flags.contains(CreateFlags::TEMPORARY_TABLE) {
        stmt.push_str("TEMPORARY ");
    }
    stmt.push_str("TABLE ");
    stmt.push_str(table);
    stmt.push_str(" (");

    let columns: Vec<String> = names
        .iter()
        .zip(types)
        .map(|(name, column)| {
            let null = if column.nullable { "" } else { " NOT NULL" };
            format!("{} {}{null}", name.as_ref(), column_ddl(column.tag, dbms))
        })
        .collect();
    stmt.push_str(&columns.join(", "));

    if !primary_key.is_empty() {
        let key = primary_key
            .iter()
            .map(|&index| {
                names
                    .get(index)
                    .map(|name| name.as_ref().to_string())
                    .ok_or(Error::ColumnIndex {
                        index,
                        columns: names.len(),
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        stmt.push_str(", PRIMARY KEY (");
        stmt.push_str(&key.join(", "));
        stmt.push(')');
    }
    stmt.push(')');

    statements.push(stmt);
    Ok(statements)
}

/// `DROP TABLE [IF EXISTS] table`.
pub fn drop_table(table: &str, if_exists: bool) -> Result<String> {
    validate_identifier(table)?;
    let if_exists = if if_exists { "IF EXISTS " } else { "" };
    Ok(format!("DROP TABLE {if_exists}{table}"))
}

/// `SELECT columns FROM table [WHERE key = ? AND ...]`.
pub fn select<S: AsRef<str>>(table: &str, columns: &[S], keys: &[S]) -> Result<String> {
    validate_identifier(table)?;
    validate_all(columns)?;
    validate_all(keys)?;

    let mut stmt = format!("SELECT {} FROM {table}", join(columns, "", ", "));
    if !keys.is_empty() {
        stmt.push_str(" WHERE ");
        stmt.push_str(&join(keys, " = ?", " AND "));
    }
    Ok(stmt)
}

/// `INSERT INTO table (columns) VALUES (?, ...)`.
pub fn insert<S: AsRef<str>>(table: &str, columns: &[S]) -> Result<String> {
    validate_identifier(table)?;
    validate_all(columns)?;

    let placeholders = vec!["?"; columns.len()].join(", ");
    Ok(format!(
        "INSERT INTO {table} ({}) VALUES ({placeholders})",
        join(columns, "", ", ")
    ))
}

/// `UPDATE table SET value = ?, ... [WHERE key = ? AND ...]`.
pub fn update<S: AsRef<str>>(table: &str, values: &[S], keys: &[S]) -> Result<String> {
    validate_identifier(table)?;
    validate_all(values)?;
    validate_all(keys)?;

    let mut stmt = format!("UPDATE {table} SET {}", join(values, " = ?", ", "));
    if !keys.is_empty() {
        stmt.push_str(" WHERE ");
        stmt.push_str(&join(keys, " = ?", " AND "));
    }
    Ok(stmt)
}

/// `DELETE FROM table [WHERE key = ? AND ...]`.
pub fn delete_from<S: AsRef<str>>(table: &str, keys: &[S]) -> Result<String> {
    validate_identifier(table)?;
    validate_all(keys)?;

    let mut stmt = format!("DELETE FROM {table}");
    if !keys.is_empty() {
        stmt.push_str(" WHERE ");
        stmt.push_str(&join(keys, " = ?", " AND "));
    }
    Ok(stmt)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_identifier_valid() {
        assert!(validate_identifier("my_table").is_ok());
        assert!(validate_identifier("Table123").is_ok());
        assert!(validate_identifier("_private").is_ok());
    }

    #[test]
    fn test_validate_identifier_invalid() {
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("123abc").is_err());
        assert!(validate_identifier("table-name").is_err());
        assert!(validate_identifier("table name").is_err());
        assert!(validate_identifier("table;DROP TABLE users").is_err());
    }

    #[test]
    fn test_select() {
        assert_eq!(
            select("bar", &["a", "b", "c"], &["a"]).unwrap(),
            "SELECT a, b, c FROM bar WHERE a = ?"
        );
        assert_eq!(
            select::<&str>("bar", &["a"], &[]).unwrap(),
            "SELECT a FROM bar"
        );
        assert!(select("bar", &["a b"], &["a"]).is_err());
    }

    #[test]
    fn test_insert_update_delete() {
        assert_eq!(
            insert("t", &["a", "b"]).unwrap(),
            "INSERT INTO t (a, b) VALUES (?, ?)"
        );
        assert_eq!(
            update("t", &["b", "c"], &["a"]).unwrap(),
            "UPDATE t SET b = ?, c = ? WHERE a = ?"
        );
        assert_eq!(
            delete_from("t", &["a", "b"]).unwrap(),
            "DELETE FROM t WHERE a = ? AND b = ?"
        );
        assert_eq!(delete_from::<&str>("t", &[]).unwrap(), "DELETE FROM t");
    }

    #[test]
    fn test_create_table() {
        let stmts = create_table(
            Dbms::Sqlite,
            "stg",
            &["stg_idx", "name"],
            &[
                ColumnType::new(TypeTag::Integer),
                ColumnType::nullable(TypeTag::Char { length: 16 }),
            ],
            &[0],
            CreateFlags::DROP_TABLE_IF_EXISTS | CreateFlags::TEMPORARY_TABLE,
        )
        .unwrap();
        assert_eq!(
            stmts,
            vec![
                "DROP TABLE IF EXISTS stg".to_string(),
                "CREATE TEMPORARY TABLE stg (stg_idx INTEGER NOT NULL, name VARCHAR(16), \
                 PRIMARY KEY (stg_idx))"
                    .to_string(),
            ]
        );
    }

    #[test]
    fn test_create_table_rejects_bad_key() {
        let result = create_table(
            Dbms::Unknown,
            "t",
            &["a"],
            &[ColumnType::new(TypeTag::Integer)],
            &[3],
            CreateFlags::empty(),
        );
        assert!(matches!(result, Err(Error::ColumnIndex { index: 3, .. })));
    }

    #[test]
    fn test_column_ddl_dialects() {
        assert_eq!(column_ddl(TypeTag::TinyInt, Dbms::PostgreSql), "SMALLINT");
        assert_eq!(column_ddl(TypeTag::TinyInt, Dbms::MySql), "TINYINT");
        assert_eq!(column_ddl(TypeTag::UInteger, Dbms::MySql), "INTEGER UNSIGNED");
        assert_eq!(column_ddl(TypeTag::UInteger, Dbms::PostgreSql), "BIGINT");
        assert_eq!(column_ddl(TypeTag::UBigInt, Dbms::Sqlite), "NUMERIC(20)");
        assert_eq!(column_ddl(TypeTag::Bit, Dbms::SqlServer), "BIT");
        assert_eq!(column_ddl(TypeTag::Double, Dbms::PostgreSql), "DOUBLE PRECISION");
    }
}
