//! Typed statement integration tests.
//!
//! These tests run the typed statement shapes against the in-memory driver
//! and use its call counters to check that binding happens only when a
//! buffer moves or changes length.
//!
//! ```bash
//! cargo test -p rowbind-testing --test typed_statement
//! ```

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use proptest::prelude::*;
use rowbind_client::{
    BatchStatement, Connection, CursorStatement, Error, FixedString, Nullable, Number, SqlState,
    StatementState, Timestamp, TypedStatement,
};
use rowbind_testing::MemDriver;

fn setup() -> (MemDriver, Connection) {
    let driver = MemDriver::new();
    let mut conn = driver.connection().unwrap();
    conn.execute(
        "CREATE TABLE users (id INTEGER NOT NULL, name VARCHAR(16), age SMALLINT, \
         PRIMARY KEY (id))",
    )
    .unwrap();
    conn.commit().unwrap();
    (driver, conn)
}

fn insert_users(conn: &mut Connection, ids: std::ops::Range<i32>) {
    let mut insert: BatchStatement<(i32, FixedString<16>, i16)> =
        BatchStatement::prepare(conn, "INSERT INTO users (id, name, age) VALUES (?, ?, ?)")
            .unwrap();
    for id in ids {
        let name = FixedString::new(&format!("user{id}")).unwrap();
        insert.params_mut().push((id, name, (20 + id % 50) as i16));
    }
    insert.exec().unwrap();
}

// =============================================================================
// Scalar statements
// =============================================================================

#[test]
fn test_scalar_statement_binds_once() {
    let (driver, mut conn) = setup();
    insert_users(&mut conn, 0..3);

    let before = driver.stats();
    let mut select: TypedStatement<(i32,), (i32, FixedString<16>)> =
        TypedStatement::prepare(&mut conn, "SELECT id, name FROM users WHERE id = ?").unwrap();
    let prepared = driver.stats().since(&before);
    assert_eq!(prepared.parameter_binds, 1);
    assert_eq!(prepared.column_binds, 2);
    assert_eq!(select.state(), StatementState::Bound);

    for id in 0..3 {
        select.exec_with((id,)).unwrap();
        assert!(select.fetch().unwrap());
        assert_eq!(select.cols().0, id);
        assert_eq!(select.cols().1, format!("user{id}").as_str());
        assert!(!select.fetch().unwrap());
        assert_eq!(select.state(), StatementState::Done);
    }

    let total = driver.stats().since(&before);
    assert_eq!(total.binds(), 3);
    assert_eq!(total.executes, 3);
}

#[test]
fn test_scalar_statement_iterates_rows() {
    let (_driver, mut conn) = setup();
    insert_users(&mut conn, 0..5);

    let mut select: TypedStatement<(i16,), (i32,)> =
        TypedStatement::prepare(&mut conn, "SELECT id FROM users WHERE age > ? ORDER BY id DESC")
            .unwrap();
    select.params_mut().0 = 21;
    let ids: Vec<i32> = select.rows().unwrap().map(|row| row.unwrap().0).collect();
    assert_eq!(ids, vec![4, 3, 2]);
}

#[test]
fn test_null_values_round_trip() {
    let (_driver, mut conn) = setup();
    let mut insert: TypedStatement<(i32, FixedString<16>, Nullable<i16>), ()> =
        TypedStatement::prepare(&mut conn, "INSERT INTO users (id, name, age) VALUES (?, ?, ?)")
            .unwrap();
    insert
        .exec_with((1, FixedString::null(), Nullable::null()))
        .unwrap();
    insert
        .exec_with((2, FixedString::new("bo").unwrap(), Nullable::new(33)))
        .unwrap();

    let mut select: CursorStatement<(), (i32, FixedString<16>, Nullable<i16>)> =
        CursorStatement::prepare(&mut conn, "SELECT id, name, age FROM users ORDER BY id", 8)
            .unwrap();
    let rows = select.fetch_all().unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows[0].1.is_null());
    assert!(rows[0].2.is_null());
    assert_eq!(rows[1].1, "bo");
    assert_eq!(rows[1].2.get(), Some(&33));
}

#[test]
fn test_null_into_non_nullable_is_a_type_error() {
    let (_driver, mut conn) = setup();
    conn.execute("INSERT INTO users (id) VALUES (1)").unwrap();

    let mut select: TypedStatement<(), (i16,)> =
        TypedStatement::prepare(&mut conn, "SELECT age FROM users").unwrap();
    select.exec().unwrap();
    let err = select.fetch().unwrap_err();
    assert!(matches!(err, Error::Type(_)), "unexpected error: {err}");
}

#[test]
fn test_timestamps_and_exact_numerics() {
    let driver = MemDriver::new();
    let mut conn = driver.connection().unwrap();
    conn.execute("CREATE TABLE events (at TIMESTAMP NOT NULL, amount NUMERIC(20))")
        .unwrap();

    let at = Timestamp::new(2024, 2, 29, 12, 30, 15, 0).unwrap();
    let amount: Number<20> = Number::new("18446744073709551615").unwrap();
    let mut insert: TypedStatement<(Timestamp, Number<20>), ()> =
        TypedStatement::prepare(&mut conn, "INSERT INTO events (at, amount) VALUES (?, ?)")
            .unwrap();
    insert.exec_with((at, amount.clone())).unwrap();

    let mut select: TypedStatement<(), (Timestamp, Number<20>)> =
        TypedStatement::prepare(&mut conn, "SELECT at, amount FROM events").unwrap();
    select.exec().unwrap();
    assert!(select.fetch().unwrap());
    assert_eq!(select.cols().0, at);
    assert_eq!(select.cols().1, amount);
    assert_eq!(select.cols().1.to_u64().unwrap(), u64::MAX);
}

#[test]
fn test_driver_conversion_errors_surface() {
    let (_driver, mut conn) = setup();
    let mut insert: TypedStatement<(i32, FixedString<32>), ()> =
        TypedStatement::prepare(&mut conn, "INSERT INTO users (id, name) VALUES (?, ?)").unwrap();
    let long = FixedString::new("a name much longer than sixteen").unwrap();
    let err = insert.exec_with((1, long)).unwrap_err();
    assert_eq!(
        err.diagnostic().map(|d| d.state),
        Some(SqlState::STRING_TRUNCATION)
    );
}

#[test]
fn test_prepare_reports_unknown_objects() {
    let (_driver, mut conn) = setup();
    let err = TypedStatement::<(), (i32,)>::prepare(&mut conn, "SELECT id FROM missing")
        .unwrap_err();
    assert_eq!(
        err.diagnostic().map(|d| d.state),
        Some(SqlState::TABLE_NOT_FOUND)
    );
    let err = TypedStatement::<(), (i32,)>::prepare(&mut conn, "SELECT nope FROM users")
        .unwrap_err();
    assert_eq!(
        err.diagnostic().map(|d| d.state),
        Some(SqlState::COLUMN_NOT_FOUND)
    );
}

// =============================================================================
// Bulk parameters
// =============================================================================

#[test]
fn test_batch_rebinds_only_when_size_changes() {
    let (driver, mut conn) = setup();
    let mut insert: BatchStatement<(i32, FixedString<16>)> =
        BatchStatement::prepare(&mut conn, "INSERT INTO users (id, name) VALUES (?, ?)").unwrap();
    let row = |id: i32| (id, FixedString::new("x").unwrap());

    let before = driver.stats();
    insert.params_mut().extend((0..3).map(row));
    insert.exec().unwrap();
    let first = driver.stats().since(&before);
    assert_eq!(first.parameter_binds, 2);
    assert_eq!(first.parameter_array_binds, 1);
    assert_eq!(first.executes, 1);

    let before = driver.stats();
    insert.params_mut().clear();
    insert.params_mut().extend((3..6).map(row));
    insert.exec().unwrap();
    let same_size = driver.stats().since(&before);
    assert_eq!(same_size.binds(), 0);
    assert_eq!(same_size.executes, 1);

    let before = driver.stats();
    insert.params_mut().clear();
    insert.params_mut().extend((6..11).map(row));
    insert.exec().unwrap();
    let grown = driver.stats().since(&before);
    assert_eq!(grown.parameter_array_binds, 1);
    assert_eq!(grown.parameter_binds, 2);

    conn.commit().unwrap();
    assert_eq!(driver.rows("users").unwrap().len(), 11);
}

#[test]
fn test_empty_batch_executes_nothing() {
    let (driver, mut conn) = setup();
    let mut insert: BatchStatement<(i32,)> =
        BatchStatement::prepare(&mut conn, "INSERT INTO users (id) VALUES (?)").unwrap();
    let before = driver.stats();
    insert.exec().unwrap();
    assert_eq!(driver.stats().since(&before).executes, 0);
    assert_eq!(insert.state(), StatementState::Done);
}

#[test]
fn test_batch_constraint_violation_rolls_back() {
    let (driver, mut conn) = setup();
    insert_users(&mut conn, 0..2);
    conn.commit().unwrap();

    let mut insert: BatchStatement<(i32,)> =
        BatchStatement::prepare(&mut conn, "INSERT INTO users (id) VALUES (?)").unwrap();
    insert.params_mut().extend([(5,), (1,)]);
    let err = insert.exec().unwrap_err();
    assert!(err.is_constraint_violation());
    conn.rollback().unwrap();
    assert_eq!(driver.rows("users").unwrap().len(), 2);
}

// =============================================================================
// Bulk results
// =============================================================================

#[test]
fn test_cursor_fetches_in_blocks() {
    let (driver, mut conn) = setup();
    insert_users(&mut conn, 0..10);

    let mut select: CursorStatement<(), (i32, FixedString<16>)> =
        CursorStatement::prepare(&mut conn, "SELECT id, name FROM users ORDER BY id", 4).unwrap();
    let before = driver.stats();
    select.exec().unwrap();
    let mut sizes = Vec::new();
    while select.fetch().unwrap() {
        sizes.push(select.rows().len());
    }
    assert_eq!(sizes, vec![4, 4, 2]);
    // the short block ends the result set without another round trip
    assert_eq!(driver.stats().since(&before).fetches, 3);

    let before = driver.stats();
    let rows = select.fetch_all().unwrap();
    assert_eq!(rows.len(), 10);
    assert_eq!(rows[9].0, 9);
    assert_eq!(driver.stats().since(&before).row_array_binds, 0);
}

#[test]
fn test_set_fetch_size_rebinds_row_array() {
    let (driver, mut conn) = setup();
    insert_users(&mut conn, 0..6);

    let mut select: CursorStatement<(), (i32,)> =
        CursorStatement::prepare(&mut conn, "SELECT id FROM users", 2).unwrap();
    select.set_fetch_size(5).unwrap();
    let before = driver.stats();
    select.exec().unwrap();
    assert!(select.fetch().unwrap());
    assert_eq!(select.rows().len(), 5);
    assert_eq!(driver.stats().since(&before).row_array_binds, 1);
    assert_eq!(select.fetch_size(), 5);
}

fn chunked_fetch_count(rows: usize, fetch_size: usize) -> (usize, u64) {
    let (driver, mut conn) = setup();
    insert_users(&mut conn, 0..rows as i32);
    let mut select: CursorStatement<(), (i32,)> =
        CursorStatement::prepare(&mut conn, "SELECT id FROM users", fetch_size).unwrap();
    let before = driver.stats();
    let fetched = select.fetch_all().unwrap().len();
    (fetched, driver.stats().since(&before).fetches)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn test_fetch_round_trips_for_any_size(rows in 0usize..40, fetch_size in 1usize..9) {
        let (fetched, fetches) = chunked_fetch_count(rows, fetch_size);
        prop_assert_eq!(fetched, rows);
        // every full block plus the short (possibly empty) one that ends the set
        prop_assert_eq!(fetches, (rows / fetch_size + 1) as u64);
    }
}
