//! Statement cache integration tests.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use rowbind_client::{
    ColumnSet, Connection, Error, OperationKind, SqlState, StatementCache, TypedStatement,
};
use rowbind_testing::MemDriver;

type ById = TypedStatement<(i32,), (i32, i32)>;

fn setup() -> (MemDriver, Connection) {
    let driver = MemDriver::new();
    let mut conn = driver.connection().unwrap();
    conn.execute("CREATE TABLE kv (k INTEGER NOT NULL, v INTEGER, w INTEGER, PRIMARY KEY (k))")
        .unwrap();
    conn.execute("INSERT INTO kv (k, v, w) VALUES (1, 10, 100)")
        .unwrap();
    (driver, conn)
}

fn by_column(column: &str) -> impl FnOnce(&mut Connection) -> rowbind_client::Result<ById> + '_ {
    move |conn| TypedStatement::prepare(conn, &format!("SELECT k, v FROM kv WHERE {column} = ?"))
}

#[test]
fn test_same_key_prepares_once() {
    let (driver, mut conn) = setup();
    let mut cache: StatementCache<ById> = StatementCache::new();
    let key = ColumnSet::from_indices([0]);

    let before = driver.stats();
    for _ in 0..3 {
        let stmt = cache
            .lookup(&mut conn, OperationKind::Select, &key, by_column("k"))
            .unwrap();
        stmt.exec_with((1,)).unwrap();
        assert!(stmt.fetch().unwrap());
        assert_eq!(*stmt.cols(), (1, 10));
    }
    assert_eq!(driver.stats().since(&before).prepares, 1);

    let stats = cache.stats();
    assert_eq!((stats.hits, stats.misses, stats.entries), (2, 1, 1));
    assert!((stats.hit_rate() - 2.0 / 3.0).abs() < f64::EPSILON);
    assert_eq!(cache.connection_id(), Some(conn.id()));
}

#[test]
fn test_column_sets_compare_by_members() {
    let (driver, mut conn) = setup();
    let mut cache: StatementCache<ById> = StatementCache::new();
    let before = driver.stats();

    let forward = ColumnSet::from_indices([0, 2]);
    let backward: ColumnSet = [2, 0].into_iter().collect();
    assert_eq!(forward, backward);

    cache
        .lookup(&mut conn, OperationKind::Select, &forward, by_column("k"))
        .unwrap();
    cache
        .lookup(&mut conn, OperationKind::Select, &backward, by_column("k"))
        .unwrap();
    assert_eq!(cache.len(), 1);

    // same columns, different operation
    cache
        .lookup(&mut conn, OperationKind::Delete, &forward, by_column("v"))
        .unwrap();
    assert_eq!(cache.len(), 2);
    assert!(cache.contains(OperationKind::Delete, &backward));
    assert!(!cache.contains(OperationKind::Update, &forward));
    assert_eq!(driver.stats().since(&before).prepares, 2);
}

#[test]
fn test_wide_column_sets() {
    let wide = ColumnSet::from_indices([3, 70, 127]);
    assert_eq!(wide.len(), 3);
    assert!(wide.contains(70));
    assert!(!wide.contains(71));
    assert_eq!(wide.iter().collect::<Vec<_>>(), vec![3, 70, 127]);

    let update = ColumnSet::from_indices([1]).with_offset(&ColumnSet::from_indices([0]), 64);
    assert_eq!(update.iter().collect::<Vec<_>>(), vec![1, 64]);
    assert_ne!(update, ColumnSet::from_indices([0, 1]));
}

#[test]
fn test_factory_error_leaves_cache_untouched() {
    let (_driver, mut conn) = setup();
    let mut cache: StatementCache<ById> = StatementCache::new();
    let key = ColumnSet::from_indices([1]);

    let err = cache
        .lookup(&mut conn, OperationKind::Select, &key, by_column("missing"))
        .unwrap_err();
    assert_eq!(
        err.diagnostic().map(|d| d.state),
        Some(SqlState::COLUMN_NOT_FOUND)
    );
    assert!(cache.is_empty());
    assert_eq!(cache.stats().misses, 0);

    cache
        .lookup(&mut conn, OperationKind::Select, &key, by_column("v"))
        .unwrap();
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_cache_is_bound_to_first_connection() {
    let (driver, mut conn) = setup();
    conn.commit().unwrap();
    let mut cache: StatementCache<ById> = StatementCache::new();
    let key = ColumnSet::from_indices([0]);
    cache
        .lookup(&mut conn, OperationKind::Select, &key, by_column("k"))
        .unwrap();

    let mut other = driver.connection().unwrap();
    let err = cache
        .lookup(&mut other, OperationKind::Select, &key, by_column("k"))
        .unwrap_err();
    assert!(matches!(
        err,
        Error::ForeignConnection { expected, actual }
            if expected == conn.id() && actual == other.id()
    ));
}
