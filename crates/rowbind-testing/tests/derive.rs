//! Derived record integration tests.
//!
//! Structs deriving `Record` and `NamedRecord` stand in for column tuples
//! in tables and typed statements.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use rowbind_client::{CreateFlags, Table, TypedStatement};
use rowbind_derive::{NamedRecord, Record};
use rowbind_testing::MemDriver;
use rowbind_types::{ColumnType, FixedString, NamedRecord as _, Nullable, Record as _, TypeTag};

#[derive(Debug, Clone, Default, PartialEq, Record, NamedRecord)]
struct Employee {
    id: i32,
    #[rowbind(rename = "full_name")]
    name: FixedString<24>,
    salary: Nullable<i64>,
    #[rowbind(skip)]
    dirty: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Record)]
struct Money {
    amount: i64,
    scale: i16,
}

#[derive(Debug, Clone, Default, PartialEq, Record)]
struct Payslip {
    id: i32,
    pay: Money,
}

fn employee(id: i32, name: &str, salary: Option<i64>) -> Employee {
    Employee {
        id,
        name: FixedString::new(name).unwrap(),
        salary: Nullable::from(salary),
        dirty: true,
    }
}

// =============================================================================
// Layout
// =============================================================================

#[test]
fn test_named_record_layout() {
    assert_eq!(Employee::WIDTH, 3);
    assert_eq!(Employee::column_names(), vec!["id", "full_name", "salary"]);

    let types = Employee::column_types();
    assert_eq!(types[0], ColumnType::new(TypeTag::Integer));
    assert_eq!(types[1], ColumnType::nullable(TypeTag::Char { length: 24 }));
    assert_eq!(types[2], ColumnType::nullable(TypeTag::BigInt));
}

#[test]
fn test_nested_records_flatten() {
    assert_eq!(Payslip::WIDTH, 3);
    let tags: Vec<TypeTag> = Payslip::column_types().iter().map(|t| t.tag).collect();
    assert_eq!(tags, vec![TypeTag::Integer, TypeTag::BigInt, TypeTag::SmallInt]);
}

// =============================================================================
// Tables and statements
// =============================================================================

#[test]
fn test_table_named_from_record() {
    let driver = MemDriver::new();
    let mut conn = driver.connection().unwrap();
    let mut staff: Table<Employee> = Table::named("staff", &[0]).unwrap();
    staff
        .create(&mut conn, CreateFlags::DROP_TABLE_IF_EXISTS)
        .unwrap();

    staff.insert(&mut conn, &employee(1, "Ada", Some(5000))).unwrap();
    staff.insert(&mut conn, &employee(2, "Brian", None)).unwrap();
    conn.commit().unwrap();

    // skipped fields are never bound and read back as their default
    let ada = staff.select(&mut conn, &(1,)).unwrap().unwrap();
    assert!(!ada.dirty);
    assert_eq!(
        ada,
        Employee {
            dirty: false,
            ..employee(1, "Ada", Some(5000))
        }
    );

    let mut by_name: TypedStatement<(FixedString<24>,), (i32,)> =
        TypedStatement::prepare(&mut conn, "SELECT id FROM staff WHERE full_name = ?").unwrap();
    by_name.exec_with((FixedString::new("Brian").unwrap(),)).unwrap();
    assert!(by_name.fetch().unwrap());
    assert_eq!(by_name.cols().0, 2);
}

#[test]
fn test_records_as_statement_parameters_and_rows() {
    let driver = MemDriver::new();
    let mut conn = driver.connection().unwrap();
    conn.execute(
        "CREATE TABLE payslips (id INTEGER NOT NULL, amount BIGINT NOT NULL, \
         scale SMALLINT NOT NULL, PRIMARY KEY (id))",
    )
    .unwrap();

    let mut insert: TypedStatement<Payslip, ()> = TypedStatement::prepare(
        &mut conn,
        "INSERT INTO payslips (id, amount, scale) VALUES (?, ?, ?)",
    )
    .unwrap();
    for id in 1..=3 {
        insert
            .exec_with(Payslip {
                id,
                pay: Money {
                    amount: i64::from(id) * 1250,
                    scale: 2,
                },
            })
            .unwrap();
    }

    let mut query: TypedStatement<(i32,), Payslip> =
        TypedStatement::prepare(&mut conn, "SELECT id, amount, scale FROM payslips WHERE id = ?")
            .unwrap();
    query.exec_with((2,)).unwrap();
    assert!(query.fetch().unwrap());
    assert_eq!(
        *query.cols(),
        Payslip {
            id: 2,
            pay: Money {
                amount: 2500,
                scale: 2
            }
        }
    );
    assert!(!query.fetch().unwrap());
}
