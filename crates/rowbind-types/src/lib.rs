//! # rowbind-types
//!
//! Value model shared by every rowbind crate.
//!
//! A statement parameter or result column is described by a [`TypeTag`]
//! (which carries the C buffer type and SQL type constants of the
//! call-level interface) and transported in a [`Cell`], a value plus its
//! length/indicator side channel. Rust types opt into binding through
//! [`SqlType`] (one column) and [`Record`] (a flattened tuple of columns).
//!
//! ## Supported scalar types
//!
//! | Rust type | Tag | SQL type |
//! |-----------|-----|----------|
//! | `i8`/`i16`/`i32`/`i64` | `TinyInt`..`BigInt` | `TINYINT`..`BIGINT` |
//! | `u8`/`u16`/`u32`/`u64` | `UTinyInt`..`UBigInt` | same, unsigned C type |
//! | `f32`/`f64` | `Real`/`Double` | `FLOAT`/`DOUBLE` |
//! | `bool` | `Bit` | `TINYINT` |
//! | [`Timestamp`] | `Timestamp` | `TIMESTAMP` |
//! | [`FixedString<N>`] | `Char { length: N }` | `VARCHAR(N)` |
//! | [`Number<N>`] | `Numeric { digits: N }` | `NUMERIC(N)` |
//! | [`Nullable<T>`] | tag of `T` | nullable |
//!
//! ## Example
//!
//! ```rust
//! use rowbind_types::{Cell, FixedString, Nullable, Record};
//!
//! let row: (i32, FixedString<8>, Nullable<f64>) =
//!     (7, FixedString::new("seven").unwrap(), Nullable::null());
//!
//! let mut cells = vec![Cell::null(); <(i32, FixedString<8>, Nullable<f64>)>::WIDTH];
//! row.write(&mut cells);
//! assert_eq!(cells[1].indicator, 5);
//! assert!(cells[2].is_null());
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod error;
pub mod nullable;
pub mod number;
pub mod record;
pub mod string;
pub mod tag;
pub mod timestamp;
pub mod value;

pub use error::TypeError;
pub use nullable::Nullable;
pub use number::Number;
pub use record::{NamedRecord, Record, SqlType};
pub use string::FixedString;
pub use tag::{ColumnType, TypeTag};
pub use timestamp::Timestamp;
pub use value::{Cell, NULL_DATA, SqlValue};
