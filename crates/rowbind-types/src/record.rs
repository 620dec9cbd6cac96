//! Binding traits for scalars and tuples.
//!
//! [`SqlType`] maps one Rust type to one column slot. [`Record`] flattens a
//! tuple (or a struct deriving it) into a fixed-width row of slots so that a
//! whole parameter set or result row can be written to and read from a
//! contiguous run of [`Cell`]s. Nested tuples flatten, so
//! `(i32, (i64, bool))` occupies three slots.

use crate::error::TypeError;
use crate::nullable::Nullable;
use crate::number::Number;
use crate::string::FixedString;
use crate::tag::{ColumnType, TypeTag};
use crate::timestamp::Timestamp;
use crate::value::{Cell, SqlValue};

/// A Rust type that occupies exactly one bound slot.
pub trait SqlType: Sized + Default + Clone {
    /// Tag describing the bound buffer.
    const TAG: TypeTag;

    /// Whether the type can represent NULL.
    const NULLABLE: bool = false;

    /// Encode into a cell.
    fn to_cell(&self) -> Cell;

    /// Decode from a cell.
    fn from_cell(cell: &Cell) -> Result<Self, TypeError>;

    /// The slot description of this type.
    #[must_use]
    fn column_type() -> ColumnType {
        ColumnType {
            tag: Self::TAG,
            nullable: Self::NULLABLE,
        }
    }
}

/// A fixed-width row of bound slots.
pub trait Record: Default + Clone {
    /// Number of slots the record occupies.
    const WIDTH: usize;

    /// Append the slot descriptions in column order.
    fn describe(out: &mut Vec<ColumnType>);

    /// Encode into `out`, which holds exactly [`Self::WIDTH`] cells.
    fn write(&self, out: &mut [Cell]);

    /// Decode from `cells`, which holds exactly [`Self::WIDTH`] cells.
    fn read(&mut self, cells: &[Cell]) -> Result<(), TypeError>;

    /// All slot descriptions in column order.
    #[must_use]
    fn column_types() -> Vec<ColumnType> {
        let mut out = Vec::with_capacity(Self::WIDTH);
        Self::describe(&mut out);
        out
    }

    /// Encode into a freshly allocated row.
    #[must_use]
    fn to_cells(&self) -> Vec<Cell> {
        let mut out = vec![Cell::null(); Self::WIDTH];
        self.write(&mut out);
        out
    }

    /// Decode a new record from `cells`.
    fn from_cells(cells: &[Cell]) -> Result<Self, TypeError> {
        let mut record = Self::default();
        record.read(cells)?;
        Ok(record)
    }
}

/// A record whose slots carry column names.
///
/// Implemented by `#[derive(NamedRecord)]`; the names are used to generate
/// table DDL and statement text.
pub trait NamedRecord: Record {
    /// Column names in slot order, one per slot.
    fn column_names() -> Vec<&'static str>;
}

fn check_not_null(cell: &Cell, target: &'static str) -> Result<(), TypeError> {
    if cell.is_null() {
        Err(TypeError::UnexpectedNull { target })
    } else {
        Ok(())
    }
}

fn mismatch(cell: &Cell, target: &'static str) -> TypeError {
    TypeError::Mismatch {
        found: cell.value.kind(),
        target,
    }
}

macro_rules! integer_type {
    ($($ty:ty => $tag:ident, $variant:ident, $wide:ty;)*) => {
        $(
            impl SqlType for $ty {
                const TAG: TypeTag = TypeTag::$tag;

                fn to_cell(&self) -> Cell {
                    Cell::new(SqlValue::$variant(<$wide>::from(*self)))
                }

                fn from_cell(cell: &Cell) -> Result<Self, TypeError> {
                    check_not_null(cell, stringify!($ty))?;
                    match &cell.value {
                        SqlValue::Int(v) => <$ty>::try_from(*v)
                            .map_err(|_| TypeError::out_of_range(v, stringify!($ty))),
                        SqlValue::UInt(v) => <$ty>::try_from(*v)
                            .map_err(|_| TypeError::out_of_range(v, stringify!($ty))),
                        SqlValue::Bool(v) => Ok(<$ty>::from(*v)),
                        _ => Err(mismatch(cell, stringify!($ty))),
                    }
                }
            }
        )*
    };
}

integer_type! {
    i8 => TinyInt, Int, i64;
    i16 => SmallInt, Int, i64;
    i32 => Integer, Int, i64;
    i64 => BigInt, Int, i64;
    u8 => UTinyInt, UInt, u64;
    u16 => USmallInt, UInt, u64;
    u32 => UInteger, UInt, u64;
    u64 => UBigInt, UInt, u64;
}

// Float conversions follow C semantics: integers round to the nearest
// representable value.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
mod floats {
    use super::*;

    impl SqlType for f32 {
        const TAG: TypeTag = TypeTag::Real;

        fn to_cell(&self) -> Cell {
            Cell::new(SqlValue::Float(f64::from(*self)))
        }

        fn from_cell(cell: &Cell) -> Result<Self, TypeError> {
            check_not_null(cell, "f32")?;
            match &cell.value {
                SqlValue::Float(v) => Ok(*v as f32),
                SqlValue::Int(v) => Ok(*v as f32),
                SqlValue::UInt(v) => Ok(*v as f32),
                _ => Err(mismatch(cell, "f32")),
            }
        }
    }

    impl SqlType for f64 {
        const TAG: TypeTag = TypeTag::Double;

        fn to_cell(&self) -> Cell {
            Cell::new(SqlValue::Float(*self))
        }

        fn from_cell(cell: &Cell) -> Result<Self, TypeError> {
            check_not_null(cell, "f64")?;
            match &cell.value {
                SqlValue::Float(v) => Ok(*v),
                SqlValue::Int(v) => Ok(*v as f64),
                SqlValue::UInt(v) => Ok(*v as f64),
                _ => Err(mismatch(cell, "f64")),
            }
        }
    }
}

impl SqlType for bool {
    const TAG: TypeTag = TypeTag::Bit;

    fn to_cell(&self) -> Cell {
        Cell::new(SqlValue::Bool(*self))
    }

    fn from_cell(cell: &Cell) -> Result<Self, TypeError> {
        check_not_null(cell, "bool")?;
        match &cell.value {
            SqlValue::Bool(v) => Ok(*v),
            SqlValue::Int(0) | SqlValue::UInt(0) => Ok(false),
            SqlValue::Int(1) | SqlValue::UInt(1) => Ok(true),
            SqlValue::Int(v) => Err(TypeError::out_of_range(v, "bool")),
            SqlValue::UInt(v) => Err(TypeError::out_of_range(v, "bool")),
            _ => Err(mismatch(cell, "bool")),
        }
    }
}

impl SqlType for Timestamp {
    const TAG: TypeTag = TypeTag::Timestamp;

    fn to_cell(&self) -> Cell {
        Cell::new(SqlValue::Timestamp(*self))
    }

    fn from_cell(cell: &Cell) -> Result<Self, TypeError> {
        check_not_null(cell, "Timestamp")?;
        match &cell.value {
            SqlValue::Timestamp(v) => Ok(*v),
            SqlValue::Text(text) => text.parse(),
            _ => Err(mismatch(cell, "Timestamp")),
        }
    }
}

impl<const N: usize> SqlType for FixedString<N> {
    const TAG: TypeTag = TypeTag::Char { length: N };
    const NULLABLE: bool = true;

    fn to_cell(&self) -> Cell {
        match self.as_str() {
            Some(text) => Cell::new(SqlValue::Text(text.to_string())),
            None => Cell::null(),
        }
    }

    fn from_cell(cell: &Cell) -> Result<Self, TypeError> {
        if cell.is_null() {
            return Ok(Self::null());
        }
        match &cell.value {
            SqlValue::Text(text) => Self::new(text),
            _ => Err(mismatch(cell, "FixedString")),
        }
    }
}

impl<const N: usize> SqlType for Number<N> {
    const TAG: TypeTag = TypeTag::Numeric { digits: N };
    const NULLABLE: bool = true;

    fn to_cell(&self) -> Cell {
        match self.as_str() {
            Some(text) => Cell::new(SqlValue::Text(text.to_string())),
            None => Cell::null(),
        }
    }

    fn from_cell(cell: &Cell) -> Result<Self, TypeError> {
        if cell.is_null() {
            return Ok(Self::null());
        }
        match &cell.value {
            SqlValue::Text(text) => Self::new(text),
            SqlValue::Int(v) => Self::try_from(*v),
            SqlValue::UInt(v) => Self::try_from(*v),
            _ => Err(mismatch(cell, "Number")),
        }
    }
}

impl<T: SqlType> SqlType for Nullable<T> {
    const TAG: TypeTag = T::TAG;
    const NULLABLE: bool = true;

    fn to_cell(&self) -> Cell {
        match self.get() {
            Some(value) => value.to_cell(),
            None => Cell::null(),
        }
    }

    fn from_cell(cell: &Cell) -> Result<Self, TypeError> {
        if cell.is_null() {
            Ok(Self::null())
        } else {
            T::from_cell(cell).map(Self::new)
        }
    }
}

macro_rules! scalar_record {
    (impl[$($generics:tt)*] $ty:ty) => {
        impl<$($generics)*> Record for $ty {
            const WIDTH: usize = 1;

            fn describe(out: &mut Vec<ColumnType>) {
                out.push(<$ty as SqlType>::column_type());
            }

            fn write(&self, out: &mut [Cell]) {
                out[0] = self.to_cell();
            }

            fn read(&mut self, cells: &[Cell]) -> Result<(), TypeError> {
                *self = <$ty as SqlType>::from_cell(&cells[0])?;
                Ok(())
            }
        }
    };
}

scalar_record!(impl[] i8);
scalar_record!(impl[] i16);
scalar_record!(impl[] i32);
scalar_record!(impl[] i64);
scalar_record!(impl[] u8);
scalar_record!(impl[] u16);
scalar_record!(impl[] u32);
scalar_record!(impl[] u64);
scalar_record!(impl[] f32);
scalar_record!(impl[] f64);
scalar_record!(impl[] bool);
scalar_record!(impl[] Timestamp);
scalar_record!(impl[const N: usize] FixedString<N>);
scalar_record!(impl[const N: usize] Number<N>);
scalar_record!(impl[T: SqlType] Nullable<T>);

impl Record for () {
    const WIDTH: usize = 0;

    fn describe(_out: &mut Vec<ColumnType>) {}

    fn write(&self, _out: &mut [Cell]) {}

    fn read(&mut self, _cells: &[Cell]) -> Result<(), TypeError> {
        Ok(())
    }
}

macro_rules! tuple_record {
    ($($name:ident $idx:tt),+) => {
        impl<$($name: Record),+> Record for ($($name,)+) {
            const WIDTH: usize = 0 $(+ $name::WIDTH)+;

            fn describe(out: &mut Vec<ColumnType>) {
                $($name::describe(out);)+
            }

            fn write(&self, out: &mut [Cell]) {
                let mut offset = 0;
                $(
                    self.$idx.write(&mut out[offset..offset + $name::WIDTH]);
                    offset += $name::WIDTH;
                )+
                let _ = offset;
            }

            fn read(&mut self, cells: &[Cell]) -> Result<(), TypeError> {
                let mut offset = 0;
                $(
                    self.$idx.read(&cells[offset..offset + $name::WIDTH])?;
                    offset += $name::WIDTH;
                )+
                let _ = offset;
                Ok(())
            }
        }
    };
}

tuple_record!(A 0);
tuple_record!(A 0, B 1);
tuple_record!(A 0, B 1, C 2);
tuple_record!(A 0, B 1, C 2, D 3);
tuple_record!(A 0, B 1, C 2, D 3, E 4);
tuple_record!(A 0, B 1, C 2, D 3, E 4, F 5);
tuple_record!(A 0, B 1, C 2, D 3, E 4, F 5, G 6);
tuple_record!(A 0, B 1, C 2, D 3, E 4, F 5, G 6, H 7);
tuple_record!(A 0, B 1, C 2, D 3, E 4, F 5, G 6, H 7, I 8);
tuple_record!(A 0, B 1, C 2, D 3, E 4, F 5, G 6, H 7, I 8, J 9);
tuple_record!(A 0, B 1, C 2, D 3, E 4, F 5, G 6, H 7, I 8, J 9, K 10);
tuple_record!(A 0, B 1, C 2, D 3, E 4, F 5, G 6, H 7, I 8, J 9, K 10, L 11);

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_range_checks() {
        let cell = 300_i64.to_cell();
        assert_eq!(
            i8::from_cell(&cell),
            Err(TypeError::out_of_range(300, "i8"))
        );
        assert_eq!(i16::from_cell(&cell).unwrap(), 300);
        assert!(u8::from_cell(&(-1_i32).to_cell()).is_err());
        assert_eq!(u64::from_cell(&7_i32.to_cell()).unwrap(), 7);
    }

    #[test]
    fn test_null_into_non_nullable() {
        assert_eq!(
            i32::from_cell(&Cell::null()),
            Err(TypeError::UnexpectedNull { target: "i32" })
        );
        assert!(Nullable::<i32>::from_cell(&Cell::null()).unwrap().is_null());
        assert!(FixedString::<4>::from_cell(&Cell::null()).unwrap().is_null());
    }

    #[test]
    fn test_bool_accepts_bit_integers() {
        assert!(bool::from_cell(&1_i32.to_cell()).unwrap());
        assert!(!bool::from_cell(&0_u8.to_cell()).unwrap());
        assert!(bool::from_cell(&2_i32.to_cell()).is_err());
    }

    #[test]
    fn test_string_overflow_on_read() {
        let cell = Cell::new(SqlValue::Text("abcdef".into()));
        assert!(FixedString::<4>::from_cell(&cell).is_err());
        assert_eq!(FixedString::<8>::from_cell(&cell).unwrap(), "abcdef");
    }

    #[test]
    fn test_nested_tuples_flatten() {
        type Row = (i32, (FixedString<8>, Nullable<f64>), bool);
        assert_eq!(Row::WIDTH, 4);

        let types = Row::column_types();
        assert_eq!(types[0], ColumnType::new(TypeTag::Integer));
        assert_eq!(types[1], ColumnType::nullable(TypeTag::Char { length: 8 }));
        assert_eq!(types[2], ColumnType::nullable(TypeTag::Double));
        assert_eq!(types[3], ColumnType::new(TypeTag::Bit));

        let row: Row = (
            1,
            (FixedString::new("one").unwrap(), Nullable::new(1.5)),
            true,
        );
        let cells = row.to_cells();
        assert_eq!(cells[1].indicator, 3);

        let back = Row::from_cells(&cells).unwrap();
        assert_eq!(back.0, 1);
        assert_eq!(back.1.0, "one");
        assert_eq!(back.1.1.get(), Some(&1.5));
        assert!(back.2);
    }

    #[test]
    fn test_unit_record_is_empty() {
        assert_eq!(<()>::WIDTH, 0);
        assert!(<()>::column_types().is_empty());
        assert!(().to_cells().is_empty());
    }

    #[test]
    fn test_float_from_integer() {
        assert!((f64::from_cell(&3_i64.to_cell()).unwrap() - 3.0).abs() < f64::EPSILON);
        assert!((f32::from_cell(&2.5_f64.to_cell()).unwrap() - 2.5).abs() < f32::EPSILON);
    }
}
