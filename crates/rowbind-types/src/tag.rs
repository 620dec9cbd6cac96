//! Type tags and their call-level interface constants.
//!
//! Every bindable scalar maps to exactly one [`TypeTag`]; the tag resolves
//! the C buffer type and the SQL parameter type the driver expects, so the
//! mapping is decided at compile time through [`SqlType::TAG`](crate::SqlType::TAG).

use std::fmt;

/// C buffer type identifiers (`SQL_C_*`).
pub mod c_type {
    /// `SQL_C_CHAR`
    pub const CHAR: i16 = 1;
    /// `SQL_C_FLOAT`
    pub const FLOAT: i16 = 7;
    /// `SQL_C_DOUBLE`
    pub const DOUBLE: i16 = 8;
    /// `SQL_C_TYPE_TIMESTAMP`
    pub const TIMESTAMP: i16 = 93;
    /// `SQL_C_BIT`
    pub const BIT: i16 = -7;
    /// `SQL_C_SSHORT`
    pub const SSHORT: i16 = -15;
    /// `SQL_C_SLONG`
    pub const SLONG: i16 = -16;
    /// `SQL_C_USHORT`
    pub const USHORT: i16 = -17;
    /// `SQL_C_ULONG`
    pub const ULONG: i16 = -18;
    /// `SQL_C_SBIGINT`
    pub const SBIGINT: i16 = -25;
    /// `SQL_C_STINYINT`
    pub const STINYINT: i16 = -26;
    /// `SQL_C_UBIGINT`
    pub const UBIGINT: i16 = -27;
    /// `SQL_C_UTINYINT`
    pub const UTINYINT: i16 = -28;
}

/// SQL data type identifiers (`SQL_*`).
pub mod sql_type {
    /// `SQL_NUMERIC`
    pub const NUMERIC: i16 = 2;
    /// `SQL_INTEGER`
    pub const INTEGER: i16 = 4;
    /// `SQL_SMALLINT`
    pub const SMALLINT: i16 = 5;
    /// `SQL_FLOAT`
    pub const FLOAT: i16 = 6;
    /// `SQL_DOUBLE`
    pub const DOUBLE: i16 = 8;
    /// `SQL_VARCHAR`
    pub const VARCHAR: i16 = 12;
    /// `SQL_TYPE_TIMESTAMP`
    pub const TIMESTAMP: i16 = 93;
    /// `SQL_BIGINT`
    pub const BIGINT: i16 = -5;
    /// `SQL_TINYINT`
    pub const TINYINT: i16 = -6;
}

/// The storage type of one bound column or parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    /// 8-bit signed integer.
    TinyInt,
    /// 16-bit signed integer.
    SmallInt,
    /// 32-bit signed integer.
    Integer,
    /// 64-bit signed integer.
    BigInt,
    /// 8-bit unsigned integer.
    UTinyInt,
    /// 16-bit unsigned integer.
    USmallInt,
    /// 32-bit unsigned integer.
    UInteger,
    /// 64-bit unsigned integer.
    UBigInt,
    /// Single precision float.
    Real,
    /// Double precision float.
    Double,
    /// Boolean.
    Bit,
    /// Date and time without zone.
    Timestamp,
    /// Character data of at most `length` bytes.
    Char {
        /// Buffer capacity in bytes.
        length: usize,
    },
    /// Exact decimal integer of at most `digits` digits, transported as text.
    Numeric {
        /// Maximum number of decimal digits.
        digits: usize,
    },
}

impl TypeTag {
    /// The C buffer type used when binding this tag.
    #[must_use]
    pub const fn c_type(self) -> i16 {
        match self {
            Self::TinyInt => c_type::STINYINT,
            Self::SmallInt => c_type::SSHORT,
            Self::Integer => c_type::SLONG,
            Self::BigInt => c_type::SBIGINT,
            Self::UTinyInt => c_type::UTINYINT,
            Self::USmallInt => c_type::USHORT,
            Self::UInteger => c_type::ULONG,
            Self::UBigInt => c_type::UBIGINT,
            Self::Real => c_type::FLOAT,
            Self::Double => c_type::DOUBLE,
            Self::Bit => c_type::BIT,
            Self::Timestamp => c_type::TIMESTAMP,
            Self::Char { .. } | Self::Numeric { .. } => c_type::CHAR,
        }
    }

    /// The SQL type reported to the driver when binding this tag.
    #[must_use]
    pub const fn sql_type(self) -> i16 {
        match self {
            Self::TinyInt | Self::UTinyInt | Self::Bit => sql_type::TINYINT,
            Self::SmallInt | Self::USmallInt => sql_type::SMALLINT,
            Self::Integer | Self::UInteger => sql_type::INTEGER,
            Self::BigInt | Self::UBigInt => sql_type::BIGINT,
            Self::Real => sql_type::FLOAT,
            Self::Double => sql_type::DOUBLE,
            Self::Timestamp => sql_type::TIMESTAMP,
            Self::Char { .. } => sql_type::VARCHAR,
            Self::Numeric { .. } => sql_type::NUMERIC,
        }
    }

    /// Size of the bound buffer in bytes.
    #[must_use]
    pub const fn buffer_len(self) -> usize {
        match self {
            Self::TinyInt | Self::UTinyInt | Self::Bit => 1,
            Self::SmallInt | Self::USmallInt => 2,
            Self::Integer | Self::UInteger | Self::Real => 4,
            Self::BigInt | Self::UBigInt | Self::Double => 8,
            Self::Timestamp => 16,
            Self::Char { length } => length,
            // sign and digits
            Self::Numeric { digits } => digits + 1,
        }
    }

    /// Whether the tag describes an unsigned integer.
    #[must_use]
    pub const fn is_unsigned(self) -> bool {
        matches!(
            self,
            Self::UTinyInt | Self::USmallInt | Self::UInteger | Self::UBigInt
        )
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TinyInt => f.write_str("TINYINT"),
            Self::SmallInt => f.write_str("SMALLINT"),
            Self::Integer => f.write_str("INTEGER"),
            Self::BigInt => f.write_str("BIGINT"),
            Self::UTinyInt => f.write_str("TINYINT UNSIGNED"),
            Self::USmallInt => f.write_str("SMALLINT UNSIGNED"),
            Self::UInteger => f.write_str("INTEGER UNSIGNED"),
            Self::UBigInt => f.write_str("BIGINT UNSIGNED"),
            Self::Real => f.write_str("REAL"),
            Self::Double => f.write_str("DOUBLE PRECISION"),
            Self::Bit => f.write_str("BOOLEAN"),
            Self::Timestamp => f.write_str("TIMESTAMP"),
            Self::Char { length } => write!(f, "VARCHAR({length})"),
            Self::Numeric { digits } => write!(f, "NUMERIC({digits})"),
        }
    }
}

/// A column or parameter slot: its tag and whether it admits NULL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColumnType {
    /// Storage type.
    pub tag: TypeTag,
    /// Whether NULL is representable.
    pub nullable: bool,
}

impl ColumnType {
    /// A non-nullable slot.
    #[must_use]
    pub const fn new(tag: TypeTag) -> Self {
        Self {
            tag,
            nullable: false,
        }
    }

    /// A nullable slot.
    #[must_use]
    pub const fn nullable(tag: TypeTag) -> Self {
        Self {
            tag,
            nullable: true,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.nullable {
            write!(f, "{}", self.tag)
        } else {
            write!(f, "{} NOT NULL", self.tag)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_constants() {
        assert_eq!(TypeTag::Bit.c_type(), c_type::BIT);
        assert_eq!(TypeTag::Bit.sql_type(), sql_type::TINYINT);
        assert_eq!(TypeTag::Real.c_type(), c_type::FLOAT);
        assert_eq!(TypeTag::Real.sql_type(), sql_type::FLOAT);
        assert_eq!(TypeTag::Char { length: 32 }.c_type(), c_type::CHAR);
        assert_eq!(TypeTag::Char { length: 32 }.sql_type(), sql_type::VARCHAR);
        assert_eq!(TypeTag::Numeric { digits: 10 }.sql_type(), sql_type::NUMERIC);
        assert_eq!(TypeTag::UBigInt.c_type(), c_type::UBIGINT);
        assert_eq!(TypeTag::UBigInt.sql_type(), sql_type::BIGINT);
    }

    #[test]
    fn test_buffer_len() {
        assert_eq!(TypeTag::Integer.buffer_len(), 4);
        assert_eq!(TypeTag::Char { length: 12 }.buffer_len(), 12);
        assert_eq!(TypeTag::Numeric { digits: 20 }.buffer_len(), 21);
    }

    #[test]
    fn test_column_type_display() {
        assert_eq!(
            ColumnType::new(TypeTag::Char { length: 8 }).to_string(),
            "VARCHAR(8) NOT NULL"
        );
        assert_eq!(ColumnType::nullable(TypeTag::Double).to_string(), "DOUBLE PRECISION");
    }
}
