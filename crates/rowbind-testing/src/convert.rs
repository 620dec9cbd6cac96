//! Value conversions at the engine's two boundaries.
//!
//! Values arriving from parameters are coerced to the storage class of the
//! column they are written to (or compared with). Values leaving through a
//! bound result column are converted to the bound buffer's type tag, the
//! way a driver converts between SQL and C types.

use rowbind_driver::{Diagnostic, SqlState};
use rowbind_types::{SqlValue, Timestamp, TypeTag};

use crate::parser::DataType;

fn invalid_cast(value: &SqlValue, target: &str) -> Diagnostic {
    Diagnostic::new(
        SqlState::INVALID_CAST,
        20,
        format!("cannot convert {} {value} to {target}", value.kind()),
    )
}

fn out_of_range(value: &SqlValue, target: &str) -> Diagnostic {
    Diagnostic::new(
        SqlState::NUMERIC_OUT_OF_RANGE,
        20,
        format!("value {value} out of range for {target}"),
    )
}

fn truncation(length: usize, capacity: usize) -> Diagnostic {
    Diagnostic::new(
        SqlState::STRING_TRUNCATION,
        18,
        format!("string of {length} bytes does not fit {capacity} bytes"),
    )
}

/// Coerce `value` to the storage class of a column.
pub(crate) fn store(value: SqlValue, data_type: DataType) -> Result<SqlValue, Diagnostic> {
    if value.is_null() {
        return Ok(SqlValue::Null);
    }
    match data_type {
        DataType::Integer => signed(&value, "INTEGER").map(SqlValue::Int),
        DataType::Unsigned => unsigned(&value, "INTEGER UNSIGNED").map(SqlValue::UInt),
        DataType::Real => real(&value).map(SqlValue::Float),
        DataType::Bool => boolean(&value).map(SqlValue::Bool),
        DataType::Timestamp => timestamp(&value).map(SqlValue::Timestamp),
        DataType::Text { length } => {
            let text = text(value);
            match length {
                Some(capacity) if text.len() > capacity => Err(truncation(text.len(), capacity)),
                _ => Ok(SqlValue::Text(text)),
            }
        }
        DataType::Numeric => numeric(value),
    }
}

/// Convert a stored value for a result buffer of type `tag`.
pub(crate) fn fetch(value: &SqlValue, tag: TypeTag) -> Result<SqlValue, Diagnostic> {
    if value.is_null() {
        return Ok(SqlValue::Null);
    }
    match tag {
        TypeTag::TinyInt | TypeTag::SmallInt | TypeTag::Integer | TypeTag::BigInt => {
            signed(value, "signed integer").map(SqlValue::Int)
        }
        TypeTag::UTinyInt | TypeTag::USmallInt | TypeTag::UInteger | TypeTag::UBigInt => {
            unsigned(value, "unsigned integer").map(SqlValue::UInt)
        }
        TypeTag::Real | TypeTag::Double => real(value).map(SqlValue::Float),
        TypeTag::Bit => boolean(value).map(SqlValue::Bool),
        TypeTag::Timestamp => timestamp(value).map(SqlValue::Timestamp),
        TypeTag::Char { length } => {
            let text = text(value.clone());
            if text.len() > length {
                return Err(truncation(text.len(), length));
            }
            Ok(SqlValue::Text(text))
        }
        TypeTag::Numeric { digits } => {
            let digits_text = match value {
                SqlValue::Int(v) => v.to_string(),
                SqlValue::UInt(v) => v.to_string(),
                SqlValue::Bool(v) => u8::from(*v).to_string(),
                SqlValue::Text(text) => text.clone(),
                other => return Err(invalid_cast(other, "NUMERIC")),
            };
            let significant = digits_text.trim_start_matches(['-', '+']).len();
            if significant > digits {
                return Err(out_of_range(value, &tag.to_string()));
            }
            Ok(SqlValue::Text(digits_text))
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn signed(value: &SqlValue, target: &str) -> Result<i64, Diagnostic> {
    match value {
        SqlValue::Int(v) => Ok(*v),
        SqlValue::UInt(v) => i64::try_from(*v).map_err(|_| out_of_range(value, target)),
        SqlValue::Bool(v) => Ok(i64::from(*v)),
        // i64::MAX as f64 rounds up to 2^63
        SqlValue::Float(v) if v.is_finite() && *v >= i64::MIN as f64 && *v < i64::MAX as f64 => {
            Ok(v.trunc() as i64)
        }
        SqlValue::Float(_) => Err(out_of_range(value, target)),
        SqlValue::Text(text) => text.trim().parse().map_err(|_| invalid_cast(value, target)),
        SqlValue::Null | SqlValue::Timestamp(_) => Err(invalid_cast(value, target)),
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn unsigned(value: &SqlValue, target: &str) -> Result<u64, Diagnostic> {
    match value {
        SqlValue::UInt(v) => Ok(*v),
        SqlValue::Int(v) => u64::try_from(*v).map_err(|_| out_of_range(value, target)),
        SqlValue::Bool(v) => Ok(u64::from(*v)),
        SqlValue::Float(v) if v.is_finite() && *v >= 0.0 && *v < u64::MAX as f64 => {
            Ok(v.trunc() as u64)
        }
        SqlValue::Float(_) => Err(out_of_range(value, target)),
        SqlValue::Text(text) => text.trim().parse().map_err(|_| invalid_cast(value, target)),
        SqlValue::Null | SqlValue::Timestamp(_) => Err(invalid_cast(value, target)),
    }
}

#[allow(clippy::cast_precision_loss)]
fn real(value: &SqlValue) -> Result<f64, Diagnostic> {
    match value {
        SqlValue::Float(v) => Ok(*v),
        SqlValue::Int(v) => Ok(*v as f64),
        SqlValue::UInt(v) => Ok(*v as f64),
        SqlValue::Bool(v) => Ok(f64::from(u8::from(*v))),
        SqlValue::Text(text) => text.trim().parse().map_err(|_| invalid_cast(value, "DOUBLE")),
        SqlValue::Null | SqlValue::Timestamp(_) => Err(invalid_cast(value, "DOUBLE")),
    }
}

fn boolean(value: &SqlValue) -> Result<bool, Diagnostic> {
    match value {
        SqlValue::Bool(v) => Ok(*v),
        SqlValue::Int(0) | SqlValue::UInt(0) => Ok(false),
        SqlValue::Int(1) | SqlValue::UInt(1) => Ok(true),
        SqlValue::Int(_) | SqlValue::UInt(_) => Err(out_of_range(value, "BOOLEAN")),
        _ => Err(invalid_cast(value, "BOOLEAN")),
    }
}

fn timestamp(value: &SqlValue) -> Result<Timestamp, Diagnostic> {
    match value {
        SqlValue::Timestamp(v) => Ok(*v),
        SqlValue::Text(text) => text.parse().map_err(|_| invalid_cast(value, "TIMESTAMP")),
        _ => Err(invalid_cast(value, "TIMESTAMP")),
    }
}

fn text(value: SqlValue) -> String {
    match value {
        SqlValue::Text(text) => text,
        other => other.to_string(),
    }
}

/// Exact numerics are kept as integers when they fit, text otherwise.
fn numeric(value: SqlValue) -> Result<SqlValue, Diagnostic> {
    match value {
        SqlValue::Int(_) | SqlValue::UInt(_) => Ok(value),
        SqlValue::Bool(v) => Ok(SqlValue::Int(i64::from(v))),
        SqlValue::Text(ref text) => {
            let trimmed = text.trim();
            if let Ok(v) = trimmed.parse::<i64>() {
                Ok(SqlValue::Int(v))
            } else if let Ok(v) = trimmed.parse::<u64>() {
                Ok(SqlValue::UInt(v))
            } else if trimmed.parse::<i128>().is_ok() {
                Ok(SqlValue::Text(trimmed.to_string()))
            } else {
                Err(invalid_cast(&value, "NUMERIC"))
            }
        }
        other => Err(invalid_cast(&other, "NUMERIC")),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_store_coerces_to_column_class() {
        assert_eq!(
            store(SqlValue::UInt(7), DataType::Integer).unwrap(),
            SqlValue::Int(7)
        );
        assert_eq!(
            store(SqlValue::Text("42".into()), DataType::Numeric).unwrap(),
            SqlValue::Int(42)
        );
        assert_eq!(
            store(SqlValue::Int(3), DataType::Text { length: None }).unwrap(),
            SqlValue::Text("3".into())
        );
        assert_eq!(
            store(SqlValue::Null, DataType::Bool).unwrap(),
            SqlValue::Null
        );
    }

    #[test]
    fn test_store_rejects_bad_values() {
        let err = store(SqlValue::Text("abcdef".into()), DataType::Text { length: Some(4) })
            .unwrap_err();
        assert_eq!(err.state, SqlState::STRING_TRUNCATION);

        let err = store(SqlValue::Int(-1), DataType::Unsigned).unwrap_err();
        assert_eq!(err.state, SqlState::NUMERIC_OUT_OF_RANGE);

        let err = store(SqlValue::Text("x".into()), DataType::Integer).unwrap_err();
        assert_eq!(err.state, SqlState::INVALID_CAST);
    }

    #[test]
    fn test_fetch_converts_to_tag() {
        assert_eq!(
            fetch(&SqlValue::Int(12), TypeTag::Numeric { digits: 4 }).unwrap(),
            SqlValue::Text("12".into())
        );
        assert_eq!(
            fetch(&SqlValue::Int(1), TypeTag::Bit).unwrap(),
            SqlValue::Bool(true)
        );
        assert_eq!(
            fetch(&SqlValue::Int(5), TypeTag::UInteger).unwrap(),
            SqlValue::UInt(5)
        );
        assert_eq!(
            fetch(&SqlValue::UInt(u64::MAX), TypeTag::Numeric { digits: 20 }).unwrap(),
            SqlValue::Text(u64::MAX.to_string())
        );

        let err = fetch(&SqlValue::Text("too long".into()), TypeTag::Char { length: 3 }).unwrap_err();
        assert_eq!(err.state, SqlState::STRING_TRUNCATION);
        let err = fetch(&SqlValue::Int(12345), TypeTag::Numeric { digits: 4 }).unwrap_err();
        assert_eq!(err.state, SqlState::NUMERIC_OUT_OF_RANGE);
    }
}
