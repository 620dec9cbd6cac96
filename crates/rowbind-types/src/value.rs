//! Bound cell storage.

use std::cmp::Ordering;
use std::fmt;

use crate::timestamp::Timestamp;

/// Indicator value marking a NULL cell.
pub const NULL_DATA: isize = -1;

/// A dynamically typed scalar as it travels through a bind buffer.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SqlValue {
    /// No value stored.
    #[default]
    Null,
    /// Boolean.
    Bool(bool),
    /// Signed integer of any width.
    Int(i64),
    /// Unsigned integer of any width.
    UInt(u64),
    /// Floating point of any width.
    Float(f64),
    /// Character data, also used for exact numerics.
    Text(String),
    /// Date and time.
    Timestamp(Timestamp),
}

impl SqlValue {
    /// Short name of the value kind, used in conversion errors.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "NULL",
            Self::Bool(_) => "bool",
            Self::Int(_) => "integer",
            Self::UInt(_) => "unsigned integer",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::Timestamp(_) => "timestamp",
        }
    }

    /// Whether this is [`SqlValue::Null`].
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Compare two values the way a database compares them.
    ///
    /// Integers, unsigned integers and floats compare numerically with each
    /// other. NULL and values of unrelated kinds are unordered.
    #[must_use]
    pub fn sql_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Null, _) | (_, Self::Null) => None,
            (Self::Bool(a), Self::Bool(b)) => Some(a.cmp(b)),
            (Self::Int(a), Self::Int(b)) => Some(a.cmp(b)),
            (Self::UInt(a), Self::UInt(b)) => Some(a.cmp(b)),
            (Self::Int(a), Self::UInt(b)) => Some(i128::from(*a).cmp(&i128::from(*b))),
            (Self::UInt(a), Self::Int(b)) => Some(i128::from(*a).cmp(&i128::from(*b))),
            (Self::Bool(a), Self::Int(b)) => Some(i64::from(*a).cmp(b)),
            (Self::Int(a), Self::Bool(b)) => Some(a.cmp(&i64::from(*b))),
            (Self::Float(a), b) => b.as_f64().and_then(|b| a.partial_cmp(&b)),
            (a, Self::Float(b)) => a.as_f64().and_then(|a| a.partial_cmp(b)),
            (Self::Text(a), Self::Text(b)) => Some(a.cmp(b)),
            (Self::Timestamp(a), Self::Timestamp(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::UInt(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::UInt(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "{v:?}"),
            Self::Timestamp(v) => write!(f, "{v}"),
        }
    }
}

/// One slot of a bind buffer: a value plus its length/indicator.
///
/// A negative indicator means NULL in both directions. For character data
/// the indicator holds the byte length of the text; for every other kind it
/// is zero when a value is present.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    /// Stored value.
    pub value: SqlValue,
    /// Length or [`NULL_DATA`].
    pub indicator: isize,
}

impl Cell {
    /// A NULL cell.
    #[must_use]
    pub const fn null() -> Self {
        Self {
            value: SqlValue::Null,
            indicator: NULL_DATA,
        }
    }

    /// A cell holding `value`, with the indicator derived from it.
    #[must_use]
    pub fn new(value: SqlValue) -> Self {
        let indicator = match &value {
            SqlValue::Null => NULL_DATA,
            // String lengths are bounded by isize::MAX.
            SqlValue::Text(text) => isize::try_from(text.len()).unwrap_or(isize::MAX),
            _ => 0,
        };
        Self { value, indicator }
    }

    /// Whether the indicator marks this cell as NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.indicator < 0
    }
}

impl Default for Cell {
    fn default() -> Self {
        Self::null()
    }
}

impl From<SqlValue> for Cell {
    fn from(value: SqlValue) -> Self {
        Self::new(value)
    }
}
