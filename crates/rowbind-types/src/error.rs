//! Conversion error types.

use thiserror::Error;

use crate::tag::TypeTag;

/// Errors raised while converting between Rust values and bound cells.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeError {
    /// A value does not fit the target Rust type.
    #[error("value {value} out of range for {target}")]
    OutOfRange {
        /// Textual form of the offending value.
        value: String,
        /// Name of the target type.
        target: &'static str,
    },

    /// A NULL was read into a type that cannot represent it.
    #[error("unexpected NULL for non-nullable {target}")]
    UnexpectedNull {
        /// Name of the target type.
        target: &'static str,
    },

    /// The cell holds a value of an incompatible kind.
    #[error("cannot convert {found} into {target}")]
    Mismatch {
        /// Kind of value found in the cell.
        found: &'static str,
        /// Name of the target type.
        target: &'static str,
    },

    /// Text is longer than a fixed-size string buffer.
    #[error("text of {length} bytes overflows buffer of {capacity} bytes")]
    Overflow {
        /// Length of the text in bytes.
        length: usize,
        /// Capacity of the buffer in bytes.
        capacity: usize,
    },

    /// Text is not a decimal integer of the allowed precision.
    #[error("invalid number {text:?} for {tag}")]
    InvalidNumber {
        /// The rejected text.
        text: String,
        /// Tag of the target column.
        tag: TypeTag,
    },

    /// Calendar fields do not describe a valid point in time.
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
}

impl TypeError {
    pub(crate) fn out_of_range(value: impl ToString, target: &'static str) -> Self {
        Self::OutOfRange {
            value: value.to_string(),
            target,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TypeError::out_of_range(300, "i8");
        assert_eq!(err.to_string(), "value 300 out of range for i8");

        let err = TypeError::Overflow {
            length: 12,
            capacity: 8,
        };
        assert_eq!(
            err.to_string(),
            "text of 12 bytes overflows buffer of 8 bytes"
        );
    }
}
