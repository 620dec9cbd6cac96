//! Exact decimal integers transported as text.

use std::fmt;
use std::str::FromStr;

use crate::error::TypeError;
use crate::tag::TypeTag;

/// A decimal integer of at most `N` digits, bound as `NUMERIC(N)`.
///
/// The value travels as character data so that precision beyond 64 bits
/// survives the driver boundary. The default value is NULL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Number<const N: usize> {
    text: Option<String>,
}

impl<const N: usize> Number<N> {
    /// Validate and store `text`.
    ///
    /// Accepts an optional sign followed by one to `N` ASCII digits.
    pub fn new(text: &str) -> Result<Self, TypeError> {
        let digits = text.strip_prefix(['-', '+']).unwrap_or(text);
        if digits.is_empty() || digits.len() > N || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(TypeError::InvalidNumber {
                text: text.to_string(),
                tag: TypeTag::Numeric { digits: N },
            });
        }
        let text = text.strip_prefix('+').unwrap_or(text);
        Ok(Self {
            text: Some(text.to_string()),
        })
    }

    /// The NULL number.
    #[must_use]
    pub const fn null() -> Self {
        Self { text: None }
    }

    /// Whether this number is NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.text.is_none()
    }

    /// The decimal text, or `None` for NULL.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// Convert to `i128`.
    pub fn to_i128(&self) -> Result<i128, TypeError> {
        let text = self
            .text
            .as_deref()
            .ok_or(TypeError::UnexpectedNull { target: "i128" })?;
        text.parse()
            .map_err(|_| TypeError::out_of_range(text, "i128"))
    }

    /// Convert to `i64`.
    pub fn to_i64(&self) -> Result<i64, TypeError> {
        let value = self.to_i128()?;
        i64::try_from(value).map_err(|_| TypeError::out_of_range(value, "i64"))
    }

    /// Convert to `u64`.
    pub fn to_u64(&self) -> Result<u64, TypeError> {
        let value = self.to_i128()?;
        u64::try_from(value).map_err(|_| TypeError::out_of_range(value, "u64"))
    }

    /// Convert to a `rust_decimal::Decimal`.
    #[cfg(feature = "decimal")]
    pub fn to_decimal(&self) -> Result<rust_decimal::Decimal, TypeError> {
        let text = self
            .text
            .as_deref()
            .ok_or(TypeError::UnexpectedNull { target: "Decimal" })?;
        text.parse()
            .map_err(|_| TypeError::out_of_range(text, "Decimal"))
    }
}

impl<const N: usize> FromStr for Number<N> {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

macro_rules! number_from_int {
    ($($ty:ty),*) => {
        $(
            impl<const N: usize> TryFrom<$ty> for Number<N> {
                type Error = TypeError;

                fn try_from(value: $ty) -> Result<Self, Self::Error> {
                    Self::new(&value.to_string())
                }
            }
        )*
    };
}

number_from_int!(i32, i64, u32, u64, i128);

#[cfg(feature = "decimal")]
impl<const N: usize> TryFrom<rust_decimal::Decimal> for Number<N> {
    type Error = TypeError;

    fn try_from(value: rust_decimal::Decimal) -> Result<Self, Self::Error> {
        if !value.fract().is_zero() {
            return Err(TypeError::InvalidNumber {
                text: value.to_string(),
                tag: TypeTag::Numeric { digits: N },
            });
        }
        Self::new(&value.trunc().to_string())
    }
}

impl<const N: usize> fmt::Display for Number<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str().unwrap_or("NULL"))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_precision_is_enforced() {
        assert!(Number::<3>::new("999").is_ok());
        assert!(Number::<3>::new("-999").is_ok());
        assert!(Number::<3>::new("1000").is_err());
        assert!(Number::<3>::new("").is_err());
        assert!(Number::<3>::new("1.5").is_err());
        assert_eq!(Number::<3>::new("+12").unwrap().as_str(), Some("12"));
    }

    #[test]
    fn test_integer_conversions() {
        let n = Number::<20>::try_from(u64::MAX).unwrap();
        assert_eq!(n.to_u64().unwrap(), u64::MAX);
        assert!(n.to_i64().is_err());

        let n: Number<5> = "-42".parse().unwrap();
        assert_eq!(n.to_i64().unwrap(), -42);
        assert!(n.to_u64().is_err());
    }

    #[test]
    fn test_null_conversion_fails() {
        let n = Number::<5>::default();
        assert!(n.is_null());
        assert_eq!(
            n.to_i64(),
            Err(TypeError::UnexpectedNull { target: "i128" })
        );
    }

    #[cfg(feature = "decimal")]
    #[test]
    fn test_decimal_conversion() {
        use rust_decimal::Decimal;

        let n = Number::<10>::try_from(Decimal::new(12_345, 0)).unwrap();
        assert_eq!(n.to_decimal().unwrap(), Decimal::new(12_345, 0));
        assert!(Number::<10>::try_from(Decimal::new(12_345, 2)).is_err());
    }
}
