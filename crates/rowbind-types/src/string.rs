//! Fixed-capacity character buffers.

use std::fmt;

use crate::error::TypeError;

/// Character data of at most `N` bytes, bound as `VARCHAR(N)`.
///
/// A `FixedString` is nullable by construction: the default value is NULL,
/// and the length reported to the driver is the indicator of the cell.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FixedString<const N: usize> {
    text: Option<String>,
}

impl<const N: usize> FixedString<N> {
    /// Capacity in bytes.
    pub const CAPACITY: usize = N;

    /// Copy `text` into a new buffer, failing if it exceeds `N` bytes.
    pub fn new(text: &str) -> Result<Self, TypeError> {
        if text.len() > N {
            return Err(TypeError::Overflow {
                length: text.len(),
                capacity: N,
            });
        }
        Ok(Self {
            text: Some(text.to_string()),
        })
    }

    /// The NULL string.
    #[must_use]
    pub const fn null() -> Self {
        Self { text: None }
    }

    /// Borrow the text, or `None` for NULL.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// Whether this string is NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.text.is_none()
    }

    /// Length in bytes; zero for NULL.
    #[must_use]
    pub fn len(&self) -> usize {
        self.text.as_ref().map_or(0, String::len)
    }

    /// Whether the string is NULL or empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Take the text out of the buffer.
    #[must_use]
    pub fn into_string(self) -> Option<String> {
        self.text
    }
}

impl<const N: usize> TryFrom<&str> for FixedString<N> {
    type Error = TypeError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl<const N: usize> TryFrom<String> for FixedString<N> {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.len() > N {
            return Err(TypeError::Overflow {
                length: value.len(),
                capacity: N,
            });
        }
        Ok(Self { text: Some(value) })
    }
}

impl<const N: usize> PartialEq<str> for FixedString<N> {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == Some(other)
    }
}

impl<const N: usize> PartialEq<&str> for FixedString<N> {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == Some(*other)
    }
}

impl<const N: usize> fmt::Display for FixedString<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.text {
            Some(text) => f.write_str(text),
            None => f.write_str("NULL"),
        }
    }
}
