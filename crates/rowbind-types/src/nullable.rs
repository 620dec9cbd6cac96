//! Nullable wrapper with an explicit indicator.

use std::fmt;

use crate::value::NULL_DATA;

/// A value that may be NULL.
///
/// Storage and indicator are kept side by side the way they are bound: the
/// value is always present (default-initialized while NULL) and a negative
/// indicator marks it absent.
#[derive(Debug, Clone, Copy)]
pub struct Nullable<T> {
    value: T,
    indicator: isize,
}

impl<T: Default> Nullable<T> {
    /// The NULL value.
    #[must_use]
    pub fn null() -> Self {
        Self {
            value: T::default(),
            indicator: NULL_DATA,
        }
    }
}

impl<T> Nullable<T> {
    /// A present value.
    #[must_use]
    pub const fn new(value: T) -> Self {
        Self {
            value,
            indicator: 0,
        }
    }

    /// Whether the indicator marks this value as NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.indicator < 0
    }

    /// Borrow the value if present.
    #[must_use]
    pub fn get(&self) -> Option<&T> {
        if self.is_null() {
            None
        } else {
            Some(&self.value)
        }
    }

    /// Replace the content with a present value.
    pub fn set(&mut self, value: T) {
        self.value = value;
        self.indicator = 0;
    }

    /// Convert into an `Option`.
    #[must_use]
    pub fn into_option(self) -> Option<T> {
        if self.is_null() { None } else { Some(self.value) }
    }
}

impl<T: Default> Default for Nullable<T> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T: Default> From<Option<T>> for Nullable<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or_else(Self::null, Self::new)
    }
}

impl<T> From<Nullable<T>> for Option<T> {
    fn from(value: Nullable<T>) -> Self {
        value.into_option()
    }
}

impl<T: PartialEq> PartialEq for Nullable<T> {
    fn eq(&self, other: &Self) -> bool {
        self.get() == other.get()
    }
}

impl<T: Eq> Eq for Nullable<T> {}

impl<T: fmt::Display> fmt::Display for Nullable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(value) => value.fmt(f),
            None => f.write_str("NULL"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_ignores_storage() {
        let a = Nullable::<i32>::null();
        let mut b = Nullable::new(5);
        assert_ne!(a, b);
        b = Nullable::from(None);
        assert_eq!(a, b);
        assert!(b.is_null());
    }

    #[test]
    fn test_option_conversion() {
        let n: Nullable<i64> = Some(7).into();
        assert_eq!(n.get(), Some(&7));
        assert_eq!(Option::from(n), Some(7));
        assert_eq!(Nullable::<i64>::default().into_option(), None);
    }

    #[test]
    fn test_set_clears_null() {
        let mut n = Nullable::<u8>::null();
        n.set(3);
        assert!(!n.is_null());
        assert_eq!(n.to_string(), "3");
    }
}
