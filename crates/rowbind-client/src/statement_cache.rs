//! Per-connection memoization of prepared statements.
//!
//! An entity is read and written through many projections ("select by
//! columns {0, 2}", "update column 1 where column 0"). Each distinct
//! projection needs its own statement text, but the set of projections an
//! application uses is small and fixed by its call sites. The cache prepares
//! each `(operation, column set)` pair once and hands out the same statement
//! on every later lookup.
//!
//! Column sets are bitsets, so the order in which a caller names columns does
//! not matter: the generated text lists columns in the entity's declared
//! order. Entries are never evicted; they live as long as the cache, which in
//! a pool lives as long as its connection.

use std::fmt;

use hashbrown::HashMap;
use hashbrown::hash_map::Entry;
use smallvec::SmallVec;

use crate::connection::Connection;
use crate::error::{Error, Result};

/// The statement kind part of a cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    /// `SELECT`; the column set holds the `WHERE` columns.
    Select,
    /// `INSERT`; the column set holds the inserted columns.
    Insert,
    /// `UPDATE`; the column set holds the `SET` columns plus the `WHERE`
    /// columns shifted by the table width.
    Update,
    /// `DELETE`; the column set holds the `WHERE` columns.
    Delete,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Select => "select",
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        })
    }
}

const WORD_BITS: usize = u64::BITS as usize;

/// A set of column indices.
///
/// Two sets are equal exactly when they contain the same indices. Tables of
/// up to 64 columns (128 for update keys) fit inline.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct ColumnSet {
    // Never has trailing zero words, so equal sets compare equal.
    words: SmallVec<[u64; 2]>,
}

impl ColumnSet {
    /// An empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The set of `indices`; duplicates collapse.
    pub fn from_indices(indices: impl IntoIterator<Item = usize>) -> Self {
        let mut set = Self::new();
        for index in indices {
            set.insert(index);
        }
        set
    }

    /// Add `index`. Returns `false` if it was already present.
    pub fn insert(&mut self, index: usize) -> bool {
        let word = index / WORD_BITS;
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        let bit = 1u64 << (index % WORD_BITS);
        let fresh = self.words[word] & bit == 0;
        self.words[word] |= bit;
        fresh
    }

    /// Whether `index` is in the set.
    #[must_use]
    pub fn contains(&self, index: usize) -> bool {
        self.words
            .get(index / WORD_BITS)
            .is_some_and(|word| word & (1u64 << (index % WORD_BITS)) != 0)
    }

    /// Number of indices in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.words.iter().map(|word| word.count_ones() as usize).sum()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Indices in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.words.iter().enumerate().flat_map(|(position, &word)| {
            (0..WORD_BITS)
                .filter(move |bit| word & (1u64 << bit) != 0)
                .map(move |bit| position * WORD_BITS + bit)
        })
    }

    /// The union of `self` and `other` with every index of `other` shifted
    /// by `offset`.
    ///
    /// Update statements combine their `SET` columns with their `WHERE`
    /// columns this way, using the table width as offset, so that the two
    /// roles never collide.
    #[must_use]
    pub fn with_offset(&self, other: &ColumnSet, offset: usize) -> ColumnSet {
        let mut combined = self.clone();
        for index in other.iter() {
            combined.insert(offset + index);
        }
        combined
    }
}

impl FromIterator<usize> for ColumnSet {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        Self::from_indices(iter)
    }
}

impl fmt::Debug for ColumnSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// Cache key: the statement kind and the columns it addresses.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Statement kind.
    pub kind: OperationKind,
    /// Columns addressed.
    pub columns: ColumnSet,
}

/// Hit and miss counts of a [`StatementCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    /// Lookups served from the cache.
    pub hits: u64,
    /// Lookups that prepared a new statement.
    pub misses: u64,
    /// Entries currently held.
    pub entries: usize,
}

impl CacheStats {
    /// Fraction of lookups served from the cache.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Prepared statements of one connection, keyed by [`CacheKey`].
///
/// The cache attaches itself to the connection of its first lookup and
/// refuses every other connection, since a prepared statement is only valid
/// on the session that prepared it. Entries are boxed, so a statement keeps
/// its address while the map grows.
pub struct StatementCache<S> {
    connection_id: Option<u64>,
    entries: HashMap<CacheKey, Box<S>>,
    hits: u64,
    misses: u64,
}

impl<S> StatementCache<S> {
    /// An empty cache, not yet attached to a connection.
    #[must_use]
    pub fn new() -> Self {
        Self {
            connection_id: None,
            entries: HashMap::new(),
            hits: 0,
            misses: 0,
        }
    }

    /// Return the statement for `(kind, columns)`, building it with
    /// `factory` on first use.
    ///
    /// A factory error leaves the cache unchanged, still unattached if this
    /// was its first lookup, and is returned as is.
    pub fn lookup<F>(
        &mut self,
        conn: &mut Connection,
        kind: OperationKind,
        columns: &ColumnSet,
        factory: F,
    ) -> Result<&mut S>
    where
        F: FnOnce(&mut Connection) -> Result<S>,
    {
        if let Some(expected) = self.connection_id.filter(|&id| id != conn.id()) {
            return Err(Error::ForeignConnection {
                expected,
                actual: conn.id(),
            });
        }

        let key = CacheKey {
            kind,
            columns: columns.clone(),
        };
        match self.entries.entry(key) {
            Entry::Occupied(entry) => {
                self.hits += 1;
                tracing::trace!(connection_id = conn.id(), %kind, ?columns, "statement cache hit");
                Ok(entry.into_mut().as_mut())
            }
            Entry::Vacant(entry) => {
                let statement = factory(conn)?;
                self.connection_id = Some(conn.id());
                self.misses += 1;
                tracing::debug!(connection_id = conn.id(), %kind, ?columns, "statement cache miss");
                Ok(entry.insert(Box::new(statement)).as_mut())
            }
        }
    }

    /// Whether a statement for `(kind, columns)` is cached.
    #[must_use]
    pub fn contains(&self, kind: OperationKind, columns: &ColumnSet) -> bool {
        self.entries.contains_key(&CacheKey {
            kind,
            columns: columns.clone(),
        })
    }

    /// Connection the cache is attached to, if any lookup happened.
    #[must_use]
    pub fn connection_id(&self) -> Option<u64> {
        self.connection_id
    }

    /// Number of cached statements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Hit and miss counts.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            entries: self.entries.len(),
        }
    }
}

impl<S> Default for StatementCache<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> fmt::Debug for StatementCache<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatementCache")
            .field("connection_id", &self.connection_id)
            .field("entries", &self.entries.len())
            .field("hits", &self.hits)
            .field("misses", &self.misses)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::binding::tests::Loopback;

    #[test]
    fn test_column_set_basics() {
        let mut set = ColumnSet::new();
        assert!(set.is_empty());
        assert!(set.insert(2));
        assert!(set.insert(70));
        assert!(!set.insert(2));
        assert!(set.contains(70));
        assert!(!set.contains(3));
        assert!(!set.contains(500));
        assert_eq!(set.len(), 2);
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![2, 70]);
        assert_eq!(format!("{set:?}"), "{2, 70}");
    }

    #[test]
    fn test_column_set_offset_keeps_roles_apart() {
        let values = ColumnSet::from_indices([1]);
        let keys = ColumnSet::from_indices([1]);
        let combined = values.with_offset(&keys, 4);
        assert_eq!(combined.iter().collect::<Vec<_>>(), vec![1, 5]);
        assert_ne!(combined, values);
    }

    #[test]
    fn test_lookup_memoizes() {
        let (mut conn, prepared) = Loopback::connection();
        let mut cache: StatementCache<String> = StatementCache::new();
        let columns = ColumnSet::from_indices([0, 2]);

        let first: *const String = cache
            .lookup(&mut conn, OperationKind::Select, &columns, |c| {
                c.prepare("SELECT a FROM t")?;
                Ok("first".to_string())
            })
            .unwrap();
        let second: *const String = cache
            .lookup(&mut conn, OperationKind::Select, &ColumnSet::from_indices([2, 0]), |_| {
                Ok("second".to_string())
            })
            .unwrap();

        assert!(std::ptr::eq(first, second));
        assert_eq!(prepared.lock().len(), 1);
        assert_eq!(cache.stats(), CacheStats { hits: 1, misses: 1, entries: 1 });
        assert!((cache.stats().hit_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_operation_kind_is_part_of_key() {
        let (mut conn, _prepared) = Loopback::connection();
        let mut cache: StatementCache<OperationKind> = StatementCache::new();
        let columns = ColumnSet::from_indices([0]);
        for kind in [OperationKind::Select, OperationKind::Delete] {
            let cached = cache.lookup(&mut conn, kind, &columns, |_| Ok(kind)).unwrap();
            assert_eq!(*cached, kind);
        }
        assert_eq!(cache.len(), 2);
        assert!(cache.contains(OperationKind::Delete, &columns));
        assert!(!cache.contains(OperationKind::Update, &columns));
    }

    #[test]
    fn test_factory_error_leaves_cache_empty() {
        let (mut conn, _prepared) = Loopback::connection();
        let mut cache: StatementCache<()> = StatementCache::new();
        let result = cache.lookup(&mut conn, OperationKind::Insert, &ColumnSet::new(), |_| {
            Err(Error::Config("boom".into()))
        });
        assert!(result.is_err());
        assert!(cache.is_empty());
        assert_eq!(cache.stats().misses, 0);
        assert_eq!(cache.connection_id(), None);

        // a later connection can still claim the cache
        let (mut other, _prepared) = Loopback::connection();
        cache
            .lookup(&mut other, OperationKind::Insert, &ColumnSet::new(), |_| Ok(()))
            .unwrap();
        assert_eq!(cache.connection_id(), Some(other.id()));
    }

    #[test]
    fn test_foreign_connection_rejected() {
        let (mut first, _) = Loopback::connection();
        let (mut second, _) = Loopback::connection();
        let mut cache: StatementCache<()> = StatementCache::new();
        cache
            .lookup(&mut first, OperationKind::Select, &ColumnSet::new(), |_| Ok(()))
            .unwrap();
        let err = cache
            .lookup(&mut second, OperationKind::Select, &ColumnSet::new(), |_| Ok(()))
            .unwrap_err();
        assert!(matches!(err, Error::ForeignConnection { expected, .. } if expected == first.id()));
    }

    proptest! {
        #[test]
        fn column_set_ignores_order(mut indices in proptest::collection::vec(0usize..200, 0..20)) {
            let forward = ColumnSet::from_indices(indices.iter().copied());
            indices.reverse();
            let backward: ColumnSet = indices.iter().copied().collect();
            prop_assert_eq!(&forward, &backward);

            let mut sorted = indices.clone();
            sorted.sort_unstable();
            sorted.dedup();
            prop_assert_eq!(forward.iter().collect::<Vec<_>>(), sorted);
        }
    }
}
