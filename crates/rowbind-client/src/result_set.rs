//! Row iteration over executed statements.

use crate::error::Result;

/// A statement that delivers rows in blocks.
pub trait RowSource {
    /// Row type.
    type Row: Clone;

    /// Fetch the next block. Returns `false` once the result set is exhausted.
    fn fetch_batch(&mut self) -> Result<bool>;

    /// Rows of the current block.
    fn batch(&self) -> &[Self::Row];
}

/// Iterator over all remaining rows of an executed statement.
///
/// Blocks are fetched lazily and flattened. After the first error the
/// iterator is fused.
pub struct Rows<'s, S: RowSource> {
    source: &'s mut S,
    position: usize,
    loaded: bool,
    exhausted: bool,
}

impl<'s, S: RowSource> Rows<'s, S> {
    pub(crate) fn new(source: &'s mut S) -> Self {
        Self {
            source,
            position: 0,
            loaded: false,
            exhausted: false,
        }
    }
}

impl<S: RowSource> Iterator for Rows<'_, S> {
    type Item = Result<S::Row>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.exhausted {
                return None;
            }
            if self.loaded && self.position < self.source.batch().len() {
                let row = self.source.batch()[self.position].clone();
                self.position += 1;
                return Some(Ok(row));
            }
            match self.source.fetch_batch() {
                Ok(true) => {
                    self.loaded = true;
                    self.position = 0;
                }
                Ok(false) => {
                    self.exhausted = true;
                    return None;
                }
                Err(err) => {
                    self.exhausted = true;
                    return Some(Err(err));
                }
            }
        }
    }
}

impl<S: RowSource> std::iter::FusedIterator for Rows<'_, S> {}
