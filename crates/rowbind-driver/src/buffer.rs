//! Row-major bind buffers.

use rowbind_types::Cell;

/// A contiguous, row-major run of cells bound to a statement.
///
/// `stride` is the number of slots per row. A statement binds to the buffer's
/// [`address`](Self::address) and [`rows`](Self::rows); when either changes the
/// binding must be reissued.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BindBuffer {
    stride: usize,
    rows: usize,
    cells: Vec<Cell>,
}

impl BindBuffer {
    /// Allocate `rows` rows of `stride` NULL cells.
    #[must_use]
    pub fn new(stride: usize, rows: usize) -> Self {
        Self {
            stride,
            rows,
            cells: vec![Cell::null(); stride * rows],
        }
    }

    /// Slots per row.
    #[must_use]
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Number of rows.
    #[must_use]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Grow or shrink to `rows` rows; new rows are NULL.
    pub fn resize_rows(&mut self, rows: usize) {
        self.cells.resize(self.stride * rows, Cell::null());
        self.rows = rows;
    }

    /// Borrow row `index`. Panics if `index >= rows()`.
    #[must_use]
    pub fn row(&self, index: usize) -> &[Cell] {
        let start = index * self.stride;
        &self.cells[start..start + self.stride]
    }

    /// Mutably borrow row `index`. Panics if `index >= rows()`.
    pub fn row_mut(&mut self, index: usize) -> &mut [Cell] {
        let start = index * self.stride;
        &mut self.cells[start..start + self.stride]
    }

    /// Iterate over all rows.
    pub fn iter_rows(&self) -> impl Iterator<Item = &[Cell]> + '_ {
        (0..self.rows).map(move |index| self.row(index))
    }

    /// Address of the first cell, the identity a binding refers to.
    #[must_use]
    pub fn address(&self) -> usize {
        self.cells.as_ptr() as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowbind_types::SqlValue;

    #[test]
    fn test_rows_are_strided() {
        let mut buffer = BindBuffer::new(2, 3);
        buffer.row_mut(1)[1] = Cell::new(SqlValue::Int(9));
        assert_eq!(buffer.row(1)[1].value, SqlValue::Int(9));
        assert!(buffer.row(2)[0].is_null());
        assert_eq!(buffer.iter_rows().count(), 3);
    }

    #[test]
    fn test_address_stable_without_reallocation() {
        let mut buffer = BindBuffer::new(4, 8);
        let address = buffer.address();
        buffer.row_mut(3)[0] = Cell::new(SqlValue::Bool(true));
        buffer.resize_rows(8);
        assert_eq!(buffer.address(), address);
    }

    #[test]
    fn test_zero_stride_keeps_row_count() {
        let mut buffer = BindBuffer::new(0, 1);
        assert_eq!(buffer.rows(), 1);
        assert!(buffer.row(0).is_empty());
        buffer.resize_rows(5);
        assert_eq!(buffer.rows(), 5);
    }
}
