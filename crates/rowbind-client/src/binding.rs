//! The binding core behind every typed statement shape.
//!
//! A statement has two sides, parameters and result columns. Each side is a
//! [`Slots`] value: the slot types, a [`Shape`] chosen when the statement is
//! built, the bind buffer and the [`Binding`] last issued to the driver.
//! Before executing, each side is synchronised: the driver is called again
//! only if the shape's desired binding differs from the recorded one, which
//! for array shapes means the buffer moved or changed its row count.

use std::fmt;

use rowbind_driver::BindBuffer;
use rowbind_types::ColumnType;

use crate::error::{Error, Result};
use crate::statement::Statement;

/// Lifecycle of a bound statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementState {
    /// Buffers exist but nothing has been bound.
    Unbound,
    /// Prepared by the driver.
    Prepared,
    /// Buffers bound, not executed.
    Bound,
    /// Executed; rows may be fetched.
    Executed,
    /// At least one fetch returned rows.
    Fetching,
    /// Executed without results, or the result set is exhausted.
    Done,
}

impl fmt::Display for StatementState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unbound => "unbound",
            Self::Prepared => "prepared",
            Self::Bound => "bound",
            Self::Executed => "executed",
            Self::Fetching => "fetching",
            Self::Done => "done",
        })
    }
}

/// Row layout of one side of a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    /// A single row bound once.
    Scalar,
    /// A parameter array whose length is set before each execution.
    ParamArray,
    /// A result array receiving up to `fetch_size` rows per fetch.
    RowArray {
        /// Rows per driver fetch.
        fetch_size: usize,
    },
}

/// What has been bound to the driver for one side of a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Binding {
    /// Nothing bound yet.
    #[default]
    Unbound,
    /// Slots bound for a single row.
    Single,
    /// Slots bound for an array of `count` rows at `address`.
    Array {
        /// Buffer address at bind time.
        address: usize,
        /// Row count at bind time.
        count: usize,
    },
}

#[derive(Debug, Clone, Copy)]
enum Side {
    Params,
    Cols,
}

/// One side of a statement: slot types, shape, buffer and binding.
#[derive(Debug)]
pub(crate) struct Slots {
    types: Vec<ColumnType>,
    shape: Shape,
    buffer: BindBuffer,
    binding: Binding,
}

impl Slots {
    pub(crate) fn new(types: Vec<ColumnType>, shape: Shape) -> Self {
        let rows = match shape {
            Shape::Scalar => 1,
            Shape::ParamArray => 0,
            Shape::RowArray { fetch_size } => fetch_size,
        };
        Self {
            buffer: BindBuffer::new(types.len(), rows),
            types,
            shape,
            binding: Binding::Unbound,
        }
    }

    fn desired(&self) -> Binding {
        match self.shape {
            Shape::Scalar => Binding::Single,
            Shape::ParamArray | Shape::RowArray { .. } => Binding::Array {
                address: self.buffer.address(),
                count: self.buffer.rows(),
            },
        }
    }

    /// Reissue driver binds if the desired binding differs from the last one.
    fn sync(&mut self, statement: &mut Statement, side: Side) -> Result<()> {
        let desired = self.desired();
        if desired == self.binding {
            return Ok(());
        }
        // An empty parameter array has nothing to bind.
        if let Binding::Array { count: 0, .. } = desired {
            return Ok(());
        }

        for (index, column) in self.types.iter().enumerate() {
            let slot = u16::try_from(index + 1).map_err(|_| Error::ColumnCount {
                expected: usize::from(u16::MAX),
                actual: self.types.len(),
            })?;
            match side {
                Side::Params => statement.bind_param(slot, *column)?,
                Side::Cols => statement.bind_col(slot, *column)?,
            }
        }

        if let Binding::Array { count, .. } = desired {
            let stride = self.buffer.stride();
            match side {
                Side::Params => statement.bind_param_array(stride, count)?,
                Side::Cols => statement.bind_col_array(stride, count)?,
            }
        }

        self.binding = desired;
        Ok(())
    }
}

/// A prepared statement with both sides of its binding.
#[derive(Debug)]
pub(crate) struct BoundStatement {
    statement: Statement,
    params: Slots,
    cols: Slots,
    state: StatementState,
}

impl BoundStatement {
    /// Wrap a prepared statement and bind every side whose size is known.
    pub(crate) fn new(statement: Statement, params: Slots, cols: Slots) -> Result<Self> {
        let mut bound = Self {
            statement,
            params,
            cols,
            state: StatementState::Prepared,
        };
        bound.params.sync(&mut bound.statement, Side::Params)?;
        bound.cols.sync(&mut bound.statement, Side::Cols)?;
        bound.state = StatementState::Bound;
        Ok(bound)
    }

    pub(crate) fn statement(&self) -> &Statement {
        &self.statement
    }

    pub(crate) fn state(&self) -> StatementState {
        self.state
    }

    pub(crate) fn params_mut(&mut self) -> &mut BindBuffer {
        &mut self.params.buffer
    }

    pub(crate) fn cols(&self) -> &BindBuffer {
        &self.cols.buffer
    }

    /// Change the number of rows per fetch of a row array.
    pub(crate) fn set_fetch_size(&mut self, fetch_size: usize) -> Result<()> {
        if fetch_size == 0 {
            return Err(Error::Config("fetch size must be greater than 0".into()));
        }
        if let Shape::RowArray { .. } = self.cols.shape {
            self.cols.shape = Shape::RowArray { fetch_size };
            self.cols.buffer.resize_rows(fetch_size);
        }
        Ok(())
    }

    pub(crate) fn fetch_size(&self) -> usize {
        match self.cols.shape {
            Shape::RowArray { fetch_size } => fetch_size,
            Shape::Scalar | Shape::ParamArray => 1,
        }
    }

    /// Bind what changed, then execute.
    ///
    /// An empty parameter array executes nothing.
    pub(crate) fn exec(&mut self) -> Result<()> {
        if let Shape::RowArray { fetch_size } = self.cols.shape {
            self.cols.buffer.resize_rows(fetch_size);
        }
        self.params.sync(&mut self.statement, Side::Params)?;
        self.cols.sync(&mut self.statement, Side::Cols)?;
        self.state = StatementState::Bound;

        if self.params.shape == Shape::ParamArray && self.params.buffer.rows() == 0 {
            self.state = StatementState::Done;
            return Ok(());
        }

        self.statement.exec(&self.params.buffer)?;
        self.state = if self.cols.types.is_empty() {
            StatementState::Done
        } else {
            StatementState::Executed
        };
        Ok(())
    }

    /// Fetch the next block of rows.
    ///
    /// Scalar results receive at most one row per call. Row arrays receive up
    /// to the fetch size; the visible rows of [`cols`](Self::cols) shrink to
    /// the number fetched. Once a block comes back short the result set is
    /// known to be exhausted and the next call returns zero without asking
    /// the driver.
    pub(crate) fn fetch(&mut self) -> Result<usize> {
        match self.state {
            StatementState::Executed | StatementState::Fetching => {}
            StatementState::Done => return Ok(0),
            state => {
                return Err(Error::InvalidState {
                    operation: "fetch from",
                    state,
                });
            }
        }

        let fetched = match self.cols.shape {
            Shape::RowArray { fetch_size } => {
                if self.state == StatementState::Fetching && self.cols.buffer.rows() != fetch_size {
                    self.cols.buffer.resize_rows(fetch_size);
                    self.state = StatementState::Done;
                    return Ok(0);
                }
                let fetched = self.statement.fetch(&mut self.cols.buffer)?.min(fetch_size);
                self.cols.buffer.resize_rows(fetched);
                fetched
            }
            Shape::Scalar | Shape::ParamArray => self.statement.fetch(&mut self.cols.buffer)?.min(1),
        };

        self.state = if fetched == 0 {
            StatementState::Done
        } else {
            StatementState::Fetching
        };
        Ok(fetched)
    }
}
