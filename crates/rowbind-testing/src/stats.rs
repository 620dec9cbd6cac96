//! Driver call counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// A driver call or lifecycle event that is counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Counter {
    ConnectionOpened,
    ConnectionClosed,
    Prepare,
    ParameterBind,
    ColumnBind,
    ParameterArrayBind,
    RowArrayBind,
    Execute,
    Fetch,
    Commit,
    Rollback,
}

/// Live counters shared by every connection of a driver.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    connections_opened: AtomicU64,
    connections_closed: AtomicU64,
    prepares: AtomicU64,
    parameter_binds: AtomicU64,
    column_binds: AtomicU64,
    parameter_array_binds: AtomicU64,
    row_array_binds: AtomicU64,
    executes: AtomicU64,
    fetches: AtomicU64,
    commits: AtomicU64,
    rollbacks: AtomicU64,
}

impl Counters {
    fn counter(&self, counter: Counter) -> &AtomicU64 {
        match counter {
            Counter::ConnectionOpened => &self.connections_opened,
            Counter::ConnectionClosed => &self.connections_closed,
            Counter::Prepare => &self.prepares,
            Counter::ParameterBind => &self.parameter_binds,
            Counter::ColumnBind => &self.column_binds,
            Counter::ParameterArrayBind => &self.parameter_array_binds,
            Counter::RowArrayBind => &self.row_array_binds,
            Counter::Execute => &self.executes,
            Counter::Fetch => &self.fetches,
            Counter::Commit => &self.commits,
            Counter::Rollback => &self.rollbacks,
        }
    }

    pub(crate) fn record(&self, counter: Counter) {
        self.counter(counter).fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> MemStats {
        let load = |counter| self.counter(counter).load(Ordering::Relaxed);
        MemStats {
            connections_opened: load(Counter::ConnectionOpened),
            connections_closed: load(Counter::ConnectionClosed),
            prepares: load(Counter::Prepare),
            parameter_binds: load(Counter::ParameterBind),
            column_binds: load(Counter::ColumnBind),
            parameter_array_binds: load(Counter::ParameterArrayBind),
            row_array_binds: load(Counter::RowArrayBind),
            executes: load(Counter::Execute),
            fetches: load(Counter::Fetch),
            commits: load(Counter::Commit),
            rollbacks: load(Counter::Rollback),
        }
    }

    pub(crate) fn reset(&self) {
        for counter in [
            &self.connections_opened,
            &self.connections_closed,
            &self.prepares,
            &self.parameter_binds,
            &self.column_binds,
            &self.parameter_array_binds,
            &self.row_array_binds,
            &self.executes,
            &self.fetches,
            &self.commits,
            &self.rollbacks,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// A snapshot of the calls a [`MemDriver`](crate::MemDriver) has served.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemStats {
    /// Connections opened.
    pub connections_opened: u64,
    /// Connections disconnected.
    pub connections_closed: u64,
    /// Statements prepared.
    pub prepares: u64,
    /// `bind_parameter` calls.
    pub parameter_binds: u64,
    /// `bind_column` calls.
    pub column_binds: u64,
    /// `bind_parameter_array` calls.
    pub parameter_array_binds: u64,
    /// `bind_row_array` calls.
    pub row_array_binds: u64,
    /// `execute` calls.
    pub executes: u64,
    /// `fetch` calls.
    pub fetches: u64,
    /// Transactions committed.
    pub commits: u64,
    /// Transactions rolled back.
    pub rollbacks: u64,
}

impl MemStats {
    /// Connections currently open.
    #[must_use]
    pub fn open_connections(&self) -> u64 {
        self.connections_opened.saturating_sub(self.connections_closed)
    }

    /// All bind calls of any kind.
    #[must_use]
    pub fn binds(&self) -> u64 {
        self.parameter_binds + self.column_binds + self.parameter_array_binds + self.row_array_binds
    }

    /// Counts accumulated since `earlier` was taken.
    #[must_use]
    pub fn since(&self, earlier: &MemStats) -> MemStats {
        MemStats {
            connections_opened: self.connections_opened.saturating_sub(earlier.connections_opened),
            connections_closed: self.connections_closed.saturating_sub(earlier.connections_closed),
            prepares: self.prepares.saturating_sub(earlier.prepares),
            parameter_binds: self.parameter_binds.saturating_sub(earlier.parameter_binds),
            column_binds: self.column_binds.saturating_sub(earlier.column_binds),
            parameter_array_binds: self
                .parameter_array_binds
                .saturating_sub(earlier.parameter_array_binds),
            row_array_binds: self.row_array_binds.saturating_sub(earlier.row_array_binds),
            executes: self.executes.saturating_sub(earlier.executes),
            fetches: self.fetches.saturating_sub(earlier.fetches),
            commits: self.commits.saturating_sub(earlier.commits),
            rollbacks: self.rollbacks.saturating_sub(earlier.rollbacks),
        }
    }
}
