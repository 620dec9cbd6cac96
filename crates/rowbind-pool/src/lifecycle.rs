//! Bundle lifecycle: creation, reuse and discard.
//!
//! A pool slot starts empty. The first lease that runs an action on it opens
//! a connection and prepares the per-connection [`Statements`]; together
//! they form a bundle. The bundle stays in the slot across leases until
//! an action fails on a connection the driver reports dead, at which point
//! the whole bundle is dropped and the next lease builds a fresh one.

use std::time::Instant;

use rowbind_client::{Config, Connection, Environment, StatementCache};

/// Per-connection state built once and reused by every lease of a bundle.
///
/// Typically a struct of [`Table`](rowbind_client::Table)s or prepared
/// statements. Prepared statements are only valid on the connection that
/// prepared them, so they are discarded together with it.
pub trait Statements: Sized + Send + 'static {
    /// Build the statements for a freshly opened connection.
    fn prepare(conn: &mut Connection) -> rowbind_client::Result<Self>;
}

impl Statements for () {
    fn prepare(_conn: &mut Connection) -> rowbind_client::Result<Self> {
        Ok(())
    }
}

impl<S: Send + 'static> Statements for StatementCache<S> {
    fn prepare(_conn: &mut Connection) -> rowbind_client::Result<Self> {
        Ok(StatementCache::new())
    }
}

/// Metadata about a pooled connection.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionMetadata {
    /// Connection id.
    pub id: u64,
    /// When the connection was opened.
    pub created_at: Instant,
    /// When an action last ran on it.
    pub last_used: Instant,
    /// Number of actions run on it.
    pub uses: u64,
}

impl ConnectionMetadata {
    fn new(id: u64) -> Self {
        let now = Instant::now();
        Self {
            id,
            created_at: now,
            last_used: now,
            uses: 0,
        }
    }

    /// Time since the connection was opened.
    #[must_use]
    pub fn age(&self) -> std::time::Duration {
        self.created_at.elapsed()
    }

    /// Time since the connection was last used.
    #[must_use]
    pub fn idle_time(&self) -> std::time::Duration {
        self.last_used.elapsed()
    }

    pub(crate) fn touch(&mut self) {
        self.last_used = Instant::now();
        self.uses += 1;
    }
}

/// A connection with its statements.
pub(crate) struct Bundle<S> {
    // Statements are declared first so they drop before their connection.
    pub(crate) statements: S,
    pub(crate) connection: Connection,
    pub(crate) metadata: ConnectionMetadata,
}

/// A pool slot, empty until first used.
pub(crate) struct Slot<S> {
    bundle: Option<Bundle<S>>,
}

impl<S> Default for Slot<S> {
    fn default() -> Self {
        Self { bundle: None }
    }
}

impl<S: Statements> Slot<S> {
    /// Whether the slot holds an open connection.
    pub(crate) fn is_materialized(&self) -> bool {
        self.bundle.is_some()
    }

    pub(crate) fn metadata(&self) -> Option<&ConnectionMetadata> {
        self.bundle.as_ref().map(|bundle| &bundle.metadata)
    }

    /// The slot's bundle, opening the connection and preparing statements
    /// if there is none yet.
    pub(crate) fn materialize(
        &mut self,
        environment: &Environment,
        config: &Config,
    ) -> rowbind_client::Result<&mut Bundle<S>> {
        let bundle = match self.bundle.take() {
            Some(bundle) => bundle,
            None => {
                let mut connection = environment.connect(config)?;
                let statements = S::prepare(&mut connection)?;
                let metadata = ConnectionMetadata::new(connection.id());
                tracing::debug!(connection_id = metadata.id, "pooled connection created");
                Bundle {
                    statements,
                    connection,
                    metadata,
                }
            }
        };
        Ok(self.bundle.insert(bundle))
    }

    /// Drop the bundle if its connection is dead. Returns whether it was
    /// dropped.
    pub(crate) fn discard_if_dead(&mut self) -> bool {
        match self.bundle.take() {
            Some(bundle) if bundle.connection.is_dead() => {
                tracing::warn!(
                    connection_id = bundle.metadata.id,
                    uses = bundle.metadata.uses,
                    "dead connection discarded"
                );
                true
            }
            bundle => {
                self.bundle = bundle;
                false
            }
        }
    }
}
