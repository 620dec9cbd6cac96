//! Transaction support.

use std::ops::{Deref, DerefMut};

use crate::connection::Connection;
use crate::error::Result;

/// A database transaction.
///
/// Connections never auto-commit, so a transaction is simply the span
/// between two completions. `Transaction` borrows its connection mutably,
/// which keeps a second transaction (or a statement from another scope) off
/// the same connection while it is open. It dereferences to the connection
/// for preparing statements.
///
/// Dropping a transaction that was not committed rolls it back.
///
/// ```rust,ignore
/// let mut tx = Transaction::begin(&mut conn);
/// users.insert(&mut tx, &row)?;
/// tx.commit()?;
/// ```
#[derive(Debug)]
pub struct Transaction<'c> {
    connection: &'c mut Connection,
    finished: bool,
}

impl<'c> Transaction<'c> {
    /// Start a transaction on `connection`.
    pub fn begin(connection: &'c mut Connection) -> Self {
        tracing::trace!(connection_id = connection.id(), "transaction started");
        Self {
            connection,
            finished: false,
        }
    }

    /// Make the transaction's changes durable.
    pub fn commit(mut self) -> Result<()> {
        self.finished = true;
        self.connection.commit()
    }

    /// Discard the transaction's changes.
    pub fn rollback(mut self) -> Result<()> {
        self.finished = true;
        self.connection.rollback()
    }
}

impl Deref for Transaction<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.connection
    }
}

impl DerefMut for Transaction<'_> {
    fn deref_mut(&mut self) -> &mut Connection {
        self.connection
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Err(e) = self.connection.rollback() {
            tracing::warn!(
                connection_id = self.connection.id(),
                error = %e,
                "rollback of abandoned transaction failed"
            );
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::binding::tests::Loopback;

    #[test]
    fn test_transaction_derefs_to_connection() {
        let (mut conn, prepared) = Loopback::connection();
        let id = conn.id();
        {
            let mut tx = Transaction::begin(&mut conn);
            assert_eq!(tx.id(), id);
            tx.execute("DELETE FROM t").unwrap();
            tx.commit().unwrap();
        }
        assert_eq!(*prepared.lock(), vec!["DELETE FROM t"]);
    }

    #[test]
    fn test_drop_without_commit() {
        let (mut conn, _prepared) = Loopback::connection();
        let tx = Transaction::begin(&mut conn);
        drop(tx);
        assert!(!conn.is_dead());
    }
}
