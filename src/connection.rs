//! Connection context.
//!
//! Queues carry their store handle explicitly, but callers that prefer not to
//! thread a handle through every constructor can bind one on a LIFO stack and
//! build queues with [`Queue::from_context`](crate::Queue::from_context).
//!
//! Pushes and pops must be balanced by the caller. [`use_connection`] returns
//! a guard that removes its own binding on drop, which keeps the stack
//! balanced on every exit path, including panics.
//!
//! The process-wide stack is shared by all threads. Binding different
//! connections from several threads at once needs external coordination.

use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use tracing::warn;

use crate::error::ConnectionError;
use crate::store::Store;

/// Shared handle to a store.
pub type Connection = Arc<dyn Store>;

/// A LIFO stack of connections; the top one is current.
#[derive(Default)]
pub struct ConnectionStack {
    stack: Mutex<Vec<Connection>>,
}

impl ConnectionStack {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Connection>> {
        // A panic while holding the lock cannot leave the Vec half-modified.
        self.stack.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Makes `conn` the current connection.
    pub fn push(&self, conn: Connection) {
        self.lock().push(conn);
    }

    /// Removes and returns the current connection.
    pub fn pop(&self) -> Option<Connection> {
        self.lock().pop()
    }

    /// Returns the current connection.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionError::NoActiveConnection` if the stack is empty.
    pub fn current(&self) -> Result<Connection, ConnectionError> {
        self.lock()
            .last()
            .cloned()
            .ok_or(ConnectionError::NoActiveConnection)
    }

    pub fn depth(&self) -> usize {
        self.lock().len()
    }

    /// Binds `conn` until the returned guard is dropped.
    pub fn bind(&self, conn: Connection) -> ConnectionGuard<'_> {
        self.push(Arc::clone(&conn));
        ConnectionGuard {
            stack: self,
            bound: conn,
        }
    }

    /// Removes the topmost entry that is `conn` itself.
    fn unbind(&self, conn: &Connection) {
        let mut stack = self.lock();
        let Some(index) = stack.iter().rposition(|c| Arc::ptr_eq(c, conn)) else {
            warn!("Bound connection was already popped from the stack");
            return;
        };
        if index + 1 != stack.len() {
            warn!(
                depth = stack.len(),
                position = index,
                "Connection guard dropped out of order"
            );
        }
        stack.remove(index);
    }
}

/// Unbinds the connection it bound when dropped.
#[must_use = "the connection is unbound as soon as the guard is dropped"]
pub struct ConnectionGuard<'a> {
    stack: &'a ConnectionStack,
    bound: Connection,
}

impl Drop for ConnectionGuard<'_> {
    fn drop(&mut self) {
        self.stack.unbind(&self.bound);
    }
}

fn global() -> &'static ConnectionStack {
    static STACK: OnceLock<ConnectionStack> = OnceLock::new();
    STACK.get_or_init(ConnectionStack::new)
}

/// Pushes `conn` onto the process-wide stack.
pub fn push_connection(conn: Connection) {
    global().push(conn);
}

/// Pops the current connection from the process-wide stack.
pub fn pop_connection() -> Option<Connection> {
    global().pop()
}

/// Returns the current connection of the process-wide stack.
pub fn current_connection() -> Result<Connection, ConnectionError> {
    global().current()
}

/// Binds `conn` on the process-wide stack for the lifetime of the guard.
pub fn use_connection(conn: Connection) -> ConnectionGuard<'static> {
    global().bind(conn)
}
