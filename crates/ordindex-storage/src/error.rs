//! Error type for the storage façade.

use thiserror::Error;

/// Errors surfaced by the key-value store.
#[derive(Debug, Error)]
pub enum KvError {
    /// The store handle has been closed (or never opened successfully).
    /// The owner may attempt a single [`reopen`](crate::KvStore::reopen).
    #[error("store is closed")]
    Closed,

    /// An error reported by the underlying database.
    #[error("storage backend error: {0}")]
    Backend(String),

    /// A stored value failed to decode as the requested type.
    #[error("corrupt stored value: {0}")]
    Corrupt(String),
}

impl KvError {
    /// Returns `true` if a reopen-and-retry is worth attempting.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }
}
