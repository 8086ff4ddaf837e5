//! Error types for the index core.

use thiserror::Error;

use ordindex_storage::KvError;

pub type Result<T> = std::result::Result<T, IndexError>;

/// Errors that can occur while indexing.
///
/// Parse failures and policy rejections are not errors — they are silent
/// drops (see the parser and state machines). What remains is storage
/// trouble, checkpoint-file trouble, and corrupt persisted records.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("storage error: {0}")]
    Storage(#[from] KvError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid stored record: {0}")]
    InvalidRecord(String),
}

impl IndexError {
    /// Returns `true` if the error came from the storage backend.
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}
