//! ordindex-storage — ordered key-value persistence for the ordinal index.
//!
//! # Architecture
//!
//! ```text
//! Kv (trait) ── read/write primitives + typed readers + prefix scan
//!     ├── KvStore   (redb-backed, auto-commit per operation, cloneable handle)
//!     ├── KvBatch   (scoped write transaction obtained via KvStore::batch)
//!     └── MemoryKv  (BTreeMap, dev/testing, no persistence)
//! ```
//!
//! The store holds a single ordered byte-key table. Writers are serialized
//! upstream by the indexer; readers may run concurrently against a live
//! writer. Failures surface both as `Err(KvError)` on the calling path and
//! through an attached failure hook (see [`KvStore::set_failure_hook`]).

pub mod error;
pub mod memory;
pub mod store;

pub use error::KvError;
pub use memory::MemoryKv;
pub use store::{KvBatch, KvStore};

/// Read/write primitives shared by the persistent store, its scoped write
/// transactions, and the in-memory backend.
///
/// `scan_prefix` visits entries in lexicographic key order; the callback
/// returns `true` to continue, `false` to stop early.
pub trait Kv {
    /// Raw value bytes for `key`, or `None` if absent.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KvError>;

    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), KvError>;

    fn remove(&mut self, key: &[u8]) -> Result<(), KvError>;

    fn scan_prefix(
        &self,
        prefix: &[u8],
        visit: &mut dyn FnMut(&[u8], &[u8]) -> bool,
    ) -> Result<(), KvError>;

    fn exists(&self, key: &[u8]) -> Result<bool, KvError> {
        Ok(self.get(key)?.is_some())
    }

    /// Value decoded as UTF-8.
    fn get_string(&self, key: &[u8]) -> Result<Option<String>, KvError> {
        match self.get(key)? {
            None => Ok(None),
            Some(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|_| KvError::Corrupt("value is not valid UTF-8".into())),
        }
    }

    /// Value decoded as a little-endian i64.
    fn get_i64(&self, key: &[u8]) -> Result<Option<i64>, KvError> {
        match self.get(key)? {
            None => Ok(None),
            Some(bytes) => {
                let arr: [u8; 8] = bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| KvError::Corrupt("i64 value is not 8 bytes".into()))?;
                Ok(Some(i64::from_le_bytes(arr)))
            }
        }
    }
}
