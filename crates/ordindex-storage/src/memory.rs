//! In-memory backend.
//!
//! Holds the same ordered byte-key space as the persistent store in a
//! `BTreeMap`. Useful for unit-testing the state machines without touching
//! disk; all data is lost when the value is dropped.

use std::collections::BTreeMap;
use std::ops::Bound;

use crate::error::KvError;
use crate::Kv;

/// In-memory key-value store.
#[derive(Debug, Default)]
pub struct MemoryKv {
    map: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries.
    pub fn size(&self) -> usize {
        self.map.len()
    }
}

impl Kv for MemoryKv {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KvError> {
        Ok(self.map.get(key).cloned())
    }

    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), KvError> {
        if key.is_empty() {
            return Err(KvError::Corrupt("empty key".into()));
        }
        self.map.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn remove(&mut self, key: &[u8]) -> Result<(), KvError> {
        self.map.remove(key);
        Ok(())
    }

    fn scan_prefix(
        &self,
        prefix: &[u8],
        visit: &mut dyn FnMut(&[u8], &[u8]) -> bool,
    ) -> Result<(), KvError> {
        let range = self
            .map
            .range::<[u8], _>((Bound::Included(prefix), Bound::Unbounded));
        for (k, v) in range {
            if !k.starts_with(prefix) {
                break;
            }
            if !visit(k, v) {
                break;
            }
        }
        Ok(())
    }
}
