//! Persisted per-kind counters.
//!
//! Each counter is a little-endian u64 under the `0x05` prefix, adjusted in
//! the same write transaction as the mutation it counts. This replaces any
//! need to estimate counts from the total store size.

use ordindex_storage::{Kv, KvError};

use crate::keys;

/// Live name records.
pub const CNS: &str = "cns";
/// Live token states.
pub const TOKENS: &str = "tokens";
/// Inscription metadata entries (including `Unknown` and rejected ones).
pub const INSCRIPTIONS: &str = "inscriptions";

/// Current value of a counter (0 if never written).
pub fn read(kv: &dyn Kv, name: &str) -> Result<u64, KvError> {
    match kv.get(&keys::counter(name))? {
        None => Ok(0),
        Some(bytes) => {
            let arr: [u8; 8] = bytes
                .as_slice()
                .try_into()
                .map_err(|_| KvError::Corrupt(format!("counter '{name}' is not 8 bytes")))?;
            Ok(u64::from_le_bytes(arr))
        }
    }
}

/// Apply a signed delta, clamping at zero.
pub fn add(kv: &mut dyn Kv, name: &str, delta: i64) -> Result<(), KvError> {
    if delta == 0 {
        return Ok(());
    }
    let current = read(kv, name)?;
    let next = if delta >= 0 {
        current.saturating_add(delta as u64)
    } else {
        current.saturating_sub(delta.unsigned_abs())
    };
    kv.put(&keys::counter(name), &next.to_le_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ordindex_storage::MemoryKv;

    #[test]
    fn starts_at_zero_and_accumulates() {
        let mut kv = MemoryKv::new();
        assert_eq!(read(&kv, CNS).unwrap(), 0);
        add(&mut kv, CNS, 3).unwrap();
        add(&mut kv, CNS, -1).unwrap();
        assert_eq!(read(&kv, CNS).unwrap(), 2);
    }

    #[test]
    fn never_goes_negative() {
        let mut kv = MemoryKv::new();
        add(&mut kv, TOKENS, -5).unwrap();
        assert_eq!(read(&kv, TOKENS).unwrap(), 0);
    }
}
