//! On-disk key layout.
//!
//! All entries live in one ordered byte-key space, partitioned by a
//! single-byte prefix. The `0x01..0x04` layouts are compatibility-critical:
//! they must match data already indexed by earlier deployments. `0x05`
//! (counters) and `0x06` (undo log) are additive partitions.
//!
//! ```text
//! 0x01 | namespace ':' name        → name record (flat JSON)
//! 0x02 | ticker                    → token state (flat JSON)
//! 0x03 | holder_pubkey | ticker    → balance (little-endian i64)
//! 0x04 | height_le | tx_index_le   → inscription metadata (binary)
//! 0x05 | counter_name              → count (little-endian u64)
//! 0x06 | height_le | tx_index_le   → undo record (binary)
//! ```

use crate::types::Address;

pub const NAME_PREFIX: u8 = 0x01;
pub const TOKEN_PREFIX: u8 = 0x02;
pub const BALANCE_PREFIX: u8 = 0x03;
pub const META_PREFIX: u8 = 0x04;
pub const COUNTER_PREFIX: u8 = 0x05;
pub const UNDO_PREFIX: u8 = 0x06;

/// `0x01 | namespace | ':' | name` — namespace and name must already be
/// normalized to lowercase.
pub fn name(namespace: &str, name: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(2 + namespace.len() + name.len());
    key.push(NAME_PREFIX);
    key.extend_from_slice(namespace.as_bytes());
    key.push(b':');
    key.extend_from_slice(name.as_bytes());
    key
}

/// `0x02 | ticker`
pub fn token(ticker: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + ticker.len());
    key.push(TOKEN_PREFIX);
    key.extend_from_slice(ticker.as_bytes());
    key
}

/// `0x03 | holder public key | ticker`
pub fn balance(holder: &Address, ticker: &str) -> Vec<u8> {
    let pubkey = holder.public_key();
    let mut key = Vec::with_capacity(1 + pubkey.len() + ticker.len());
    key.push(BALANCE_PREFIX);
    key.extend_from_slice(pubkey);
    key.extend_from_slice(ticker.as_bytes());
    key
}

/// `0x04 | height_le | tx_index_le`
pub fn meta(height: u64, tx_index: u64) -> Vec<u8> {
    positioned(META_PREFIX, height, tx_index)
}

/// All metadata entries for one height.
pub fn meta_prefix(height: u64) -> Vec<u8> {
    height_prefix(META_PREFIX, height)
}

/// `0x05 | counter name`
pub fn counter(counter_name: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + counter_name.len());
    key.push(COUNTER_PREFIX);
    key.extend_from_slice(counter_name.as_bytes());
    key
}

/// `0x06 | height_le | tx_index_le`
pub fn undo(height: u64, tx_index: u64) -> Vec<u8> {
    positioned(UNDO_PREFIX, height, tx_index)
}

/// All undo entries for one height.
pub fn undo_prefix(height: u64) -> Vec<u8> {
    height_prefix(UNDO_PREFIX, height)
}

/// The trailing `tx_index_le` of a positioned key, if well-formed.
pub fn tx_index_of(key: &[u8]) -> Option<u64> {
    if key.len() != 17 {
        return None;
    }
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&key[9..17]);
    Some(u64::from_le_bytes(buf))
}

fn positioned(prefix: u8, height: u64, tx_index: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(17);
    key.push(prefix);
    key.extend_from_slice(&height.to_le_bytes());
    key.extend_from_slice(&tx_index.to_le_bytes());
    key
}

fn height_prefix(prefix: u8, height: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(9);
    key.push(prefix);
    key.extend_from_slice(&height.to_le_bytes());
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PUBLIC_KEY_LEN;

    #[test]
    fn name_key_layout() {
        assert_eq!(name("cns", "alice"), b"\x01cns:alice".to_vec());
    }

    #[test]
    fn balance_key_embeds_raw_pubkey() {
        let holder = Address::from_public_key([0xAB; PUBLIC_KEY_LEN]);
        let key = balance(&holder, "FOO");
        assert_eq!(key[0], BALANCE_PREFIX);
        assert_eq!(&key[1..33], &[0xAB; 32]);
        assert_eq!(&key[33..], b"FOO");
    }

    #[test]
    fn meta_key_is_height_then_index_little_endian() {
        let key = meta(10, 2);
        assert_eq!(key.len(), 17);
        assert_eq!(key[0], META_PREFIX);
        assert_eq!(&key[1..9], &10u64.to_le_bytes());
        assert_eq!(&key[9..17], &2u64.to_le_bytes());
        assert!(key.starts_with(&meta_prefix(10)));
        assert_eq!(tx_index_of(&key), Some(2));
    }
}
