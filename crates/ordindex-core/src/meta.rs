//! Inscription metadata — the per-transaction audit trail.
//!
//! One entry per parsed inscription, keyed `0x04 | height_le | tx_index_le`.
//! Presence of an entry is also the replay-dedupe marker: it is written in
//! the same transaction as the state change it describes, so "meta exists"
//! implies "already applied".
//!
//! Value layout (compatibility-critical):
//!
//! ```text
//! u8   kind
//! u64  height        (little-endian)
//! u64  tx_index      (little-endian)
//! [u8; 32] source public key
//! u64  payload_len   (little-endian)
//! ...  payload bytes
//! ```

use crate::error::IndexError;
use crate::inscription::InscriptionKind;
use crate::types::{Address, PUBLIC_KEY_LEN};

/// Audit record of a parsed inscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InscriptionMeta {
    pub kind: InscriptionKind,
    pub height: u64,
    pub tx_index: u64,
    pub source: Address,
    pub payload: String,
}

impl InscriptionMeta {
    pub fn encode(&self) -> Vec<u8> {
        let payload = self.payload.as_bytes();
        let mut out = Vec::with_capacity(1 + 8 + 8 + PUBLIC_KEY_LEN + 8 + payload.len());
        out.push(self.kind.as_u8());
        out.extend_from_slice(&self.height.to_le_bytes());
        out.extend_from_slice(&self.tx_index.to_le_bytes());
        out.extend_from_slice(self.source.public_key());
        out.extend_from_slice(&(payload.len() as u64).to_le_bytes());
        out.extend_from_slice(payload);
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, IndexError> {
        const HEADER: usize = 1 + 8 + 8 + PUBLIC_KEY_LEN + 8;
        if bytes.len() < HEADER {
            return Err(IndexError::InvalidRecord(format!(
                "inscription meta too short: {} bytes",
                bytes.len()
            )));
        }
        let kind = InscriptionKind::from_u8(bytes[0]).ok_or_else(|| {
            IndexError::InvalidRecord(format!("unknown inscription kind byte {}", bytes[0]))
        })?;
        let height = read_u64(&bytes[1..9]);
        let tx_index = read_u64(&bytes[9..17]);
        let mut key = [0u8; PUBLIC_KEY_LEN];
        key.copy_from_slice(&bytes[17..17 + PUBLIC_KEY_LEN]);
        let payload_len = read_u64(&bytes[17 + PUBLIC_KEY_LEN..HEADER]) as usize;
        let payload_bytes = &bytes[HEADER..];
        if payload_bytes.len() != payload_len {
            return Err(IndexError::InvalidRecord(format!(
                "inscription meta payload length mismatch: expected {payload_len}, got {}",
                payload_bytes.len()
            )));
        }
        let payload = String::from_utf8(payload_bytes.to_vec())
            .map_err(|_| IndexError::InvalidRecord("inscription payload is not UTF-8".into()))?;
        Ok(Self {
            kind,
            height,
            tx_index,
            source: Address::from_public_key(key),
            payload,
        })
    }
}

fn read_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    u64::from_le_bytes(buf)
}
