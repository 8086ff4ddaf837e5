//! Per-inscription undo log for reorg rollback.
//!
//! Every accepted state change writes an undo record at
//! `0x06 | height_le | tx_index_le` in the same transaction, capturing the
//! exact inverse: delete the created record, or restore the prior bytes and
//! balance. Rolling back a block is then a reverse-order replay of its undo
//! entries — updates, transfers, deploys and mint balances all invert
//! precisely. The metadata value format under `0x04` stays untouched.
//!
//! Record layout: a tag byte, then tag-specific fields; strings and byte
//! blobs are u32-length-prefixed, the holder key is raw 32 bytes.

use ordindex_storage::{Kv, KvError};

use crate::error::IndexError;
use crate::keys;
use crate::types::{Address, PUBLIC_KEY_LEN};

const TAG_REMOVE_NAME: u8 = 1;
const TAG_RESTORE_NAME: u8 = 2;
const TAG_REMOVE_TOKEN: u8 = 3;
const TAG_RESTORE_MINT: u8 = 4;

/// The inverse of one accepted inscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Undo {
    /// Inverse of `reg`: delete the name record.
    RemoveName { namespace: String, name: String },
    /// Inverse of `upd`/`trf`: restore the prior record bytes.
    RestoreName {
        namespace: String,
        name: String,
        prior: Vec<u8>,
    },
    /// Inverse of `deploy`: delete the token state.
    RemoveToken { ticker: String },
    /// Inverse of `mint`: restore the prior token state and the minter's
    /// prior balance (`None` = the balance entry did not exist).
    RestoreMint {
        ticker: String,
        holder: Address,
        prior_state: Vec<u8>,
        prior_balance: Option<i64>,
    },
}

impl Undo {
    /// Counter movement caused by the *forward* application this record
    /// undoes: `(name_records, token_states)`.
    pub fn applied_counter_delta(&self) -> (i64, i64) {
        match self {
            Self::RemoveName { .. } => (1, 0),
            Self::RestoreName { .. } => (0, 0),
            Self::RemoveToken { .. } => (0, 1),
            Self::RestoreMint { .. } => (0, 0),
        }
    }

    /// Apply the inverse operation.
    pub fn revert(&self, kv: &mut dyn Kv) -> Result<(), KvError> {
        match self {
            Self::RemoveName { namespace, name } => kv.remove(&keys::name(namespace, name)),
            Self::RestoreName {
                namespace,
                name,
                prior,
            } => kv.put(&keys::name(namespace, name), prior),
            Self::RemoveToken { ticker } => kv.remove(&keys::token(ticker)),
            Self::RestoreMint {
                ticker,
                holder,
                prior_state,
                prior_balance,
            } => {
                kv.put(&keys::token(ticker), prior_state)?;
                let balance_key = keys::balance(holder, ticker);
                match prior_balance {
                    Some(balance) => kv.put(&balance_key, &balance.to_le_bytes()),
                    None => kv.remove(&balance_key),
                }
            }
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        match self {
            Self::RemoveName { namespace, name } => {
                out.push(TAG_REMOVE_NAME);
                write_blob(&mut out, namespace.as_bytes());
                write_blob(&mut out, name.as_bytes());
            }
            Self::RestoreName {
                namespace,
                name,
                prior,
            } => {
                out.push(TAG_RESTORE_NAME);
                write_blob(&mut out, namespace.as_bytes());
                write_blob(&mut out, name.as_bytes());
                write_blob(&mut out, prior);
            }
            Self::RemoveToken { ticker } => {
                out.push(TAG_REMOVE_TOKEN);
                write_blob(&mut out, ticker.as_bytes());
            }
            Self::RestoreMint {
                ticker,
                holder,
                prior_state,
                prior_balance,
            } => {
                out.push(TAG_RESTORE_MINT);
                write_blob(&mut out, ticker.as_bytes());
                out.extend_from_slice(holder.public_key());
                write_blob(&mut out, prior_state);
                match prior_balance {
                    Some(balance) => {
                        out.push(1);
                        out.extend_from_slice(&balance.to_le_bytes());
                    }
                    None => out.push(0),
                }
            }
        }
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, IndexError> {
        let mut cursor = Cursor { bytes, at: 0 };
        let undo = match cursor.u8()? {
            TAG_REMOVE_NAME => Self::RemoveName {
                namespace: cursor.string()?,
                name: cursor.string()?,
            },
            TAG_RESTORE_NAME => Self::RestoreName {
                namespace: cursor.string()?,
                name: cursor.string()?,
                prior: cursor.blob()?,
            },
            TAG_REMOVE_TOKEN => Self::RemoveToken {
                ticker: cursor.string()?,
            },
            TAG_RESTORE_MINT => {
                let ticker = cursor.string()?;
                let holder = Address::from_public_key(cursor.key()?);
                let prior_state = cursor.blob()?;
                let prior_balance = match cursor.u8()? {
                    0 => None,
                    1 => Some(i64::from_le_bytes(cursor.array()?)),
                    flag => {
                        return Err(IndexError::InvalidRecord(format!(
                            "bad balance flag {flag} in undo record"
                        )))
                    }
                };
                Self::RestoreMint {
                    ticker,
                    holder,
                    prior_state,
                    prior_balance,
                }
            }
            tag => {
                return Err(IndexError::InvalidRecord(format!(
                    "unknown undo record tag {tag}"
                )))
            }
        };
        if cursor.at != bytes.len() {
            return Err(IndexError::InvalidRecord(
                "trailing bytes in undo record".into(),
            ));
        }
        Ok(undo)
    }
}

fn write_blob(out: &mut Vec<u8>, blob: &[u8]) {
    out.extend_from_slice(&(blob.len() as u32).to_le_bytes());
    out.extend_from_slice(blob);
}

struct Cursor<'a> {
    bytes: &'a [u8],
    at: usize,
}

impl Cursor<'_> {
    fn take(&mut self, n: usize) -> Result<&[u8], IndexError> {
        if self.at + n > self.bytes.len() {
            return Err(IndexError::InvalidRecord("undo record truncated".into()));
        }
        let slice = &self.bytes[self.at..self.at + n];
        self.at += n;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, IndexError> {
        Ok(self.take(1)?[0])
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], IndexError> {
        let mut buf = [0u8; N];
        buf.copy_from_slice(self.take(N)?);
        Ok(buf)
    }

    fn key(&mut self) -> Result<[u8; PUBLIC_KEY_LEN], IndexError> {
        self.array::<PUBLIC_KEY_LEN>()
    }

    fn blob(&mut self) -> Result<Vec<u8>, IndexError> {
        let len = u32::from_le_bytes(self.array()?) as usize;
        Ok(self.take(len)?.to_vec())
    }

    fn string(&mut self) -> Result<String, IndexError> {
        String::from_utf8(self.blob()?)
            .map_err(|_| IndexError::InvalidRecord("undo record string is not UTF-8".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ordindex_storage::MemoryKv;

    fn addr(byte: u8) -> Address {
        Address::from_public_key([byte; PUBLIC_KEY_LEN])
    }

    #[test]
    fn every_variant_roundtrips() {
        let records = [
            Undo::RemoveName {
                namespace: "cns".into(),
                name: "alice".into(),
            },
            Undo::RestoreName {
                namespace: "cdns".into(),
                name: "bob".into(),
                prior: b"{\"p\":\"cdns\"}".to_vec(),
            },
            Undo::RemoveToken {
                ticker: "FOO".into(),
            },
            Undo::RestoreMint {
                ticker: "FOO".into(),
                holder: addr(5),
                prior_state: b"{}".to_vec(),
                prior_balance: Some(25),
            },
            Undo::RestoreMint {
                ticker: "BAR".into(),
                holder: addr(6),
                prior_state: b"{}".to_vec(),
                prior_balance: None,
            },
        ];
        for record in records {
            assert_eq!(Undo::decode(&record.encode()).unwrap(), record);
        }
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(Undo::decode(&[]).is_err());
        assert!(Undo::decode(&[99]).is_err());
        let mut bytes = Undo::RemoveToken {
            ticker: "FOO".into(),
        }
        .encode();
        bytes.push(0); // trailing byte
        assert!(Undo::decode(&bytes).is_err());
    }

    #[test]
    fn restore_mint_reinstates_prior_balance_or_absence() {
        let mut kv = MemoryKv::new();
        let holder = addr(1);
        kv.put(&keys::token("FOO"), b"minted").unwrap();
        kv.put(&keys::balance(&holder, "FOO"), &35i64.to_le_bytes())
            .unwrap();

        Undo::RestoreMint {
            ticker: "FOO".into(),
            holder,
            prior_state: b"prior".to_vec(),
            prior_balance: None,
        }
        .revert(&mut kv)
        .unwrap();

        assert_eq!(kv.get(&keys::token("FOO")).unwrap().unwrap(), b"prior");
        assert_eq!(kv.get(&keys::balance(&holder, "FOO")).unwrap(), None);
    }
}
