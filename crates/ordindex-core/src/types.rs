//! Shared types for the indexing pipeline: addresses, transactions, blocks.
//!
//! Blocks and transactions are provided by the external block store; the
//! indexer never mutates them. A transaction carries a small map of typed
//! user fields; the inscription payload travels in one of them as a string.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Length of an address public key in bytes.
pub const PUBLIC_KEY_LEN: usize = 32;

// ─── Address ─────────────────────────────────────────────────────────────────

/// A public-key-derived account identifier.
///
/// Stored and displayed as Base58 of the raw key; compared by key bytes.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address {
    key: [u8; PUBLIC_KEY_LEN],
}

impl Address {
    pub fn from_public_key(key: [u8; PUBLIC_KEY_LEN]) -> Self {
        Self { key }
    }

    pub fn public_key(&self) -> &[u8; PUBLIC_KEY_LEN] {
        &self.key
    }

    pub fn to_base58(&self) -> String {
        bs58::encode(&self.key).into_string()
    }

    /// Decode a Base58 string; `None` if it is not a valid key encoding.
    pub fn from_base58(s: &str) -> Option<Self> {
        let bytes = bs58::decode(s).into_vec().ok()?;
        let key: [u8; PUBLIC_KEY_LEN] = bytes.try_into().ok()?;
        Some(Self { key })
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base58())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_base58())
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base58())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_base58(&s).ok_or_else(|| D::Error::custom("invalid Base58 address"))
    }
}

// ─── Transactions & blocks ───────────────────────────────────────────────────

/// A typed user field attached to a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserField {
    Text(String),
    Integer(i64),
    Bytes(Vec<u8>),
}

/// A transaction as seen by the indexer: source, target, user fields.
#[derive(Debug, Clone)]
pub struct Transaction {
    pub source: Address,
    pub target: Address,
    pub fields: BTreeMap<u32, UserField>,
}

impl Transaction {
    pub fn new(source: Address, target: Address) -> Self {
        Self {
            source,
            target,
            fields: BTreeMap::new(),
        }
    }

    /// Attach a user field (builder style).
    pub fn with_field(mut self, id: u32, field: UserField) -> Self {
        self.fields.insert(id, field);
        self
    }

    pub fn user_field(&self, id: u32) -> Option<&UserField> {
        self.fields.get(&id)
    }

    /// The string content of a user field, if present and textual.
    pub fn text_field(&self, id: u32) -> Option<&str> {
        match self.fields.get(&id) {
            Some(UserField::Text(s)) => Some(s),
            _ => None,
        }
    }
}

/// An ordered unit of the chain at a given height.
#[derive(Debug, Clone)]
pub struct Block {
    pub height: u64,
    pub transactions: Vec<Transaction>,
}

impl Block {
    pub fn new(height: u64) -> Self {
        Self {
            height,
            transactions: Vec::new(),
        }
    }

    pub fn with_transaction(mut self, tx: Transaction) -> Self {
        self.transactions.push(tx);
        self
    }
}

/// Stable identifier of a transaction: `(height, index within block)`.
///
/// First-seen ordering across the whole chain is lexicographic on this pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TxPosition {
    pub height: u64,
    pub index: u64,
}

impl TxPosition {
    pub fn new(height: u64, index: u64) -> Self {
        Self { height, index }
    }
}

impl fmt::Display for TxPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.height, self.index)
    }
}
