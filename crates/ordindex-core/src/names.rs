//! CNS / CDNS name-service state machine.
//!
//! Three operations over `(namespace, name)` records:
//! - `reg` — first registration wins; later attempts are silently rejected.
//! - `upd` — owner-only overwrite of the relay field.
//! - `trf` — owner-only transfer; the new owner is the *transaction target*,
//!   not anything carried in the payload.
//!
//! Rejections never surface to the driver; the block continues.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use ordindex_storage::Kv;

use crate::error::{IndexError, Result};
use crate::inscription::{CnsInscription, CnsOp};
use crate::keys;
use crate::notify::{self, NotificationSink};
use crate::payload::PayloadMap;
use crate::types::{Address, Transaction, TxPosition};
use crate::undo::Undo;

/// A persisted name record.
///
/// `registered_at` is fixed at creation; only `owner`, `relay` and the
/// last-applied `op` change afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameRecord {
    pub namespace: String,
    pub name: String,
    /// Last applied operation (`reg`, `upd` or `trf`).
    pub op: String,
    pub owner: Address,
    pub relay: String,
    pub registered_at: TxPosition,
}

impl NameRecord {
    /// Stored form: a flat JSON object with the keys
    /// `p`, `op`, `cns`, `relay`, `owner`, `block`, `txIndex`.
    pub fn to_stored_json(&self) -> String {
        let mut map = PayloadMap::new();
        map.insert("p", self.namespace.clone())
            .insert("op", self.op.clone())
            .insert("cns", self.name.clone())
            .insert("relay", self.relay.clone())
            .insert("owner", self.owner.to_base58())
            .insert("block", self.registered_at.height.to_string())
            .insert("txIndex", self.registered_at.index.to_string());
        map.to_json()
    }

    pub fn from_stored(bytes: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(bytes)
            .map_err(|_| IndexError::InvalidRecord("name record is not UTF-8".into()))?;
        let map = PayloadMap::parse(text)
            .ok_or_else(|| IndexError::InvalidRecord("name record is not a flat object".into()))?;
        let field = |key: &str| {
            map.get(key)
                .map(str::to_string)
                .ok_or_else(|| IndexError::InvalidRecord(format!("name record missing '{key}'")))
        };
        let owner = Address::from_base58(&field("owner")?)
            .ok_or_else(|| IndexError::InvalidRecord("name record owner is not Base58".into()))?;
        let number = |key: &str| {
            map.get_i64(key)
                .filter(|n| *n >= 0)
                .map(|n| n as u64)
                .ok_or_else(|| IndexError::InvalidRecord(format!("name record bad '{key}'")))
        };
        Ok(Self {
            namespace: field("p")?,
            name: field("cns")?,
            op: map.get_or("op", "reg").to_string(),
            owner,
            relay: map.get_or("relay", "").to_string(),
            registered_at: TxPosition::new(number("block")?, number("txIndex")?),
        })
    }
}

/// Applies name-service inscriptions against the store.
///
/// During a rebuild the registry keeps a write-through cache over the
/// records it has written, consulted before the store; live operation reads
/// the store directly.
#[derive(Debug, Default)]
pub struct NameRegistry {
    cache: Option<HashMap<(String, String), NameRecord>>,
}

impl NameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_rebuild(&mut self) {
        self.cache = Some(HashMap::new());
    }

    pub fn end_rebuild(&mut self) {
        self.cache = None;
    }

    /// Drop cached entries (kept enabled). Called after a rollback, whose
    /// reverts bypass the cache.
    pub fn invalidate_cache(&mut self) {
        if let Some(cache) = &mut self.cache {
            cache.clear();
        }
    }

    /// Apply one CNS inscription. Returns the undo record when state
    /// changed, `None` on a (silent) policy rejection.
    pub fn apply(
        &mut self,
        kv: &mut dyn Kv,
        cns: &CnsInscription,
        tx: &Transaction,
        pos: TxPosition,
        sink: &NotificationSink,
    ) -> Result<Option<Undo>> {
        let namespace = cns.normalized_namespace();
        let name = cns.normalized_name();

        match cns.op {
            CnsOp::Register => self.register(kv, cns, &namespace, &name, tx.source, pos, sink),
            CnsOp::Update => self.update(kv, cns, &namespace, &name, tx.source, pos, sink),
            CnsOp::Transfer => self.transfer(kv, &namespace, &name, tx, pos, sink),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn register(
        &mut self,
        kv: &mut dyn Kv,
        cns: &CnsInscription,
        namespace: &str,
        name: &str,
        sender: Address,
        pos: TxPosition,
        sink: &NotificationSink,
    ) -> Result<Option<Undo>> {
        if self.load(kv, namespace, name)?.is_some() {
            info!(namespace, name, "Name already registered; first registration wins");
            return Ok(None);
        }
        let record = NameRecord {
            namespace: namespace.to_string(),
            name: name.to_string(),
            op: CnsOp::Register.as_str().to_string(),
            owner: sender,
            relay: cns.relay.clone().unwrap_or_default(),
            registered_at: pos,
        };
        self.store(kv, record, notify::CNS_REGISTRATION, pos, sink)?;
        Ok(Some(Undo::RemoveName {
            namespace: namespace.to_string(),
            name: name.to_string(),
        }))
    }

    #[allow(clippy::too_many_arguments)]
    fn update(
        &mut self,
        kv: &mut dyn Kv,
        cns: &CnsInscription,
        namespace: &str,
        name: &str,
        sender: Address,
        pos: TxPosition,
        sink: &NotificationSink,
    ) -> Result<Option<Undo>> {
        let Some(mut record) = self.load(kv, namespace, name)? else {
            info!(namespace, name, "Name not found; update ignored");
            return Ok(None);
        };
        if record.owner != sender {
            info!(namespace, name, "Update rejected: sender is not the owner");
            return Ok(None);
        }
        let prior = record.to_stored_json().into_bytes();
        record.relay = cns.relay.clone().unwrap_or_default();
        record.op = CnsOp::Update.as_str().to_string();
        self.store(kv, record, notify::CNS_UPDATE, pos, sink)?;
        Ok(Some(Undo::RestoreName {
            namespace: namespace.to_string(),
            name: name.to_string(),
            prior,
        }))
    }

    fn transfer(
        &mut self,
        kv: &mut dyn Kv,
        namespace: &str,
        name: &str,
        tx: &Transaction,
        pos: TxPosition,
        sink: &NotificationSink,
    ) -> Result<Option<Undo>> {
        let Some(mut record) = self.load(kv, namespace, name)? else {
            info!(namespace, name, "Name not found; transfer ignored");
            return Ok(None);
        };
        if record.owner != tx.source {
            info!(namespace, name, "Transfer rejected: sender is not the owner");
            return Ok(None);
        }
        let prior = record.to_stored_json().into_bytes();
        // Ownership moves to the transaction's target address.
        record.owner = tx.target;
        record.op = CnsOp::Transfer.as_str().to_string();
        self.store(kv, record, notify::CNS_TRANSFER, pos, sink)?;
        Ok(Some(Undo::RestoreName {
            namespace: namespace.to_string(),
            name: name.to_string(),
            prior,
        }))
    }

    fn store(
        &mut self,
        kv: &mut dyn Kv,
        record: NameRecord,
        event: &'static str,
        pos: TxPosition,
        sink: &NotificationSink,
    ) -> Result<()> {
        let key = keys::name(&record.namespace, &record.name);
        let stored = record.to_stored_json();
        kv.put(&key, stored.as_bytes())?;
        debug!(key = %hex::encode(&key), event, "Stored name record");
        if let Some(cache) = &mut self.cache {
            cache.insert((record.namespace.clone(), record.name.clone()), record);
        }
        sink.emit(event, &stored, pos.height, pos.index);
        Ok(())
    }

    fn load(&self, kv: &dyn Kv, namespace: &str, name: &str) -> Result<Option<NameRecord>> {
        if let Some(cache) = &self.cache {
            if let Some(record) = cache.get(&(namespace.to_string(), name.to_string())) {
                return Ok(Some(record.clone()));
            }
        }
        match kv.get(&keys::name(namespace, name))? {
            None => Ok(None),
            Some(bytes) => NameRecord::from_stored(&bytes).map(Some),
        }
    }
}
