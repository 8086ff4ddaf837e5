//! Read-only query surface over the persisted index.
//!
//! Handed to the RPC/WebSocket layer; cheaply cloneable and safe to use from
//! reader threads concurrent with the indexing writer. Errors never cross
//! this boundary — a failed lookup is an absence (`None`, empty vec, 0) and
//! is logged at debug.

use tracing::debug;

use ordindex_storage::{Kv, KvStore};

use crate::counters;
use crate::keys;
use crate::names::NameRecord;
use crate::payload::PayloadMap;
use crate::tokens::TokenState;
use crate::types::Address;

/// Read-only view of the ordinal index.
#[derive(Clone)]
pub struct IndexQuery {
    store: KvStore,
}

impl IndexQuery {
    pub(crate) fn new(store: KvStore) -> Self {
        Self { store }
    }

    /// Look up a name record. Namespace and name match case-insensitively.
    pub fn cns_by_name(&self, namespace: &str, name: &str) -> Option<NameRecord> {
        let key = keys::name(&namespace.to_lowercase(), &name.to_lowercase());
        let bytes = self
            .store
            .get(&key)
            .unwrap_or_else(|e| {
                debug!(error = %e, "name lookup failed");
                None
            })?;
        match NameRecord::from_stored(&bytes) {
            Ok(record) => Some(record),
            Err(e) => {
                debug!(error = %e, namespace, name, "stored name record unreadable");
                None
            }
        }
    }

    /// `true` if the `(namespace, name)` pair has no record.
    pub fn cns_available(&self, namespace: &str, name: &str) -> bool {
        self.cns_by_name(namespace, name).is_none()
    }

    /// All names owned by `owner`, across both namespaces.
    ///
    /// Prefix-scans every name record and filters on the stored Base58 owner
    /// string; linear in the total name count.
    pub fn cns_by_owner(&self, owner: &Address) -> Vec<NameRecord> {
        let wanted = owner.to_base58();
        let mut result = Vec::new();
        let scan = self.store.scan_prefix(&[keys::NAME_PREFIX], &mut |_, value| {
            let Ok(text) = std::str::from_utf8(value) else {
                return true;
            };
            let Some(map) = PayloadMap::parse(text) else {
                return true;
            };
            if map.get("owner") == Some(wanted.as_str()) {
                if let Ok(record) = NameRecord::from_stored(value) {
                    result.push(record);
                }
            }
            true
        });
        if let Err(e) = scan {
            debug!(error = %e, "owner scan failed");
        }
        result
    }

    /// State of a deployed ticker.
    pub fn token(&self, ticker: &str) -> Option<TokenState> {
        let bytes = self
            .store
            .get(&keys::token(ticker))
            .unwrap_or_else(|e| {
                debug!(error = %e, "token lookup failed");
                None
            })?;
        match TokenState::from_stored(&bytes) {
            Ok(state) => Some(state),
            Err(e) => {
                debug!(error = %e, ticker, "stored token state unreadable");
                None
            }
        }
    }

    /// Every deployed token.
    pub fn all_tokens(&self) -> Vec<TokenState> {
        let mut result = Vec::new();
        let scan = self.store.scan_prefix(&[keys::TOKEN_PREFIX], &mut |_, value| {
            if let Ok(state) = TokenState::from_stored(value) {
                result.push(state);
            }
            true
        });
        if let Err(e) = scan {
            debug!(error = %e, "token scan failed");
        }
        result
    }

    /// Balance of `holder` in `ticker` (0 if none).
    pub fn balance(&self, holder: &Address, ticker: &str) -> i64 {
        self.store
            .get_i64(&keys::balance(holder, ticker))
            .unwrap_or_else(|e| {
                debug!(error = %e, "balance lookup failed");
                None
            })
            .unwrap_or(0)
    }

    /// Number of live name records.
    pub fn total_cns_count(&self) -> u64 {
        self.counter(counters::CNS)
    }

    /// Number of live token states.
    pub fn total_token_count(&self) -> u64 {
        self.counter(counters::TOKENS)
    }

    /// Number of indexed inscriptions (audit entries, including unknown and
    /// rejected ones).
    pub fn total_inscription_count(&self) -> u64 {
        self.counter(counters::INSCRIPTIONS)
    }

    fn counter(&self, name: &str) -> u64 {
        counters::read(&self.store, name).unwrap_or_else(|e| {
            debug!(error = %e, name, "counter read failed");
            0
        })
    }
}

impl std::fmt::Debug for IndexQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexQuery").finish_non_exhaustive()
    }
}
