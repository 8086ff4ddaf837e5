//! Fungible-token ledger over inscriptions.
//!
//! A `deploy` creates a ticker with a supply cap and a per-mint limit; a
//! `mint` accrues balance for the minter if and only if it respects both.
//! Rejected mints change nothing. `total_minted` and the per-holder
//! balances stay consistent: every accepted mint adjusts both in the same
//! write transaction.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use ordindex_storage::Kv;

use crate::error::{IndexError, Result};
use crate::inscription::{DeployInscription, MintInscription};
use crate::keys;
use crate::notify::{self, NotificationSink};
use crate::payload::PayloadMap;
use crate::types::{Address, TxPosition};
use crate::undo::Undo;

/// Persisted state of one deployed ticker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenState {
    pub ticker: String,
    pub max_supply: i64,
    pub limit_per_mint: i64,
    pub total_minted: i64,
    pub deploy_block: u64,
    pub deployer: Address,
}

impl TokenState {
    /// Stored form: flat JSON with the keys `ticker`, `maxSupply`,
    /// `limitPerMint`, `totalMinted`, `deployBlock`, `deployer`.
    pub fn to_stored_json(&self) -> String {
        let mut map = PayloadMap::new();
        map.insert("ticker", self.ticker.clone())
            .insert("maxSupply", self.max_supply.to_string())
            .insert("limitPerMint", self.limit_per_mint.to_string())
            .insert("totalMinted", self.total_minted.to_string())
            .insert("deployBlock", self.deploy_block.to_string())
            .insert("deployer", self.deployer.to_base58());
        map.to_json()
    }

    pub fn from_stored(bytes: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(bytes)
            .map_err(|_| IndexError::InvalidRecord("token state is not UTF-8".into()))?;
        let map = PayloadMap::parse(text)
            .ok_or_else(|| IndexError::InvalidRecord("token state is not a flat object".into()))?;
        let ticker = map
            .get("ticker")
            .ok_or_else(|| IndexError::InvalidRecord("token state missing 'ticker'".into()))?
            .to_string();
        let number = |key: &str| {
            map.get_i64(key)
                .ok_or_else(|| IndexError::InvalidRecord(format!("token state bad '{key}'")))
        };
        let deployer = Address::from_base58(map.get_or("deployer", ""))
            .ok_or_else(|| IndexError::InvalidRecord("token state deployer is not Base58".into()))?;
        Ok(Self {
            ticker,
            max_supply: number("maxSupply")?,
            limit_per_mint: number("limitPerMint")?,
            total_minted: number("totalMinted")?,
            deploy_block: number("deployBlock")?.max(0) as u64,
            deployer,
        })
    }
}

/// Applies token inscriptions against the store.
#[derive(Debug, Default)]
pub struct TokenLedger {
    token_cache: Option<HashMap<String, TokenState>>,
    balance_cache: Option<HashMap<(Address, String), i64>>,
}

impl TokenLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_rebuild(&mut self) {
        self.token_cache = Some(HashMap::new());
        self.balance_cache = Some(HashMap::new());
    }

    pub fn end_rebuild(&mut self) {
        self.token_cache = None;
        self.balance_cache = None;
    }

    /// Drop cached entries (kept enabled). Called after a rollback, whose
    /// reverts bypass the caches.
    pub fn invalidate_cache(&mut self) {
        if let Some(cache) = &mut self.token_cache {
            cache.clear();
        }
        if let Some(cache) = &mut self.balance_cache {
            cache.clear();
        }
    }

    /// Apply a deployment. First deployment of a ticker wins.
    pub fn apply_deploy(
        &mut self,
        kv: &mut dyn Kv,
        deploy: &DeployInscription,
        deployer: &Address,
        pos: TxPosition,
        sink: &NotificationSink,
    ) -> Result<Option<Undo>> {
        if self.load_token(kv, &deploy.ticker)?.is_some() {
            info!(ticker = %deploy.ticker, "Token already deployed; first deployment wins");
            return Ok(None);
        }
        let state = TokenState {
            ticker: deploy.ticker.clone(),
            max_supply: deploy.max_supply,
            limit_per_mint: deploy.limit_per_mint,
            total_minted: 0,
            deploy_block: pos.height,
            deployer: *deployer,
        };
        let stored = self.store_token(kv, state)?;
        sink.emit(notify::TOKEN_DEPLOY, &stored, pos.height, pos.index);
        Ok(Some(Undo::RemoveToken {
            ticker: deploy.ticker.clone(),
        }))
    }

    /// Apply a mint: requires a deployed ticker, an amount within the
    /// per-mint limit, and headroom under the supply cap.
    pub fn apply_mint(
        &mut self,
        kv: &mut dyn Kv,
        mint: &MintInscription,
        minter: &Address,
        pos: TxPosition,
        sink: &NotificationSink,
    ) -> Result<Option<Undo>> {
        let Some(mut state) = self.load_token(kv, &mint.ticker)? else {
            info!(ticker = %mint.ticker, "Mint rejected: token not deployed");
            return Ok(None);
        };
        if mint.amount > state.limit_per_mint {
            info!(
                ticker = %mint.ticker,
                amount = mint.amount,
                limit = state.limit_per_mint,
                "Mint rejected: exceeds per-mint limit"
            );
            return Ok(None);
        }
        let minted = match state.total_minted.checked_add(mint.amount) {
            Some(total) if total <= state.max_supply => total,
            _ => {
                info!(
                    ticker = %mint.ticker,
                    amount = mint.amount,
                    minted = state.total_minted,
                    max = state.max_supply,
                    "Mint rejected: exceeds max supply"
                );
                return Ok(None);
            }
        };

        let prior_state = state.to_stored_json().into_bytes();
        let prior_balance = self.load_balance(kv, minter, &mint.ticker)?;

        state.total_minted = minted;
        let stored = self.store_token(kv, state)?;

        let balance = prior_balance.unwrap_or(0).saturating_add(mint.amount);
        kv.put(&keys::balance(minter, &mint.ticker), &balance.to_le_bytes())?;
        if let Some(cache) = &mut self.balance_cache {
            cache.insert((*minter, mint.ticker.clone()), balance);
        }

        sink.emit(notify::TOKEN_MINT, &stored, pos.height, pos.index);
        Ok(Some(Undo::RestoreMint {
            ticker: mint.ticker.clone(),
            holder: *minter,
            prior_state,
            prior_balance,
        }))
    }

    fn store_token(&mut self, kv: &mut dyn Kv, state: TokenState) -> Result<String> {
        let stored = state.to_stored_json();
        kv.put(&keys::token(&state.ticker), stored.as_bytes())?;
        if let Some(cache) = &mut self.token_cache {
            cache.insert(state.ticker.clone(), state);
        }
        Ok(stored)
    }

    fn load_token(&self, kv: &dyn Kv, ticker: &str) -> Result<Option<TokenState>> {
        if let Some(cache) = &self.token_cache {
            if let Some(state) = cache.get(ticker) {
                return Ok(Some(state.clone()));
            }
        }
        match kv.get(&keys::token(ticker))? {
            None => Ok(None),
            Some(bytes) => TokenState::from_stored(&bytes).map(Some),
        }
    }

    fn load_balance(&self, kv: &dyn Kv, holder: &Address, ticker: &str) -> Result<Option<i64>> {
        if let Some(cache) = &self.balance_cache {
            if let Some(balance) = cache.get(&(*holder, ticker.to_string())) {
                return Ok(Some(*balance));
            }
        }
        Ok(kv.get_i64(&keys::balance(holder, ticker))?)
    }
}
