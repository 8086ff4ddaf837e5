//! The indexer driver — cold-start replay, live block application, reorg
//! rollback. Owns the checkpoint.
//!
//! # Lifecycle
//!
//! ```text
//! open
//!   └─ on_start_read_from_db(last_written)    decide resume vs rebuild
//!        └─ on_read_from_db(block)*           cold replay, gated on checkpoint
//!             └─ on_db_read_finished()        discard rebuild caches, persist
//! update(block)*                              live appends
//! on_remove_block(block)*                     reorg rollback (one block each)
//! invalidate()                                force rebuild on next start
//! ```
//!
//! Each inscription is applied in its own write transaction together with
//! its undo record, counters, and metadata entry; an existing metadata entry
//! at the same `(height, tx_index)` short-circuits the whole inscription, so
//! replaying a partially applied block never double-applies anything.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use ordindex_storage::{Kv, KvStore};

use crate::checkpoint::{CheckpointFile, CHECKPOINT_FILE, WRONG_SEQUENCE};
use crate::counters;
use crate::error::{IndexError, Result};
use crate::inscription::{Action, ParsedInscription};
use crate::keys;
use crate::meta::InscriptionMeta;
use crate::names::NameRegistry;
use crate::notify::NotificationSink;
use crate::query::IndexQuery;
use crate::tokens::TokenLedger;
use crate::types::{Block, Transaction, TxPosition};
use crate::undo::Undo;

/// Directory basename of the index database inside the data dir.
pub const DB_DIR: &str = "ordinaldb";

/// Cadence of the informational progress line during long replays.
const PROGRESS_LOG_INTERVAL: u64 = 100_000;

/// Configuration for an ordinal index instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexerConfig {
    /// Directory holding the database (`ordinaldb/`) and the checkpoint
    /// file (`ordinal_last_indexed`).
    pub data_dir: PathBuf,
    /// Wipe and rebuild on start regardless of checkpoint state.
    #[serde(default)]
    pub force_rebuild: bool,
}

impl IndexerConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            force_rebuild: false,
        }
    }

    pub fn db_dir(&self) -> PathBuf {
        self.data_dir.join(DB_DIR)
    }

    pub fn checkpoint_path(&self) -> PathBuf {
        self.data_dir.join(CHECKPOINT_FILE)
    }
}

/// The block-driven ordinal index.
pub struct OrdinalIndexer {
    config: IndexerConfig,
    store: KvStore,
    checkpoint: CheckpointFile,
    /// In-memory mirror of the checkpoint file.
    last_indexed: u64,
    rebuild: bool,
    names: NameRegistry,
    tokens: TokenLedger,
    notify: NotificationSink,
}

impl OrdinalIndexer {
    /// Open the index. Fails only on checkpoint-file or store-open trouble;
    /// a missing or invalidated checkpoint schedules a rebuild instead.
    pub fn open(config: IndexerConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;

        let checkpoint_path = config.checkpoint_path();
        let mut rebuild = config.force_rebuild;
        let mut last_indexed = 0;
        match CheckpointFile::peek(&checkpoint_path) {
            None => rebuild = true,
            Some(WRONG_SEQUENCE) => rebuild = true,
            Some(height) => last_indexed = height,
        }
        if rebuild {
            last_indexed = 0;
        }

        let mut checkpoint = CheckpointFile::open(&checkpoint_path)?;
        checkpoint.set(last_indexed);

        let store = KvStore::open(config.db_dir())?;
        store.set_failure_hook(|e| error!(error = %e, "Ordinal index store failure"));

        let mut names = NameRegistry::new();
        let mut tokens = TokenLedger::new();
        if rebuild {
            names.begin_rebuild();
            tokens.begin_rebuild();
        }

        info!(
            data_dir = %config.data_dir.display(),
            rebuild,
            last_indexed,
            "Ordinal index opened"
        );
        Ok(Self {
            config,
            store,
            checkpoint,
            last_indexed,
            rebuild,
            names,
            tokens,
            notify: NotificationSink::new(),
        })
    }

    /// Register the notification callback (once, at startup).
    pub fn set_notification_callback(
        &mut self,
        callback: impl Fn(&str, &str, u64, u64) + Send + Sync + 'static,
    ) {
        self.notify.set_callback(callback);
    }

    /// A cloneable read-only view for the RPC/WebSocket layer.
    pub fn query_handle(&self) -> IndexQuery {
        IndexQuery::new(self.store.clone())
    }

    /// Height of the last fully indexed block.
    pub fn last_indexed(&self) -> u64 {
        self.last_indexed
    }

    /// `true` while a full rebuild replay is in progress.
    pub fn rebuilding(&self) -> bool {
        self.rebuild
    }

    // ─── Block store callbacks ───────────────────────────────────────────────

    /// Called once at startup with the store's last written height; decides
    /// between incremental resume and full rebuild.
    pub fn on_start_read_from_db(&mut self, last_written: u64) {
        info!(
            last_indexed = self.last_indexed,
            last_written,
            rebuild = self.rebuild,
            "Ordinal index: chain replay starting"
        );
        if self.rebuild {
            return;
        }
        if self.last_indexed == WRONG_SEQUENCE || self.last_indexed > last_written {
            warn!(
                last_indexed = self.last_indexed,
                last_written,
                "Checkpoint invalid or ahead of block store; scheduling rebuild"
            );
            self.start_rebuild();
        } else {
            info!(
                from = self.last_indexed + 1,
                to = last_written,
                "Resuming incremental indexing"
            );
        }
    }

    /// Called for each block during cold replay, in order.
    pub fn on_read_from_db(&mut self, block: &Block) {
        if block.height == 0 && self.rebuild {
            self.reset();
        }
        if self.rebuild || block.height > self.last_indexed {
            self.apply_block(block);
        }
    }

    /// Called once when cold replay ends.
    pub fn on_db_read_finished(&mut self) {
        if self.rebuild {
            self.rebuild = false;
            self.names.end_rebuild();
            self.tokens.end_rebuild();
            info!(
                last_indexed = self.last_indexed,
                "Rebuilt ordinal index; keeping it current from new blocks"
            );
        }
        self.checkpoint.set(self.last_indexed);
        let query = self.query_handle();
        info!(
            last_indexed = self.last_indexed,
            cns = query.total_cns_count(),
            tokens = query.total_token_count(),
            inscriptions = query.total_inscription_count(),
            "Ordinal index replay finished"
        );
    }

    /// Apply a newly appended block (live operation).
    pub fn update(&mut self, block: &Block) {
        self.apply_block(block);
    }

    /// Reverse-apply a block being rolled back and rewind the checkpoint by
    /// exactly one.
    pub fn on_remove_block(&mut self, block: &Block) {
        info!(height = block.height, "Rolling back block");
        let store = self.store.clone();
        let result: Result<()> = store.batch(|kv| {
            // Undo entries for the height, newest transaction first.
            let mut undos: Vec<(u64, Vec<u8>)> = Vec::new();
            kv.scan_prefix(&keys::undo_prefix(block.height), &mut |key, value| {
                if let Some(index) = keys::tx_index_of(key) {
                    undos.push((index, value.to_vec()));
                }
                true
            })?;
            undos.sort_by(|a, b| b.0.cmp(&a.0));
            for (index, bytes) in &undos {
                let undo = Undo::decode(bytes)?;
                undo.revert(kv)?;
                let (names_delta, tokens_delta) = undo.applied_counter_delta();
                counters::add(kv, counters::CNS, -names_delta)?;
                counters::add(kv, counters::TOKENS, -tokens_delta)?;
                kv.remove(&keys::undo(block.height, *index))?;
                debug!(height = block.height, index, "Reverted inscription");
            }

            // Audit entries for the height — also covers unknown and rejected
            // inscriptions, which have no undo record.
            let mut metas: Vec<u64> = Vec::new();
            kv.scan_prefix(&keys::meta_prefix(block.height), &mut |key, _| {
                if let Some(index) = keys::tx_index_of(key) {
                    metas.push(index);
                }
                true
            })?;
            for index in &metas {
                kv.remove(&keys::meta(block.height, *index))?;
            }
            counters::add(kv, counters::INSCRIPTIONS, -(metas.len() as i64))?;
            Ok(())
        });

        match result {
            Ok(()) => {
                // Reverts bypass the rebuild caches; drop any stale entries.
                self.names.invalidate_cache();
                self.tokens.invalidate_cache();
                self.last_indexed = self.last_indexed.saturating_sub(1);
                self.checkpoint.set(self.last_indexed);
            }
            Err(e) => {
                // Leave the checkpoint where it is: it now runs ahead of the
                // block store, which forces a rebuild on the next start.
                error!(
                    height = block.height,
                    error = %e,
                    "Rollback failed; index will rebuild on next start"
                );
            }
        }
    }

    /// Mark the index invalid; the next start rebuilds from height 0.
    pub fn invalidate(&mut self) {
        warn!("Invalidating ordinal index; next start will rebuild");
        self.last_indexed = WRONG_SEQUENCE;
        self.checkpoint.set(WRONG_SEQUENCE);
    }

    /// Close the underlying store.
    pub fn close(&self) {
        self.store.close();
    }

    // ─── Application ─────────────────────────────────────────────────────────

    fn start_rebuild(&mut self) {
        self.rebuild = true;
        self.last_indexed = 0;
        self.checkpoint.set(0);
        self.names.begin_rebuild();
        self.tokens.begin_rebuild();
    }

    /// Wipe the store at the first replayed block of a rebuild.
    fn reset(&mut self) {
        info!("Wiping ordinal index for rebuild");
        if let Err(e) = self.store.clear() {
            error!(error = %e, "Failed to wipe store before rebuild");
        }
        self.names.begin_rebuild();
        self.tokens.begin_rebuild();
    }

    /// Apply every transaction of a block, then advance the checkpoint.
    ///
    /// Never returns an error: parse failures and policy rejections are
    /// silent, per-transaction failures are logged and isolated. Only a
    /// storage failure holds the checkpoint back, leaving the block eligible
    /// for re-replay after restart.
    fn apply_block(&mut self, block: &Block) {
        let mut storage_clean = true;
        for (index, tx) in block.transactions.iter().enumerate() {
            let pos = TxPosition::new(block.height, index as u64);
            match self.apply_transaction(tx, pos) {
                Ok(()) => {}
                Err(e) if e.is_storage() => {
                    error!(position = %pos, error = %e, "Storage failure while applying inscription");
                    storage_clean = false;
                }
                Err(e) => {
                    // Per-transaction isolation: the rest of the block still
                    // gets processed.
                    error!(position = %pos, error = %e, "Failed to apply inscription");
                }
            }
        }

        if !storage_clean {
            warn!(
                height = block.height,
                "Checkpoint held back; block will be replayed after restart"
            );
            return;
        }

        self.last_indexed = block.height;
        self.checkpoint.set(self.last_indexed);

        if block.height > 0 && block.height % PROGRESS_LOG_INTERVAL == 0 {
            let indexed = counters::read(&self.store, counters::INSCRIPTIONS).unwrap_or(0);
            info!(height = block.height, inscriptions = indexed, "Ordinal index progress");
        }
    }

    fn apply_transaction(&mut self, tx: &Transaction, pos: TxPosition) -> Result<()> {
        let Some(parsed) = ParsedInscription::from_transaction(tx) else {
            return Ok(());
        };
        debug!(position = %pos, kind = ?parsed.kind, "Applying inscription");

        match self.apply_parsed(tx, &parsed, pos) {
            Err(IndexError::Storage(e)) if e.is_closed() => {
                // One lazy reinit, then a single retry.
                self.store.reopen().map_err(IndexError::from)?;
                self.apply_parsed(tx, &parsed, pos)
            }
            other => other,
        }
    }

    /// One inscription, one write transaction: state change + undo record +
    /// counters + metadata, all or nothing.
    fn apply_parsed(&mut self, tx: &Transaction, parsed: &ParsedInscription, pos: TxPosition) -> Result<()> {
        let store = self.store.clone();
        let names = &mut self.names;
        let tokens = &mut self.tokens;
        let sink = &self.notify;

        store.batch(|kv| {
            let meta_key = keys::meta(pos.height, pos.index);
            if kv.exists(&meta_key)? {
                debug!(position = %pos, "Inscription already indexed; skipping replay");
                return Ok(());
            }

            let undo = match &parsed.action {
                Some(Action::Cns(cns)) => names.apply(kv, cns, tx, pos, sink)?,
                Some(Action::Deploy(deploy)) => {
                    tokens.apply_deploy(kv, deploy, &tx.source, pos, sink)?
                }
                Some(Action::Mint(mint)) => tokens.apply_mint(kv, mint, &tx.source, pos, sink)?,
                None => None,
            };

            if let Some(undo) = &undo {
                let (names_delta, tokens_delta) = undo.applied_counter_delta();
                counters::add(kv, counters::CNS, names_delta)?;
                counters::add(kv, counters::TOKENS, tokens_delta)?;
                kv.put(&keys::undo(pos.height, pos.index), &undo.encode())?;
            }

            let meta = InscriptionMeta {
                kind: parsed.kind,
                height: pos.height,
                tx_index: pos.index,
                source: tx.source,
                payload: parsed.raw.clone(),
            };
            kv.put(&meta_key, &meta.encode())?;
            counters::add(kv, counters::INSCRIPTIONS, 1)?;
            Ok(())
        })
    }
}

impl std::fmt::Debug for OrdinalIndexer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrdinalIndexer")
            .field("data_dir", &self.config.data_dir)
            .field("last_indexed", &self.last_indexed)
            .field("rebuild", &self.rebuild)
            .finish()
    }
}
