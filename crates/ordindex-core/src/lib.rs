//! ordindex-core — the block-driven ordinal / name-service index.
//!
//! Transforms a sequenced stream of blocks into a durable, queryable,
//! reorg-safe secondary index of JSON-encoded inscriptions: CNS/CDNS name
//! registrations and fungible-token deploys and mints.
//!
//! # Architecture
//!
//! ```text
//! OrdinalIndexer (driver, owns the checkpoint)
//!     ├── ParsedInscription  (payload sniffing + classification)
//!     ├── NameRegistry       (reg / upd / trf, first-seen + ownership)
//!     ├── TokenLedger        (deploy / mint, supply + per-mint caps)
//!     ├── Undo log           (exact per-inscription inversion for reorgs)
//!     ├── CheckpointFile     (memory-mapped last-indexed height)
//!     ├── NotificationSink   (single-callback event fan-out)
//!     └── KvStore            (ordered byte-key persistence, ordindex-storage)
//! IndexQuery (read-only surface for the RPC/WebSocket layer)
//! ```

pub mod checkpoint;
pub mod counters;
pub mod error;
pub mod indexer;
pub mod inscription;
pub mod keys;
pub mod meta;
pub mod names;
pub mod notify;
pub mod payload;
pub mod query;
pub mod tokens;
pub mod types;
pub mod undo;

pub use checkpoint::{CheckpointFile, WRONG_SEQUENCE};
pub use error::{IndexError, Result};
pub use indexer::{IndexerConfig, OrdinalIndexer};
pub use inscription::{CnsInscription, CnsOp, InscriptionKind, ParsedInscription};
pub use meta::InscriptionMeta;
pub use names::{NameRecord, NameRegistry};
pub use notify::NotificationSink;
pub use query::IndexQuery;
pub use tokens::{TokenLedger, TokenState};
pub use types::{Address, Block, Transaction, TxPosition, UserField};
