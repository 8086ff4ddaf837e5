//! Inscription extraction and classification.
//!
//! A transaction carries its inscription payload in user field `1000`; a
//! handful of alternate field IDs are sniffed as fallbacks for wallets that
//! put it elsewhere. Classification is by key presence with case-insensitive
//! `p`/`op` matching. A payload that classifies but fails validation (empty
//! name, non-positive amount) keeps its kind for the audit trail and simply
//! carries no applicable action.

use tracing::debug;

use crate::payload::PayloadMap;
use crate::types::Transaction;

/// Primary user field carrying the inscription payload.
pub const PRIMARY_FIELD_ID: u32 = 1000;

/// Alternate field IDs sniffed in order when the primary field is absent or
/// not a string. The first whose string contains both `"p"` and `"op"` as
/// quoted keys wins.
pub const FALLBACK_FIELD_IDS: [u32; 7] = [0, 1, 2, 5, 10, 100, 999];

// ─── Kinds ───────────────────────────────────────────────────────────────────

/// Wire-level inscription kind (the first byte of stored metadata).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InscriptionKind {
    Unknown = 0,
    Cns = 1,
    TokenMint = 2,
    TokenDeploy = 3,
}

impl InscriptionKind {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::Unknown),
            1 => Some(Self::Cns),
            2 => Some(Self::TokenMint),
            3 => Some(Self::TokenDeploy),
            _ => None,
        }
    }
}

// ─── CNS ─────────────────────────────────────────────────────────────────────

/// A name-service operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CnsOp {
    Register,
    Update,
    Transfer,
}

impl CnsOp {
    /// Case-insensitive parse of `reg` / `upd` / `trf`.
    pub fn parse(op: &str) -> Option<Self> {
        match op.to_lowercase().as_str() {
            "reg" => Some(Self::Register),
            "upd" => Some(Self::Update),
            "trf" => Some(Self::Transfer),
            _ => None,
        }
    }

    /// The normalized form written into stored records.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Register => "reg",
            Self::Update => "upd",
            Self::Transfer => "trf",
        }
    }
}

/// A validated CNS inscription. `namespace` and `name` keep their original
/// form; keying and lookups use the normalized accessors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CnsInscription {
    pub namespace: String,
    pub op: CnsOp,
    pub name: String,
    pub relay: Option<String>,
}

impl CnsInscription {
    pub fn normalized_namespace(&self) -> String {
        self.namespace.to_lowercase()
    }

    pub fn normalized_name(&self) -> String {
        self.name.to_lowercase()
    }
}

// ─── Tokens ──────────────────────────────────────────────────────────────────

/// A validated token deployment: supply cap and per-mint limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployInscription {
    pub protocol: String,
    pub ticker: String,
    pub max_supply: i64,
    pub limit_per_mint: i64,
}

/// A validated mint against a deployed ticker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintInscription {
    pub protocol: String,
    pub ticker: String,
    pub amount: i64,
}

// ─── Envelope ────────────────────────────────────────────────────────────────

/// The state-changing operation carried by an inscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Cns(CnsInscription),
    Deploy(DeployInscription),
    Mint(MintInscription),
}

/// An inscription extracted from a transaction: its classified kind, the raw
/// payload (kept verbatim for the audit trail), and the validated action to
/// apply, if any.
#[derive(Debug, Clone)]
pub struct ParsedInscription {
    pub kind: InscriptionKind,
    pub action: Option<Action>,
    pub raw: String,
}

impl ParsedInscription {
    /// Extract an inscription from a transaction's user fields.
    ///
    /// Returns `None` when no field carries a parsable payload with both a
    /// `p` and an `op` key. Never fails: malformed payloads are dropped.
    pub fn from_transaction(tx: &Transaction) -> Option<Self> {
        let raw = payload_string(tx)?;
        if raw.is_empty() {
            return None;
        }
        let Some(map) = PayloadMap::parse(raw) else {
            debug!(payload = raw, "Dropping unparsable inscription payload");
            return None;
        };
        let (p, op) = match (map.get("p"), map.get("op")) {
            (Some(p), Some(op)) => (p.to_lowercase(), op.to_lowercase()),
            _ => return None,
        };

        let kind = classify(&map, &p, &op);
        let action = match kind {
            InscriptionKind::Cns => parse_cns(&map).map(Action::Cns),
            InscriptionKind::TokenMint => parse_mint(&map).map(Action::Mint),
            InscriptionKind::TokenDeploy => parse_deploy(&map).map(Action::Deploy),
            InscriptionKind::Unknown => None,
        };
        if action.is_none() && kind != InscriptionKind::Unknown {
            debug!(payload = raw, "Inscription classified but failed validation");
        }

        Some(Self {
            kind,
            action,
            raw: raw.to_string(),
        })
    }
}

fn payload_string(tx: &Transaction) -> Option<&str> {
    if let Some(s) = tx.text_field(PRIMARY_FIELD_ID) {
        return Some(s);
    }
    FALLBACK_FIELD_IDS.iter().find_map(|&id| {
        tx.text_field(id)
            .filter(|s| s.contains("\"p\"") && s.contains("\"op\""))
    })
}

fn classify(map: &PayloadMap, p: &str, op: &str) -> InscriptionKind {
    if map.contains("cns")
        && (p == "cdns" || p == "cns")
        && matches!(op, "reg" | "upd" | "trf")
    {
        InscriptionKind::Cns
    } else if map.contains("tick") && map.contains("amt") && op == "mint" {
        InscriptionKind::TokenMint
    } else if map.contains("tick") && map.contains("max") && map.contains("lim") && op == "deploy" {
        InscriptionKind::TokenDeploy
    } else {
        InscriptionKind::Unknown
    }
}

fn parse_cns(map: &PayloadMap) -> Option<CnsInscription> {
    let namespace = map.get("p")?.to_string();
    let op = CnsOp::parse(map.get("op")?)?;
    let name = map.get("cns")?.to_string();
    // A name must be non-empty and contain no space. (UTF-8 validity is
    // inherent: the payload arrived as a string.)
    if namespace.is_empty() || name.is_empty() || name.contains(' ') {
        return None;
    }
    Some(CnsInscription {
        namespace,
        op,
        name,
        relay: map.get("relay").map(str::to_string),
    })
}

fn parse_mint(map: &PayloadMap) -> Option<MintInscription> {
    let protocol = map.get("p")?.to_string();
    let ticker = map.get("tick")?.to_string();
    let amount = map.get_i64("amt")?;
    if protocol.is_empty() || ticker.is_empty() || amount <= 0 {
        return None;
    }
    Some(MintInscription {
        protocol,
        ticker,
        amount,
    })
}

fn parse_deploy(map: &PayloadMap) -> Option<DeployInscription> {
    let protocol = map.get("p")?.to_string();
    let ticker = map.get("tick")?.to_string();
    let max_supply = map.get_i64("max")?;
    let limit_per_mint = map.get_i64("lim")?;
    if protocol.is_empty() || ticker.is_empty() || max_supply <= 0 || limit_per_mint <= 0 {
        return None;
    }
    Some(DeployInscription {
        protocol,
        ticker,
        max_supply,
        limit_per_mint,
    })
}
