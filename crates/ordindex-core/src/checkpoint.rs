//! Checkpoint file — persists the last fully indexed height for crash
//! recovery.
//!
//! A single `u64` in native byte order, memory-mapped from an 8-byte file.
//! The all-ones sentinel marks the index as invalidated; the next start then
//! rebuilds from height 0. If this file cannot be opened or mapped the
//! indexer refuses to start.

use std::fs::OpenOptions;
use std::io;
use std::path::Path;

use memmap2::MmapMut;
use tracing::warn;

/// Sentinel meaning "invalidated — rebuild".
pub const WRONG_SEQUENCE: u64 = u64::MAX;

/// File basename used for the ordinal index checkpoint.
pub const CHECKPOINT_FILE: &str = "ordinal_last_indexed";

/// The memory-mapped checkpoint record.
pub struct CheckpointFile {
    map: MmapMut,
}

impl CheckpointFile {
    /// Open (creating if necessary) and map the checkpoint file.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        file.set_len(std::mem::size_of::<u64>() as u64)?;
        let map = unsafe { MmapMut::map_mut(&file)? };
        Ok(Self { map })
    }

    /// Probe an existing checkpoint file without creating one.
    /// `None` if the file is missing or not exactly 8 bytes.
    pub fn peek(path: impl AsRef<Path>) -> Option<u64> {
        let bytes = std::fs::read(path).ok()?;
        let arr: [u8; 8] = bytes.as_slice().try_into().ok()?;
        Some(u64::from_ne_bytes(arr))
    }

    pub fn get(&self) -> u64 {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&self.map[..8]);
        u64::from_ne_bytes(buf)
    }

    /// Write and flush a new height.
    pub fn set(&mut self, height: u64) {
        self.map[..8].copy_from_slice(&height.to_ne_bytes());
        if let Err(e) = self.map.flush() {
            warn!(error = %e, "Failed to flush checkpoint file");
        }
    }
}

impl std::fmt::Debug for CheckpointFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckpointFile").field("height", &self.get()).finish()
    }
}
