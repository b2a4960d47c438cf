//! # Engine — riptide-segments storage engine
//!
//! The central orchestrator tying together the [`memtable`] write buffer and
//! the on-disk [`segment`] log into a complete key-value store.
//!
//! ## Architecture
//!
//! ```text
//! Client
//!   |
//!   v
//! ┌───────────────────────────────────────────────┐
//! │                   ENGINE                      │
//! │                                               │
//! │ write.rs → segment append + fsync             │
//! │              |                                │
//! │              v                                │
//! │           memtable insert                     │
//! │              |                                │
//! │              |  (byte budget exceeded?)       │
//! │              v                                │
//! │           flush() → new segment(s)            │
//! │                                               │
//! │ read.rs  → memtable → segments newest→oldest   │
//! │            (first hit wins)                   │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! Unlike a multi-level LSM tree, there is no compaction here: segments are
//! never merged, rewritten, or deleted by the engine. Duplicate and
//! tombstoned records accumulate across segments and are resolved purely by
//! read-time shadowing (newest segment wins).
//!
//! ## Module responsibilities
//!
//! | Module         | Purpose                                               |
//! |----------------|--------------------------------------------------------|
//! | [`lib.rs`]     | `Engine` struct, constructor, `Debug`                  |
//! | [`segment_set`]| Segment discovery, ordering, rolling                   |
//! | [`write`]      | `put`, `delete`, `batch_put`, internal `flush`         |
//! | [`read`]       | `read`, `read_range`                                   |
//!
//! ## Crash safety
//!
//! Every `put` appends to the current segment and `fsync`s it *before* the
//! memtable is updated, so the memtable never holds data that is not already
//! durable. On restart, the memtable always starts empty -- there is nothing
//! to replay, since every acknowledged write already lives on disk in a
//! segment.

mod error;
mod read;
mod segment_set;
mod write;

pub use error::EngineError;

use memtable::Memtable;
use segment_set::SegmentSet;
use std::io;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use config::EngineConfig;

struct EngineState {
    memtable: Memtable,
    segments: SegmentSet,
    closed: bool,
}

/// The central storage engine orchestrating the memtable and segment set.
///
/// # Write path
///
/// 1. Append the record to the current segment, fsyncing before returning
///    (retrying once against a freshly-rolled segment if the current one is
///    full).
/// 2. Apply the mutation to the in-memory memtable.
/// 3. If the memtable's approximate byte size has reached the configured
///    budget, flush it into fresh segment(s).
///
/// # Read path
///
/// 1. Check the memtable (freshest data, includes tombstones).
/// 2. Check segments newest-to-oldest.
/// 3. First hit wins; a tombstone at any point shadows everything older and
///    is reported as absent.
///
/// # Recovery
///
/// On construction ([`Engine::open`]), existing `segment_*` files are
/// discovered and their indexes rebuilt; the memtable always starts empty.
pub struct Engine {
    state: RwLock<EngineState>,
    config: EngineConfig,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Debug::fmt cannot propagate an error, so a poisoned lock is
        // recovered rather than unwrapped -- the guard is still valid, the
        // state it reflects is just mid-panic.
        let state = self
            .state
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        f.debug_struct("Engine")
            .field("data_dir", &self.config.data_dir)
            .field("max_segment_size", &self.config.max_segment_size)
            .field("memtable_byte_budget", &self.config.memtable_byte_budget)
            .field("memtable_size", &state.memtable.approx_size())
            .field("memtable_entries", &state.memtable.len())
            .field("segment_count", &state.segments.len())
            .field("closed", &state.closed)
            .finish()
    }
}

impl Engine {
    /// Opens (or creates) the engine at `config.data_dir`, discovering any
    /// existing segments and rebuilding their indexes.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Io` if the data directory cannot be created or
    /// a segment file cannot be opened, and `EngineError::Corrupt` if a
    /// sealed (non-current) segment's index cannot be fully rebuilt -- a
    /// record that stops short partway through is only tolerated in the
    /// highest-id segment, the one that may genuinely have been mid-write
    /// when the process last stopped.
    pub fn open(config: EngineConfig) -> Result<Self, EngineError> {
        let segments = SegmentSet::discover(&config.data_dir, config.max_segment_size)?;

        Ok(Self {
            state: RwLock::new(EngineState {
                memtable: Memtable::new(),
                segments,
                closed: false,
            }),
            config,
        })
    }

    /// Acquires the state lock for reading, translating a poisoned lock into
    /// `EngineError::Io` instead of propagating the panic that poisoned it.
    fn read_state(&self) -> Result<RwLockReadGuard<'_, EngineState>, EngineError> {
        self.state
            .read()
            .map_err(|_| EngineError::Io(io::Error::new(io::ErrorKind::Other, "engine lock poisoned")))
    }

    /// Acquires the state lock for writing, translating a poisoned lock into
    /// `EngineError::Io` instead of propagating the panic that poisoned it.
    fn write_state(&self) -> Result<RwLockWriteGuard<'_, EngineState>, EngineError> {
        self.state
            .write()
            .map_err(|_| EngineError::Io(io::Error::new(io::ErrorKind::Other, "engine lock poisoned")))
    }
}
