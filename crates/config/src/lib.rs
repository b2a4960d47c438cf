//! # Config
//!
//! Construction-time configuration for the storage engine.
//!
//! There are no environment variables and no config file format here: every
//! knob is a constructor argument or a field on [`EngineConfig`]. Embedding
//! applications that want environment-driven configuration are expected to
//! read their own environment and pass the results in.

use std::path::{Path, PathBuf};

/// Default cap on a single segment file's size (1 MiB).
pub const DEFAULT_MAX_SEGMENT_SIZE: u64 = 1024 * 1024;

/// Default memtable flush threshold, in bytes of key+value data (1 MiB).
///
/// Tracks bytes, not entry count -- an entry-count threshold of this same
/// number would let the memtable grow to roughly a million entries before
/// flushing, which is not the intended budget.
pub const DEFAULT_MEMTABLE_BYTE_BUDGET: usize = 1024 * 1024;

/// Configuration for an [`Engine`](../engine/struct.Engine.html) instance.
///
/// Built via [`EngineConfig::new`] plus the `with_*` builder methods, or
/// constructed directly since every field is public.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Directory holding the segment files.
    pub data_dir: PathBuf,
    /// Maximum size, in bytes, a single segment file is allowed to reach.
    pub max_segment_size: u64,
    /// Memtable flush threshold, in bytes of key+value data.
    pub memtable_byte_budget: usize,
}

impl EngineConfig {
    /// Creates a config for `data_dir` with the default size budgets.
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            max_segment_size: DEFAULT_MAX_SEGMENT_SIZE,
            memtable_byte_budget: DEFAULT_MEMTABLE_BYTE_BUDGET,
        }
    }

    /// Overrides the maximum segment size.
    #[must_use]
    pub fn with_max_segment_size(mut self, bytes: u64) -> Self {
        self.max_segment_size = bytes;
        self
    }

    /// Overrides the memtable flush threshold.
    #[must_use]
    pub fn with_memtable_byte_budget(mut self, bytes: usize) -> Self {
        self.memtable_byte_budget = bytes;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_one_mebibyte() {
        let cfg = EngineConfig::new("/tmp/somewhere");
        assert_eq!(cfg.max_segment_size, 1024 * 1024);
        assert_eq!(cfg.memtable_byte_budget, 1024 * 1024);
    }

    #[test]
    fn builders_override_defaults() {
        let cfg = EngineConfig::new("/tmp/somewhere")
            .with_max_segment_size(4096)
            .with_memtable_byte_budget(512);
        assert_eq!(cfg.max_segment_size, 4096);
        assert_eq!(cfg.memtable_byte_budget, 512);
    }

    #[test]
    fn data_dir_is_preserved() {
        let cfg = EngineConfig::new("/var/lib/kv");
        assert_eq!(cfg.data_dir, PathBuf::from("/var/lib/kv"));
    }
}
