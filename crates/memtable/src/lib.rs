//! # Memtable
//!
//! An in-memory, sorted, mutable write buffer for the storage engine.
//!
//! The memtable is the first point of contact for every write. It buffers
//! recent `put`/`delete` operations in a sorted structure (`BTreeMap`) before
//! the engine drains them into a fresh on-disk segment.
//!
//! ## Key properties
//! - **Sorted order**: entries are always in ascending key order (required
//!   for flushing keys into a segment and for range reads).
//! - **Tombstone support**: deletes are recorded as [`MemValue::Tombstone`],
//!   distinct from a live empty value.
//! - **Byte-budget size tracking**: tracks the byte size of keys + values so
//!   the engine can decide when to flush, rather than counting entries.
//!
//! ## Example
//! ```rust
//! use memtable::{Memtable, MemValue};
//!
//! let mut m = Memtable::new();
//! m.put(b"hello".to_vec(), b"world".to_vec());
//! assert_eq!(m.get(b"hello"), Some(&MemValue::Value(b"world".to_vec())));
//!
//! m.delete(b"hello".to_vec());
//! assert_eq!(m.get(b"hello"), None);
//! ```

use std::collections::BTreeMap;
use std::ops::Bound;

/// The value side of a memtable entry: either a live value or a tombstone.
///
/// A zero-length value and a deletion are never conflated here --
/// `Value(vec![])` and `Tombstone` are distinct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemValue {
    /// A live value.
    Value(Vec<u8>),
    /// A delete marker. Shadows older values for this key, both in the
    /// memtable and in on-disk segments, once flushed.
    Tombstone,
}

impl MemValue {
    /// Returns the value bytes if this is a live value, `None` for tombstones.
    #[must_use]
    pub fn as_value(&self) -> Option<&[u8]> {
        match self {
            MemValue::Value(v) => Some(v),
            MemValue::Tombstone => None,
        }
    }

    /// Returns `true` if this is a tombstone.
    #[must_use]
    pub fn is_tombstone(&self) -> bool {
        matches!(self, MemValue::Tombstone)
    }

    fn byte_len(&self) -> usize {
        match self {
            MemValue::Value(v) => v.len(),
            MemValue::Tombstone => 0,
        }
    }
}

/// An ordered, in-memory write buffer backed by a `BTreeMap`.
///
/// Tracks an approximate byte size (key bytes + live value bytes) so the
/// engine can decide when to flush to a new segment.
#[derive(Debug, Default)]
pub struct Memtable {
    map: BTreeMap<Vec<u8>, MemValue>,
    approx_size: usize,
}

impl Memtable {
    /// Creates a new, empty memtable.
    #[must_use]
    pub fn new() -> Self {
        Self {
            map: BTreeMap::new(),
            approx_size: 0,
        }
    }

    /// Inserts a key-value pair, overwriting any existing entry (live value
    /// or tombstone) for that key.
    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.insert(key, MemValue::Value(value));
    }

    /// Records a tombstone (delete marker) for the given key.
    ///
    /// The tombstone shadows any older value both in the memtable and in
    /// on-disk segments once flushed.
    pub fn delete(&mut self, key: Vec<u8>) {
        self.insert(key, MemValue::Tombstone);
    }

    fn insert(&mut self, key: Vec<u8>, value: MemValue) {
        match self.map.get(&key) {
            Some(old) => {
                self.approx_size = self.approx_size.saturating_sub(old.byte_len());
            }
            None => {
                self.approx_size = self.approx_size.saturating_add(key.len());
            }
        }
        self.approx_size = self.approx_size.saturating_add(value.byte_len());
        self.map.insert(key, value);
    }

    /// Returns the live value for `key`, or `None` if it is missing *or* a
    /// tombstone. Use [`get_entry`](Memtable::get_entry) to distinguish the
    /// two.
    #[must_use]
    pub fn get(&self, key: &[u8]) -> Option<&MemValue> {
        match self.map.get(key) {
            Some(v @ MemValue::Value(_)) => Some(v),
            _ => None,
        }
    }

    /// Returns the raw entry for `key` (value or tombstone), or `None` if the
    /// key has never been written (or was removed via
    /// [`remove`](Memtable::remove)).
    #[must_use]
    pub fn get_entry(&self, key: &[u8]) -> Option<&MemValue> {
        self.map.get(key)
    }

    /// Removes `key` from the memtable outright (not a tombstone -- the key
    /// is gone from this buffer entirely). Used by the engine's `delete` path
    /// once the on-disk tombstone is durable: keeping the tombstone in the
    /// memtable after that point would only cost memory for no benefit.
    pub fn remove(&mut self, key: &[u8]) {
        if let Some(old) = self.map.remove(key) {
            self.approx_size = self
                .approx_size
                .saturating_sub(key.len() + old.byte_len());
        }
    }

    /// Returns an iterator over all entries in ascending key order,
    /// including tombstones.
    pub fn iter(&self) -> impl Iterator<Item = (&[u8], &MemValue)> {
        self.map.iter().map(|(k, v)| (k.as_slice(), v))
    }

    /// Returns all entries with `start <= key <= end` in ascending order,
    /// including tombstones. Both bounds are inclusive, matching the
    /// engine's range-read contract.
    pub fn submap<'a>(
        &'a self,
        start: &[u8],
        end: &[u8],
    ) -> impl Iterator<Item = (&'a [u8], &'a MemValue)> {
        self.map
            .range((Bound::Included(start.to_vec()), Bound::Included(end.to_vec())))
            .map(|(k, v)| (k.as_slice(), v))
    }

    /// Returns the number of entries (including tombstones).
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns `true` if the memtable contains zero entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Returns the approximate byte size of all keys and live values stored.
    ///
    /// Tombstones contribute only their key's byte length.
    #[must_use]
    pub fn approx_size(&self) -> usize {
        self.approx_size
    }

    /// Returns `true` if the memtable contains the given key (including
    /// tombstones).
    #[must_use]
    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.map.contains_key(key)
    }

    /// Removes all entries and resets `approx_size` to zero.
    pub fn clear(&mut self) {
        self.map.clear();
        self.approx_size = 0;
    }
}
