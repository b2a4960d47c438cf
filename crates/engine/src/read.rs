//! Read path: `read` and `read_range`.
//!
//! Point lookups check the memtable first (freshest data, including
//! tombstones), then segments newest-to-oldest. The first hit -- value or
//! tombstone -- wins and ends the search.
//!
//! Range reads merge the memtable and every segment in the same priority
//! order, tracking which keys are already decided (resolved to a value, or
//! occluded by a tombstone) so that an older source can never override a
//! newer one.

use memtable::MemValue;
use segment::SegmentLookup;
use std::collections::BTreeMap;

use crate::error::EngineError;
use crate::Engine;

impl Engine {
    /// Looks up `key`, returning `None` if it is absent or was deleted.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if `key` is empty.
    pub fn read(&self, key: &[u8]) -> Result<Option<Vec<u8>>, EngineError> {
        if key.is_empty() {
            return Err(EngineError::InvalidArgument("key must not be empty".into()));
        }

        let state = self.read_state()?;
        if state.closed {
            return Err(EngineError::Closed);
        }

        match state.memtable.get_entry(key) {
            Some(MemValue::Tombstone) => return Ok(None),
            Some(MemValue::Value(v)) => return Ok(Some(v.clone())),
            None => {}
        }

        for seg in state.segments.iter_newest_to_oldest() {
            match seg.read(key)? {
                SegmentLookup::Missing => continue,
                SegmentLookup::Tombstone => return Ok(None),
                SegmentLookup::Value(v) => return Ok(Some(v)),
            }
        }

        Ok(None)
    }

    /// Returns every live key-value pair with `start <= key <= end`, in
    /// ascending key order.
    ///
    /// # Errors
    ///
    /// Propagates any segment I/O error encountered while resolving the
    /// range.
    pub fn read_range(
        &self,
        start: &[u8],
        end: &[u8],
    ) -> Result<BTreeMap<Vec<u8>, Vec<u8>>, EngineError> {
        let state = self.read_state()?;
        if state.closed {
            return Err(EngineError::Closed);
        }
        if start > end {
            return Ok(BTreeMap::new());
        }

        let mut results: BTreeMap<Vec<u8>, Vec<u8>> = BTreeMap::new();
        let mut occluded: std::collections::HashSet<Vec<u8>> = std::collections::HashSet::new();

        for (key, value) in state.memtable.submap(start, end) {
            match value {
                MemValue::Tombstone => {
                    occluded.insert(key.to_vec());
                }
                MemValue::Value(v) => {
                    results.insert(key.to_vec(), v.clone());
                }
            }
        }

        for seg in state.segments.iter_newest_to_oldest() {
            for (key, lookup) in seg.read_range(start, end)? {
                if results.contains_key(&key) || occluded.contains(&key) {
                    continue;
                }
                match lookup {
                    SegmentLookup::Tombstone => {
                        occluded.insert(key);
                    }
                    SegmentLookup::Value(v) => {
                        results.insert(key, v);
                    }
                    SegmentLookup::Missing => {
                        unreachable!("segment range reads only yield indexed keys")
                    }
                }
            }
        }

        Ok(results)
    }
}
