//! Write path: `put`, `delete`, `batch_put`, and the internal `flush`.
//!
//! Every mutation appends to the current segment and fsyncs it *before* the
//! memtable is updated -- the reverse of a typical WAL-then-memtable
//! ordering, chosen so the memtable never reflects data that is not yet
//! durable.

use memtable::MemValue;

use crate::error::EngineError;
use crate::{Engine, EngineState};

impl Engine {
    /// Inserts `key` -> `value`.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if `key` is empty. `TooLarge` if the record does
    /// not fit even in a freshly-rolled segment.
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<(), EngineError> {
        self.write_record(key, Some(value))
    }

    /// Deletes `key` by writing a tombstone through [`put`](Engine::put),
    /// then purging the key from the memtable buffer -- the on-disk
    /// tombstone is already fsynced and remains the authoritative signal on
    /// subsequent reads, so keeping a copy in the memtable buys nothing.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if `key` is empty.
    pub fn delete(&self, key: &[u8]) -> Result<(), EngineError> {
        self.write_record(key, None)?;

        let mut state = self.write_state()?;
        if state.closed {
            return Err(EngineError::Closed);
        }
        state.memtable.remove(key);
        Ok(())
    }

    /// Applies `put(keys[i], values[i])` for each `i` in order.
    ///
    /// Not atomic: if a write partway through fails, every earlier write in
    /// the batch remains durable.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if `keys.len() != values.len()`.
    pub fn batch_put(&self, keys: &[Vec<u8>], values: &[Vec<u8>]) -> Result<(), EngineError> {
        if keys.len() != values.len() {
            return Err(EngineError::InvalidArgument(format!(
                "keys and values must have equal length ({} != {})",
                keys.len(),
                values.len()
            )));
        }
        for (key, value) in keys.iter().zip(values.iter()) {
            self.put(key, value)?;
        }
        Ok(())
    }

    /// Flushes the memtable, then closes every segment. No further
    /// operations are permitted on this engine after `close` returns.
    ///
    /// # Errors
    ///
    /// Propagates any I/O error encountered while flushing or closing.
    pub fn close(&self) -> Result<(), EngineError> {
        let mut state = self.write_state()?;
        if state.closed {
            return Err(EngineError::Closed);
        }
        flush_locked(&mut state)?;
        state.segments.close_all()?;
        state.closed = true;
        Ok(())
    }

    fn write_record(&self, key: &[u8], value: Option<&[u8]>) -> Result<(), EngineError> {
        if key.is_empty() {
            return Err(EngineError::InvalidArgument("key must not be empty".into()));
        }

        let mut state = self.write_state()?;
        if state.closed {
            return Err(EngineError::Closed);
        }

        write_to_current_segment(&mut state, key, value)?;

        match value {
            Some(v) => state.memtable.put(key.to_vec(), v.to_vec()),
            None => state.memtable.delete(key.to_vec()),
        }

        if state.memtable.approx_size() >= self.config.memtable_byte_budget {
            flush_locked(&mut state)?;
        }

        Ok(())
    }
}

/// Appends to the current segment. If it refuses (full), rolls exactly one
/// fresh segment and retries; a second refusal means the record cannot fit
/// in an empty segment and is surfaced as `TooLarge`.
fn write_to_current_segment(
    state: &mut EngineState,
    key: &[u8],
    value: Option<&[u8]>,
) -> Result<(), EngineError> {
    let current = state.segments.current().clone();
    if current.write(key, value)? {
        return Ok(());
    }

    let fresh = state.segments.roll()?;
    if fresh.write(key, value)? {
        return Ok(());
    }

    Err(EngineError::TooLarge)
}

/// Creates a new segment, then drains the memtable into it in key order,
/// rolling further segments as each one fills. Clears the memtable only
/// once every entry has been durably written.
pub(crate) fn flush_locked(state: &mut EngineState) -> Result<(), EngineError> {
    state.segments.roll()?;

    let entries: Vec<(Vec<u8>, MemValue)> = state
        .memtable
        .iter()
        .map(|(k, v)| (k.to_vec(), v.clone()))
        .collect();

    for (key, entry) in &entries {
        let value = match entry {
            MemValue::Value(v) => Some(v.as_slice()),
            MemValue::Tombstone => None,
        };
        write_to_current_segment(state, key, value)?;
    }

    state.memtable.clear();
    Ok(())
}
