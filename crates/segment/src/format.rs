//! On-disk record framing for a segment file.
//!
//! ```text
//! [key_len:   u32 BE][key bytes]
//! [value_len: u32 BE][value bytes]   -- value_len == TOMBSTONE_MARKER means "no value follows"
//! ```
//!
//! All integers are fixed big-endian, independent of platform. There is no
//! per-record checksum and no version marker: a segment is a plain
//! concatenation of these records, written strictly append-only.
//!
//! A zero-length value and a tombstone are distinct on disk: `value_len == 0`
//! with zero trailing bytes is a live empty value, while `value_len ==
//! TOMBSTONE_MARKER` (`0xFFFF_FFFF`) carries no value bytes at all and means
//! "this key was deleted".

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

/// Sentinel `value_len` marking a tombstone record (no value bytes follow).
///
/// `u32::MAX` bytes is not a representable value length on any realistic
/// segment (it alone would exceed the default 1 MiB segment cap many times
/// over), so it is free to repurpose as the deletion marker.
pub const TOMBSTONE_MARKER: u32 = u32::MAX;

/// Fixed size of the two length prefixes in a record (8 bytes).
pub const HEADER_BYTES: u64 = 8;

/// Returns the on-disk size of a record for `key` and an optional value.
///
/// A tombstone (`value = None`) carries no value bytes, only the header.
#[must_use]
pub fn record_size(key: &[u8], value: Option<&[u8]>) -> u64 {
    HEADER_BYTES + key.len() as u64 + value.map_or(0, |v| v.len() as u64)
}

/// Encodes a record into `out`, appending to whatever was already there.
///
/// # Panics
///
/// Panics if `key.len()` or `value.len()` does not fit in a `u32`, or if a
/// live value happens to be exactly `u32::MAX` bytes (indistinguishable from
/// the tombstone marker). Both are caller-side precondition violations the
/// engine layer is expected to reject before reaching this point.
pub fn encode_record(out: &mut Vec<u8>, key: &[u8], value: Option<&[u8]>) {
    assert!(key.len() <= u32::MAX as usize, "key too large to encode");
    out.write_u32::<BigEndian>(key.len() as u32).expect("write to Vec cannot fail");
    out.extend_from_slice(key);

    match value {
        Some(v) => {
            assert!(v.len() < TOMBSTONE_MARKER as usize, "value too large to encode");
            out.write_u32::<BigEndian>(v.len() as u32).expect("write to Vec cannot fail");
            out.extend_from_slice(v);
        }
        None => {
            out.write_u32::<BigEndian>(TOMBSTONE_MARKER).expect("write to Vec cannot fail");
        }
    }
}

/// Result of decoding one record from a reader positioned at a record
/// boundary.
pub struct DecodedRecord {
    pub key: Vec<u8>,
    /// `None` for a tombstone.
    pub value: Option<Vec<u8>>,
    /// Byte offset, relative to the start of the record, where the value
    /// payload begins (meaningless for a tombstone).
    pub value_payload_rel_offset: u64,
    /// Total size of the record in bytes.
    pub record_len: u64,
}

/// Reads and decodes one record from `r`.
///
/// Returns `Ok(None)` when the record cannot be fully read -- treated by the
/// caller as a truncated tail (e.g. a crash mid-write), never as fatal
/// corruption, since there is no checksum to otherwise distinguish the two.
/// Returns `Err` only for a genuine I/O failure other than EOF.
pub fn decode_record<R: Read>(r: &mut R) -> io::Result<Option<DecodedRecord>> {
    let key_len = match r.read_u32::<BigEndian>() {
        Ok(v) => v,
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    };
    let mut key = vec![0u8; key_len as usize];
    if let Err(e) = r.read_exact(&mut key) {
        return if e.kind() == io::ErrorKind::UnexpectedEof { Ok(None) } else { Err(e) };
    }

    let value_len_or_marker = match r.read_u32::<BigEndian>() {
        Ok(v) => v,
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    };

    let value_payload_rel_offset = HEADER_BYTES + key_len as u64;

    if value_len_or_marker == TOMBSTONE_MARKER {
        return Ok(Some(DecodedRecord {
            key,
            value: None,
            value_payload_rel_offset,
            record_len: value_payload_rel_offset,
        }));
    }

    let mut value = vec![0u8; value_len_or_marker as usize];
    if let Err(e) = r.read_exact(&mut value) {
        return if e.kind() == io::ErrorKind::UnexpectedEof { Ok(None) } else { Err(e) };
    }

    Ok(Some(DecodedRecord {
        record_len: value_payload_rel_offset + value.len() as u64,
        key,
        value: Some(value),
        value_payload_rel_offset,
    }))
}
