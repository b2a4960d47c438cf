//! # Segment
//!
//! A single append-only log file plus the in-memory index built over it.
//!
//! A segment is the unit of storage for the engine: writes land in the
//! newest (open) segment, older segments are sealed and read-only, and a
//! key's latest value lives in whichever segment wrote it most recently.
//! This crate knows nothing about that ordering across segments -- it only
//! knows how to append records to *one* file and answer point/range lookups
//! against its own index. Shadowing across multiple segments is the
//! engine's job.
//!
//! ## On-disk format
//!
//! See [`format`] for the record layout. In short: big-endian length-prefixed
//! key/value pairs, with a reserved `value_len` sentinel marking a tombstone.
//!
//! ## Recovery
//!
//! Opening a segment replays it from byte 0, rebuilding the index. Without a
//! per-record checksum, a short read cannot be told apart from a corrupted
//! length field by its shape alone -- both look identical to the reader. The
//! one piece of outside information that *does* distinguish them is whether
//! this segment was still being written to when the process went down: only
//! the current (highest-id) segment can have a torn trailing record, since
//! every other segment was already rolled away from -- fully written and
//! fsynced -- before the engine ever moved on to the next one. So the caller
//! passes `tolerate_trailing_truncation` based on that fact: `true` for the
//! current segment (a short read at the tail truncates the file and the scan
//! stops cleanly), `false` for every sealed segment (any short read there
//! is unrecoverable and reported as [`SegmentError::Corrupt`], since a sealed
//! file should never have stopped mid-record).

pub mod format;

use format::{decode_record, encode_record, record_size, HEADER_BYTES};
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use thiserror::Error;

/// Errors that can occur during segment operations.
#[derive(Debug, Error)]
pub enum SegmentError {
    /// An underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// The index points at a record that the file no longer backs up, e.g.
    /// because the segment was truncated or modified outside this crate. Also
    /// raised during `open` when a sealed (non-current) segment contains a
    /// record that could not be fully read.
    #[error("segment corrupt: index references a record that could not be read")]
    Corrupt,
}

fn poison_err() -> SegmentError {
    SegmentError::Io(io::Error::new(io::ErrorKind::Other, "segment mutex poisoned"))
}

/// The outcome of a point lookup within a single segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentLookup {
    /// The key has never been written to this segment.
    Missing,
    /// The key's most recent record in this segment is a tombstone.
    Tombstone,
    /// The key's most recent record in this segment is a live value.
    Value(Vec<u8>),
}

impl SegmentLookup {
    /// Returns `true` if this is [`SegmentLookup::Missing`].
    #[must_use]
    pub fn is_missing(&self) -> bool {
        matches!(self, SegmentLookup::Missing)
    }
}

/// Where in the file a key's current value (if any) can be found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IndexEntry {
    /// Value payload begins at this absolute file offset.
    Value(u64),
    Tombstone,
}

struct SegmentInner {
    file: File,
    index: BTreeMap<Vec<u8>, IndexEntry>,
    /// Absolute offset one past the last byte of the last complete record.
    write_offset: u64,
}

/// One append-only segment file and the index built over it.
///
/// All file access is serialized through a single [`Mutex`]: both writes and
/// reads perform positional I/O against the same handle, so concurrent
/// access must be exclusive even for reads.
pub struct Segment {
    id: u64,
    path: PathBuf,
    max_size: u64,
    inner: Mutex<SegmentInner>,
}

/// Formats the canonical filename for segment `id`: `segment_000000`, etc.
#[must_use]
pub fn segment_filename(id: u64) -> String {
    format!("segment_{id:06}")
}

/// Parses a segment id back out of a filename produced by
/// [`segment_filename`]. Returns `None` for anything else found in a data
/// directory.
#[must_use]
pub fn parse_segment_id(path: &Path) -> Option<u64> {
    let name = path.file_name()?.to_str()?;
    name.strip_prefix("segment_")?.parse().ok()
}

impl Segment {
    /// Opens an existing segment file at `path`, or creates it if absent,
    /// and rebuilds its index by replaying every record from byte 0.
    ///
    /// `id` identifies the segment for ordering purposes (newer id wins);
    /// it is not derived from `path` here since a freshly created segment's
    /// id is assigned by the caller before the file exists.
    ///
    /// `tolerate_trailing_truncation` should be `true` only for the current
    /// (highest-id) segment in a segment set -- the one that may genuinely
    /// have been mid-write when the process stopped. For every other,
    /// already-sealed segment it should be `false`: a short read there can
    /// only mean real corruption, not an in-progress write, and is reported
    /// as [`SegmentError::Corrupt`] rather than silently truncated.
    pub fn open<P: AsRef<Path>>(
        path: P,
        id: u64,
        max_size: u64,
        tolerate_trailing_truncation: bool,
    ) -> Result<Self, SegmentError> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)?;

        let (index, write_offset) = rebuild_index(&mut file, tolerate_trailing_truncation)?;

        Ok(Self {
            id,
            path,
            max_size,
            inner: Mutex::new(SegmentInner {
                file,
                index,
                write_offset,
            }),
        })
    }

    /// This segment's id.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of distinct keys indexed (live values and tombstones alike).
    pub fn len(&self) -> Result<usize, SegmentError> {
        Ok(self.lock_inner()?.index.len())
    }

    /// Returns `true` if the segment has no indexed keys.
    pub fn is_empty(&self) -> Result<bool, SegmentError> {
        Ok(self.lock_inner()?.index.is_empty())
    }

    /// Current size of the file in bytes (the offset one past the last
    /// complete record).
    pub fn size(&self) -> Result<u64, SegmentError> {
        Ok(self.lock_inner()?.write_offset)
    }

    fn lock_inner(&self) -> Result<std::sync::MutexGuard<'_, SegmentInner>, SegmentError> {
        self.inner.lock().map_err(|_| poison_err())
    }

    /// Appends a record for `key`/`value` (`None` for a delete).
    ///
    /// Returns `Ok(false)` without writing anything if the record would push
    /// the segment past its configured maximum size -- the caller (the
    /// engine) is expected to roll a new segment and retry there. Returns
    /// `Ok(true)` once the record has been written and fsynced.
    pub fn write(&self, key: &[u8], value: Option<&[u8]>) -> Result<bool, SegmentError> {
        let mut inner = self.lock_inner()?;

        let size = record_size(key, value);
        if inner.write_offset + size > self.max_size {
            return Ok(false);
        }

        let mut buf = Vec::with_capacity(size as usize);
        encode_record(&mut buf, key, value);

        inner.file.write_all(&buf)?;
        inner.file.sync_all()?;

        let record_offset = inner.write_offset;
        let entry = match value {
            Some(_) => IndexEntry::Value(record_offset + HEADER_BYTES + key.len() as u64),
            None => IndexEntry::Tombstone,
        };
        inner.index.insert(key.to_vec(), entry);
        inner.write_offset += size;

        Ok(true)
    }

    /// Looks up `key` in this segment only.
    pub fn read(&self, key: &[u8]) -> Result<SegmentLookup, SegmentError> {
        let mut inner = self.lock_inner()?;
        let entry = match inner.index.get(key).copied() {
            None => return Ok(SegmentLookup::Missing),
            Some(e) => e,
        };
        read_entry(&mut inner.file, entry)
    }

    /// Returns every indexed key in `[start, end]` (inclusive on both ends)
    /// together with its lookup result, in ascending key order.
    pub fn read_range(
        &self,
        start: &[u8],
        end: &[u8],
    ) -> Result<Vec<(Vec<u8>, SegmentLookup)>, SegmentError> {
        use std::ops::Bound;

        let mut inner = self.lock_inner()?;
        let keys: Vec<(Vec<u8>, IndexEntry)> = inner
            .index
            .range((Bound::Included(start.to_vec()), Bound::Included(end.to_vec())))
            .map(|(k, v)| (k.clone(), *v))
            .collect();

        let mut out = Vec::with_capacity(keys.len());
        for (key, entry) in keys {
            let lookup = read_entry(&mut inner.file, entry)?;
            out.push((key, lookup));
        }
        Ok(out)
    }

    /// Flushes any OS-buffered writes and syncs the file. The handle itself
    /// closes when this `Segment` is dropped.
    pub fn close(&self) -> Result<(), SegmentError> {
        let inner = self.lock_inner()?;
        inner.file.sync_all()?;
        Ok(())
    }
}

fn read_entry(file: &mut File, entry: IndexEntry) -> Result<SegmentLookup, SegmentError> {
    let offset = match entry {
        IndexEntry::Tombstone => return Ok(SegmentLookup::Tombstone),
        IndexEntry::Value(offset) => offset,
    };

    file.seek(SeekFrom::Start(offset - 4))?;
    let mut len_buf = [0u8; 4];
    file.read_exact(&mut len_buf).map_err(corrupt_on_eof)?;
    let value_len = u32::from_be_bytes(len_buf) as usize;

    let mut value = vec![0u8; value_len];
    file.read_exact(&mut value).map_err(corrupt_on_eof)?;

    Ok(SegmentLookup::Value(value))
}

fn corrupt_on_eof(e: io::Error) -> SegmentError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        SegmentError::Corrupt
    } else {
        SegmentError::Io(e)
    }
}

/// Scans `file` from byte 0, replaying records into an index.
///
/// On a short read (a length field that would read past EOF): if
/// `tolerate_trailing_truncation` is `true`, this is treated as a
/// crash-mid-write artifact -- the file is truncated to the last good record
/// boundary and the scan stops cleanly. If `false`, the same short read is
/// reported as [`SegmentError::Corrupt`], since this segment is not supposed
/// to have been written to since it was sealed.
fn rebuild_index(
    file: &mut File,
    tolerate_trailing_truncation: bool,
) -> Result<(BTreeMap<Vec<u8>, IndexEntry>, u64), SegmentError> {
    let file_len = file.metadata()?.len();
    file.seek(SeekFrom::Start(0))?;
    let mut reader = io::BufReader::new(&mut *file);

    let mut index = BTreeMap::new();
    let mut offset = 0u64;

    loop {
        match decode_record(&mut reader)? {
            None => {
                // A short read with bytes still left on disk beyond the last
                // complete record is a torn record, not a clean end-of-file.
                if offset < file_len && !tolerate_trailing_truncation {
                    return Err(SegmentError::Corrupt);
                }
                break;
            }
            Some(rec) => {
                let entry = match rec.value {
                    Some(_) => IndexEntry::Value(offset + rec.value_payload_rel_offset),
                    None => IndexEntry::Tombstone,
                };
                index.insert(rec.key, entry);
                offset += rec.record_len;
            }
        }
    }
    drop(reader);

    file.set_len(offset)?;
    file.seek(SeekFrom::End(0))?;
    Ok((index, offset))
}

#[cfg(test)]
mod tests;
