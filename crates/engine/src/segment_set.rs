//! The ordered collection of on-disk segments: discovery at startup, and
//! rolling a fresh current segment when one fills or a flush demands it.

use crate::error::EngineError;
use segment::{parse_segment_id, segment_filename, Segment};
use std::path::PathBuf;
use std::sync::Arc;

/// An ordered set of segments on disk, ascending by id. The last element is
/// always the current (write-target) segment.
pub(crate) struct SegmentSet {
    data_dir: PathBuf,
    max_segment_size: u64,
    segments: Vec<Arc<Segment>>,
}

impl SegmentSet {
    /// Enumerates `segment_*` files in `data_dir`, opens each (replaying its
    /// index), and sorts ascending by id. Creates `segment_000000` if the
    /// directory holds none yet.
    ///
    /// Only the highest-id segment is opened tolerant of a torn trailing
    /// record (it is the one that may have been mid-write at crash time);
    /// every sealed segment below it must decode cleanly to its end, or
    /// `discover` fails with `EngineError::Corrupt`.
    pub(crate) fn discover(data_dir: &std::path::Path, max_segment_size: u64) -> Result<Self, EngineError> {
        std::fs::create_dir_all(data_dir)?;

        let mut found: Vec<(u64, PathBuf)> = std::fs::read_dir(data_dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter_map(|p| parse_segment_id(&p).map(|id| (id, p)))
            .collect();
        found.sort_by_key(|(id, _)| *id);

        let mut segments = Vec::with_capacity(found.len().max(1));
        if found.is_empty() {
            let path = data_dir.join(segment_filename(0));
            segments.push(Arc::new(Segment::open(path, 0, max_segment_size, true)?));
        } else {
            let last_id = found.len() - 1;
            for (i, (id, path)) in found.into_iter().enumerate() {
                // Only the highest-id segment can have been open for writes
                // when the process last stopped; every earlier one was
                // already sealed by a prior roll, so a torn record there is
                // real corruption, not a crash artifact.
                let is_current = i == last_id;
                segments.push(Arc::new(Segment::open(path, id, max_segment_size, is_current)?));
            }
        }

        Ok(Self {
            data_dir: data_dir.to_path_buf(),
            max_segment_size,
            segments,
        })
    }

    /// The current (write-target) segment: the highest-id one.
    pub(crate) fn current(&self) -> &Arc<Segment> {
        self.segments.last().expect("segment set is never empty")
    }

    /// Creates a fresh segment, one past the current count (dense ids),
    /// installs it as the new current segment, and returns it. The old
    /// current segment is retained for reads.
    pub(crate) fn roll(&mut self) -> Result<Arc<Segment>, EngineError> {
        let new_id = self.segments.len() as u64;
        let path = self.data_dir.join(segment_filename(new_id));
        let seg = Arc::new(Segment::open(path, new_id, self.max_segment_size, true)?);
        self.segments.push(seg.clone());
        Ok(seg)
    }

    /// Segments in read-priority order: newest (current) first.
    pub(crate) fn iter_newest_to_oldest(&self) -> impl Iterator<Item = &Arc<Segment>> {
        self.segments.iter().rev()
    }

    /// Total number of segments on disk.
    pub(crate) fn len(&self) -> usize {
        self.segments.len()
    }

    /// Closes every segment. Called once, at engine shutdown.
    pub(crate) fn close_all(&self) -> Result<(), EngineError> {
        for seg in &self.segments {
            seg.close()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn discover_creates_segment_zero_in_an_empty_directory() {
        let dir = tempdir().unwrap();
        let set = SegmentSet::discover(dir.path(), 1024).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.current().id(), 0);
    }

    #[test]
    fn discover_opens_existing_segments_sorted_by_id() {
        let dir = tempdir().unwrap();
        {
            let mut set = SegmentSet::discover(dir.path(), 1024).unwrap();
            set.current().write(b"k0", Some(b"v0")).unwrap();
            set.roll().unwrap();
            set.current().write(b"k1", Some(b"v1")).unwrap();
        }

        let reopened = SegmentSet::discover(dir.path(), 1024).unwrap();
        assert_eq!(reopened.len(), 2);
        assert_eq!(reopened.current().id(), 1);
    }

    #[test]
    fn roll_assigns_dense_ids() {
        let dir = tempdir().unwrap();
        let mut set = SegmentSet::discover(dir.path(), 1024).unwrap();
        assert_eq!(set.roll().unwrap().id(), 1);
        assert_eq!(set.roll().unwrap().id(), 2);
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn iter_newest_to_oldest_visits_current_segment_first() {
        let dir = tempdir().unwrap();
        let mut set = SegmentSet::discover(dir.path(), 1024).unwrap();
        set.roll().unwrap();
        set.roll().unwrap();

        let ids: Vec<u64> = set.iter_newest_to_oldest().map(|s| s.id()).collect();
        assert_eq!(ids, vec![2, 1, 0]);
    }
}
