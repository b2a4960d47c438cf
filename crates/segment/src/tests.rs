use super::*;
use std::io::Write as _;
use tempfile::tempdir;

fn open(dir: &Path, id: u64, max_size: u64) -> Segment {
    Segment::open(dir.join(segment_filename(id)), id, max_size, true).unwrap()
}

#[test]
fn write_then_read_round_trips() {
    let dir = tempdir().unwrap();
    let seg = open(dir.path(), 0, 1024 * 1024);

    assert!(seg.write(b"k1", Some(b"v1")).unwrap());
    assert_eq!(seg.read(b"k1").unwrap(), SegmentLookup::Value(b"v1".to_vec()));
}

#[test]
fn missing_key_returns_missing() {
    let dir = tempdir().unwrap();
    let seg = open(dir.path(), 0, 1024 * 1024);
    assert_eq!(seg.read(b"nope").unwrap(), SegmentLookup::Missing);
}

#[test]
fn later_write_shadows_earlier_one_within_a_segment() {
    let dir = tempdir().unwrap();
    let seg = open(dir.path(), 0, 1024 * 1024);

    seg.write(b"k", Some(b"v1")).unwrap();
    seg.write(b"k", Some(b"v2")).unwrap();
    assert_eq!(seg.read(b"k").unwrap(), SegmentLookup::Value(b"v2".to_vec()));
}

#[test]
fn delete_records_a_tombstone() {
    let dir = tempdir().unwrap();
    let seg = open(dir.path(), 0, 1024 * 1024);

    seg.write(b"k", Some(b"v1")).unwrap();
    seg.write(b"k", None).unwrap();
    assert_eq!(seg.read(b"k").unwrap(), SegmentLookup::Tombstone);
}

#[test]
fn empty_value_is_distinct_from_tombstone() {
    let dir = tempdir().unwrap();
    let seg = open(dir.path(), 0, 1024 * 1024);

    seg.write(b"k", Some(b"")).unwrap();
    assert_eq!(seg.read(b"k").unwrap(), SegmentLookup::Value(Vec::new()));
}

#[test]
fn write_refuses_once_segment_would_exceed_max_size() {
    let dir = tempdir().unwrap();
    // Big enough for one record, not two.
    let seg = open(dir.path(), 0, format::record_size(b"k", Some(b"value")));

    assert!(seg.write(b"k", Some(b"value")).unwrap());
    assert!(!seg.write(b"k2", Some(b"value")).unwrap());
}

#[test]
fn read_range_is_inclusive_on_both_ends_in_key_order() {
    let dir = tempdir().unwrap();
    let seg = open(dir.path(), 0, 1024 * 1024);

    for k in ["a", "b", "c", "d"] {
        seg.write(k.as_bytes(), Some(b"v")).unwrap();
    }

    let results = seg.read_range(b"b", b"c").unwrap();
    let keys: Vec<Vec<u8>> = results.into_iter().map(|(k, _)| k).collect();
    assert_eq!(keys, vec![b"b".to_vec(), b"c".to_vec()]);
}

#[test]
fn read_range_includes_tombstones() {
    let dir = tempdir().unwrap();
    let seg = open(dir.path(), 0, 1024 * 1024);

    seg.write(b"a", Some(b"1")).unwrap();
    seg.write(b"b", None).unwrap();
    seg.write(b"c", Some(b"3")).unwrap();

    let results = seg.read_range(b"a", b"c").unwrap();
    assert_eq!(results.len(), 3);
    assert_eq!(results[1].1, SegmentLookup::Tombstone);
}

#[test]
fn reopening_an_existing_segment_rebuilds_the_index() {
    let dir = tempdir().unwrap();
    let path = dir.path().join(segment_filename(0));

    {
        let seg = Segment::open(&path, 0, 1024 * 1024, true).unwrap();
        seg.write(b"k1", Some(b"v1")).unwrap();
        seg.write(b"k2", Some(b"v2")).unwrap();
        seg.write(b"k1", None).unwrap();
    }

    let reopened = Segment::open(&path, 0, 1024 * 1024, true).unwrap();
    assert_eq!(reopened.read(b"k1").unwrap(), SegmentLookup::Tombstone);
    assert_eq!(reopened.read(b"k2").unwrap(), SegmentLookup::Value(b"v2".to_vec()));
    assert_eq!(reopened.len().unwrap(), 2);
}

#[test]
fn a_truncated_trailing_record_is_dropped_not_fatal_when_tail_is_tolerated() {
    let dir = tempdir().unwrap();
    let path = dir.path().join(segment_filename(0));

    {
        let seg = Segment::open(&path, 0, 1024 * 1024, true).unwrap();
        seg.write(b"k1", Some(b"v1")).unwrap();
        seg.write(b"k2", Some(b"v2")).unwrap();
    }

    let good_len = std::fs::metadata(&path).unwrap().len();

    // Simulate a crash mid-write: append a partial record header.
    {
        let mut f = OpenOptions::new().append(true).open(&path).unwrap();
        f.write_all(&[0, 0, 0, 5, b'p', b'a']).unwrap(); // claims a 5-byte key, only 2 bytes follow
    }

    let recovered = Segment::open(&path, 0, 1024 * 1024, true).unwrap();
    assert_eq!(recovered.read(b"k1").unwrap(), SegmentLookup::Value(b"v1".to_vec()));
    assert_eq!(recovered.read(b"k2").unwrap(), SegmentLookup::Value(b"v2".to_vec()));
    assert_eq!(recovered.size().unwrap(), good_len);
    assert_eq!(std::fs::metadata(&path).unwrap().len(), good_len);
}

#[test]
fn a_torn_trailing_record_is_fatal_when_tail_is_not_tolerated() {
    let dir = tempdir().unwrap();
    let path = dir.path().join(segment_filename(0));

    {
        let seg = Segment::open(&path, 0, 1024 * 1024, true).unwrap();
        seg.write(b"k1", Some(b"v1")).unwrap();
    }

    // Same corruption as the tolerated case, but this segment is sealed.
    {
        let mut f = OpenOptions::new().append(true).open(&path).unwrap();
        f.write_all(&[0, 0, 0, 5, b'p', b'a']).unwrap();
    }

    let result = Segment::open(&path, 0, 1024 * 1024, false);
    assert!(matches!(result, Err(SegmentError::Corrupt)));
    // The file itself is left untouched -- a sealed segment is never rewritten.
    assert_eq!(std::fs::metadata(&path).unwrap().len(), {
        let seg = Segment::open(&path, 0, 1024 * 1024, true).unwrap();
        seg.size().unwrap()
    });
}

#[test]
fn a_fresh_empty_file_opens_with_an_empty_index() {
    let dir = tempdir().unwrap();
    let seg = open(dir.path(), 7, 1024 * 1024);
    assert!(seg.is_empty().unwrap());
    assert_eq!(seg.size().unwrap(), 0);
    assert_eq!(seg.id(), 7);
}

#[test]
fn a_cleanly_ended_sealed_segment_opens_fine_when_not_tolerated() {
    let dir = tempdir().unwrap();
    let path = dir.path().join(segment_filename(0));

    {
        let seg = Segment::open(&path, 0, 1024 * 1024, true).unwrap();
        seg.write(b"k1", Some(b"v1")).unwrap();
        seg.write(b"k2", Some(b"v2")).unwrap();
    }

    // No trailing garbage: a sealed segment with only complete records opens
    // fine even when truncation is not tolerated.
    let reopened = Segment::open(&path, 0, 1024 * 1024, false).unwrap();
    assert_eq!(reopened.read(b"k1").unwrap(), SegmentLookup::Value(b"v1".to_vec()));
    assert_eq!(reopened.len().unwrap(), 2);
}

#[test]
fn segment_filename_and_parse_round_trip() {
    let name = segment_filename(42);
    let path = Path::new(&name);
    assert_eq!(parse_segment_id(path), Some(42));
}

#[test]
fn parse_segment_id_rejects_unrelated_filenames() {
    assert_eq!(parse_segment_id(Path::new("README.md")), None);
    assert_eq!(parse_segment_id(Path::new("segment-abc.log")), None);
}

#[test]
fn binary_keys_and_values_round_trip() {
    let dir = tempdir().unwrap();
    let seg = open(dir.path(), 0, 1024 * 1024);

    let key = vec![0x00, 0xFF, 0x10];
    let value = vec![0xDE, 0xAD, 0xBE, 0xEF];
    seg.write(&key, Some(&value)).unwrap();
    assert_eq!(seg.read(&key).unwrap(), SegmentLookup::Value(value));
}

#[test]
fn close_does_not_prevent_further_reads() {
    let dir = tempdir().unwrap();
    let seg = open(dir.path(), 0, 1024 * 1024);
    seg.write(b"k", Some(b"v")).unwrap();
    seg.close().unwrap();
    assert_eq!(seg.read(b"k").unwrap(), SegmentLookup::Value(b"v".to_vec()));
}
