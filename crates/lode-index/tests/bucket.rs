mod common;

use std::ops::Bound;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use lode_index::iterators::{BUCKET_SKIP, BUCKET_SKIP_PRIORITY, BucketSkipIterator, register_iterators};
use lode_store::{
    BatchWriter, ByteRange, IteratorSetting, Key, MemoryStore, SortedKvIterator, Store, StoreError,
    TableIterator,
};

/// Passes everything through and counts the seeks it receives.
struct CountingIterator {
    source: Box<dyn SortedKvIterator>,
    seeks: Arc<AtomicUsize>,
}

impl SortedKvIterator for CountingIterator {
    fn seek(&mut self, range: &ByteRange, families: &[Vec<u8>], inclusive: bool) -> Result<(), StoreError> {
        self.seeks.fetch_add(1, Ordering::SeqCst);
        self.source.seek(range, families, inclusive)
    }

    fn top_key(&self) -> Option<&Key> {
        self.source.top_key()
    }

    fn top_value(&self) -> Option<&[u8]> {
        self.source.top_value()
    }

    fn next(&mut self) -> Result<(), StoreError> {
        self.source.next()
    }

    fn deep_copy(&self) -> Result<Box<dyn SortedKvIterator>, StoreError> {
        Ok(Box::new(CountingIterator {
            source: self.source.deep_copy()?,
            seeks: Arc::clone(&self.seeks),
        }))
    }
}

/// Rows `{head}{00..04}`, three entries each.
fn entries(heads: &[&str]) -> Vec<(Key, Vec<u8>)> {
    let mut out = Vec::new();
    for head in heads {
        for bucket in 0..5 {
            for q in 0..3u8 {
                let row = format!("{head}{bucket:02}").into_bytes();
                out.push((Key::new(row, b"F".to_vec(), vec![q]), vec![q]));
            }
        }
    }
    out
}

fn accepted() -> Vec<Vec<u8>> {
    vec![b"01".to_vec(), b"03".to_vec()]
}

fn drain(iter: &mut dyn SortedKvIterator) -> Vec<(String, u8)> {
    let mut out = Vec::new();
    while let Some(key) = iter.top_key() {
        out.push((String::from_utf8(key.row.clone()).unwrap(), key.qualifier[0]));
        iter.next().unwrap();
    }
    out
}

fn counted(heads: &[&str]) -> (BucketSkipIterator, Arc<AtomicUsize>) {
    let seeks = Arc::new(AtomicUsize::new(0));
    let source = CountingIterator {
        source: Box::new(TableIterator::from_entries(entries(heads))),
        seeks: Arc::clone(&seeks),
    };
    let mut iter = BucketSkipIterator::new(Box::new(source));
    iter.init(&accepted(), 32).unwrap();
    (iter, seeks)
}

#[test]
fn each_rejected_bucket_costs_one_seek() {
    let (mut iter, seeks) = counted(&["x"]);
    iter.seek(&ByteRange::all(), &[], false).unwrap();
    let out = drain(&mut iter);

    let rows: Vec<&str> = out.iter().map(|(r, _)| r.as_str()).collect();
    assert_eq!(rows, vec!["x01", "x01", "x01", "x03", "x03", "x03"]);
    // The initial seek, then one each for x00, x02 and x04.
    assert_eq!(seeks.load(Ordering::SeqCst), 4);
}

#[test]
fn skips_to_the_next_head_when_no_larger_suffix_is_accepted() {
    let (mut iter, _) = counted(&["x", "y"]);
    iter.seek(&ByteRange::all(), &[], false).unwrap();
    let mut rows: Vec<String> = drain(&mut iter).into_iter().map(|(r, _)| r).collect();
    rows.dedup();
    assert_eq!(rows, vec!["x01", "x03", "y01", "y03"]);
}

#[test]
fn families_survive_reseeks() {
    let mut data = entries(&["x"]);
    data.push((Key::new(b"x01".to_vec(), b"G".to_vec(), vec![9]), vec![9]));
    data.push((Key::new(b"x03".to_vec(), b"G".to_vec(), vec![9]), vec![9]));
    let mut iter = BucketSkipIterator::new(Box::new(TableIterator::from_entries(data)));
    iter.init(&accepted(), 32).unwrap();
    iter.seek(&ByteRange::all(), &[b"G".to_vec()], true).unwrap();
    assert_eq!(drain(&mut iter), vec![("x01".to_string(), 9), ("x03".to_string(), 9)]);
}

#[test]
fn copies_advance_independently() {
    let (mut iter, _) = counted(&["x"]);
    iter.seek(&ByteRange::all(), &[], false).unwrap();
    iter.next().unwrap();
    let mut copy = iter.deep_copy().unwrap();

    let original = drain(&mut iter);
    let copied = drain(copy.as_mut());
    assert_eq!(original, copied);
    assert_eq!(original.first(), Some(&("x01".to_string(), 1)));
    assert_eq!(original.len(), 5);
}

#[test]
fn reseeks_are_clipped_to_the_seek_range() {
    let (mut iter, _) = counted(&["x", "y"]);
    let range = ByteRange::new(Bound::Included(b"x02".to_vec()), Bound::Excluded(b"y02".to_vec()));
    iter.seek(&range, &[], false).unwrap();
    let mut rows: Vec<String> = drain(&mut iter).into_iter().map(|(r, _)| r).collect();
    rows.dedup();
    assert_eq!(rows, vec!["x03", "y01"]);
}

// ── Through the store ───────────────────────────────────────────

fn seeded_store() -> MemoryStore {
    common::init_tracing();
    let store = MemoryStore::new();
    register_iterators(store.registry()).unwrap();
    store.create_table("buckets").unwrap();
    let mut writer = store.writer("buckets").unwrap();
    for (key, value) in entries(&["a", "b", "c"]) {
        writer.put(key, value).unwrap();
    }
    writer.flush().unwrap();
    store
}

#[test]
fn missing_suffixes_fail_the_scan() {
    let store = seeded_store();
    let mut scanner = store.open_scan("buckets").unwrap();
    scanner
        .add_iterator(IteratorSetting::new(BUCKET_SKIP_PRIORITY, "bucket-skip", BUCKET_SKIP))
        .unwrap();
    assert!(matches!(scanner.execute(), Err(StoreError::Protocol(_))));
    assert_eq!(store.scan_counts().live(), 0);
}

#[test]
fn scanner_exposes_only_accepted_rows() {
    let store = seeded_store();
    let mut scanner = store.open_scan("buckets").unwrap();
    scanner.set_range(ByteRange::new(Bound::Included(b"b".to_vec()), Bound::Unbounded));
    scanner.fetch_family(b"F");
    scanner
        .add_iterator(BucketSkipIterator::setting(&accepted(), 32).unwrap())
        .unwrap();
    let mut rows: Vec<Vec<u8>> = scanner
        .execute()
        .unwrap()
        .map(|entry| entry.unwrap().0.row)
        .collect();
    rows.dedup();
    assert_eq!(rows, vec![b"b01".to_vec(), b"b03".to_vec(), b"c01".to_vec(), b"c03".to_vec()]);
}

#[test]
fn batch_scans_skip_within_every_range() {
    let store = seeded_store();
    let mut batch = store.open_batch_scan("buckets", 2).unwrap();
    batch.set_ranges(vec![
        ByteRange::new(Bound::Included(b"a".to_vec()), Bound::Excluded(b"b".to_vec())),
        ByteRange::new(Bound::Included(b"c".to_vec()), Bound::Excluded(b"d".to_vec())),
    ]);
    batch.fetch_family(b"F");
    batch
        .add_iterator(BucketSkipIterator::setting(&accepted(), 32).unwrap())
        .unwrap();
    let out = batch.execute().unwrap();
    assert_eq!(out.len(), 12);

    let mut rows: Vec<Vec<u8>> = out.into_iter().map(|(k, _)| k.row).collect();
    rows.sort();
    rows.dedup();
    assert_eq!(rows, vec![b"a01".to_vec(), b"a03".to_vec(), b"c01".to_vec(), b"c03".to_vec()]);
}
