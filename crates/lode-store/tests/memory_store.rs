#![cfg(feature = "memory")]

use std::ops::Bound;

use lode_store::{
    BatchWriter, ByteRange, IteratorSetting, Key, MemoryStore, SortedKvIterator, Store,
    StoreError,
};

const TABLE: &str = "test";

fn mem_store() -> MemoryStore {
    let store = MemoryStore::new();
    store.create_table(TABLE).unwrap();
    store
}

fn key(row: &str, qualifier: &str) -> Key {
    Key::new(row.as_bytes().to_vec(), b"F".to_vec(), qualifier.as_bytes().to_vec())
}

fn seed(store: &MemoryStore) {
    let mut writer = store.writer(TABLE).unwrap();
    for (row, q, v) in [
        ("accounts:1", "email", "a@test.com"),
        ("accounts:1", "name", "Alice"),
        ("accounts:2", "name", "Bob"),
        ("accounts:3", "name", "Carol"),
        ("users:1", "name", "Dave"),
    ] {
        writer.put(key(row, q), v.as_bytes().to_vec()).unwrap();
    }
    writer.flush().unwrap();
}

fn values(store: &MemoryStore, range: ByteRange) -> Vec<String> {
    let mut scan = store.open_scan(TABLE).unwrap();
    scan.set_range(range);
    scan.execute()
        .unwrap()
        .map(|r| String::from_utf8(r.unwrap().1).unwrap())
        .collect()
}

#[test]
fn put_and_scan() {
    let store = mem_store();
    seed(&store);
    assert_eq!(values(&store, ByteRange::all()).len(), 5);
}

#[test]
fn writes_invisible_until_flush() {
    let store = mem_store();
    let mut writer = store.writer(TABLE).unwrap();
    writer.put(key("r", "q"), b"v".to_vec()).unwrap();
    drop(writer);
    assert!(values(&store, ByteRange::all()).is_empty());
}

#[test]
fn put_and_delete() {
    let store = mem_store();
    seed(&store);
    let mut writer = store.writer(TABLE).unwrap();
    writer.delete(&key("accounts:2", "name")).unwrap();
    writer.flush().unwrap();
    let vals = values(&store, ByteRange::all());
    assert!(!vals.contains(&"Bob".to_string()));
    assert_eq!(vals.len(), 4);
}

#[test]
fn range_scan_respects_bounds() {
    let store = mem_store();
    seed(&store);
    let range = ByteRange::new(
        Bound::Excluded(b"accounts:1".to_vec()),
        Bound::Excluded(b"accounts:3".to_vec()),
    );
    assert_eq!(values(&store, range), vec!["Bob"]);
}

#[test]
fn empty_range_yields_nothing() {
    let store = mem_store();
    seed(&store);
    assert!(values(&store, ByteRange::empty()).is_empty());
}

#[test]
fn scan_of_missing_table_errors() {
    let store = mem_store();
    assert!(matches!(
        store.open_scan("nope"),
        Err(StoreError::TableNotFound(_))
    ));
}

#[test]
fn scans_see_a_snapshot() {
    let store = mem_store();
    seed(&store);
    let mut scan = store.open_scan(TABLE).unwrap();
    scan.set_range(ByteRange::all());

    let mut writer = store.writer(TABLE).unwrap();
    writer.put(key("zzz", "q"), b"late".to_vec()).unwrap();
    writer.flush().unwrap();

    assert_eq!(scan.execute().unwrap().count(), 5);
    assert_eq!(values(&store, ByteRange::all()).len(), 6);
}

#[test]
fn scans_are_released_on_drop() {
    let store = mem_store();
    seed(&store);

    let scan = store.open_scan(TABLE).unwrap();
    let mut iter = scan.execute().unwrap();
    iter.next();
    assert_eq!(store.scan_counts().live(), 1);
    drop(iter);

    let unused = store.open_scan(TABLE).unwrap();
    drop(unused);

    let counts = store.scan_counts();
    assert_eq!(counts.opened, 2);
    assert_eq!(counts.closed, 2);
}

// ── Pushed iterators ─────────────────────────────────────────

/// Hides entries whose value does not contain the configured needle.
struct ContainsFilter {
    source: Box<dyn SortedKvIterator>,
    needle: Vec<u8>,
}

impl ContainsFilter {
    fn skip(&mut self) -> Result<(), StoreError> {
        while let Some(v) = self.source.top_value() {
            if v.windows(self.needle.len()).any(|w| w == self.needle.as_slice()) {
                return Ok(());
            }
            self.source.next()?;
        }
        Ok(())
    }
}

impl SortedKvIterator for ContainsFilter {
    fn seek(&mut self, range: &ByteRange, f: &[Vec<u8>], i: bool) -> Result<(), StoreError> {
        self.source.seek(range, f, i)?;
        self.skip()
    }
    fn top_key(&self) -> Option<&Key> {
        self.source.top_key()
    }
    fn top_value(&self) -> Option<&[u8]> {
        self.source.top_value()
    }
    fn next(&mut self) -> Result<(), StoreError> {
        self.source.next()?;
        self.skip()
    }
    fn deep_copy(&self) -> Result<Box<dyn SortedKvIterator>, StoreError> {
        Ok(Box::new(ContainsFilter {
            source: self.source.deep_copy()?,
            needle: self.needle.clone(),
        }))
    }
}

fn register_contains(store: &MemoryStore) {
    store
        .registry()
        .register("contains", |source, setting| {
            let needle = setting.require("needle")?.as_bytes().to_vec();
            Ok(Box::new(ContainsFilter { source, needle }))
        })
        .unwrap();
}

#[test]
fn pushed_iterator_filters_entries() {
    let store = mem_store();
    register_contains(&store);
    seed(&store);

    let mut scan = store.open_scan(TABLE).unwrap();
    scan.add_iterator(IteratorSetting::new(10, "has-o", "contains").with_option("needle", "o"))
        .unwrap();
    let vals: Vec<_> = scan.execute().unwrap().map(|r| r.unwrap().1).collect();
    assert_eq!(
        vals,
        vec![b"a@test.com".to_vec(), b"Bob".to_vec(), b"Carol".to_vec()]
    );
}

#[test]
fn unknown_iterator_kind_errors() {
    let store = mem_store();
    let mut scan = store.open_scan(TABLE).unwrap();
    scan.add_iterator(IteratorSetting::new(10, "x", "missing")).unwrap();
    assert!(matches!(scan.execute(), Err(StoreError::UnknownIterator(_))));
}

#[test]
fn duplicate_priority_rejected() {
    let store = mem_store();
    let mut scan = store.open_scan(TABLE).unwrap();
    scan.add_iterator(IteratorSetting::new(10, "a", "contains")).unwrap();
    let err = scan.add_iterator(IteratorSetting::new(10, "b", "contains"));
    assert!(matches!(err, Err(StoreError::DuplicateIterator(_))));
}

#[test]
fn scan_can_be_reseeked() {
    let store = mem_store();
    seed(&store);
    let mut iter = store.open_scan(TABLE).unwrap().execute().unwrap();
    iter.seek(ByteRange::exact(b"users:1".to_vec())).unwrap();
    let vals: Vec<_> = iter.by_ref().map(|r| r.unwrap().1).collect();
    assert_eq!(vals, vec![b"Dave".to_vec()]);
    iter.seek(ByteRange::exact(b"accounts:3".to_vec())).unwrap();
    assert_eq!(iter.next().unwrap().unwrap().1, b"Carol".to_vec());
}

#[test]
fn batch_scan_covers_every_range_in_order() {
    let store = mem_store();
    register_contains(&store);
    seed(&store);

    let mut batch = store.open_batch_scan(TABLE, 2).unwrap();
    batch.set_ranges(vec![
        ByteRange::exact(b"users:1".to_vec()),
        ByteRange::exact(b"accounts:2".to_vec()),
        ByteRange::exact(b"accounts:3".to_vec()),
    ]);
    batch
        .add_iterator(IteratorSetting::new(10, "has-a", "contains").with_option("needle", "a"))
        .unwrap();
    let vals: Vec<_> = batch.execute().unwrap().into_iter().map(|(_, v)| v).collect();
    assert_eq!(vals, vec![b"Dave".to_vec(), b"Carol".to_vec()]);
    assert_eq!(store.scan_counts().live(), 0);
}
