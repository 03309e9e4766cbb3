use crate::error::StoreError;
use crate::iterator::IteratorRegistry;
use crate::key::Key;
use crate::scanner::{BatchScanner, ScanCounts, Scanner};

/// A sorted, range-partitioned key-value store with server-side iterators.
pub trait Store: Send + Sync {
    type Writer<'a>: BatchWriter
    where
        Self: 'a;

    fn create_table(&self, name: &str) -> Result<(), StoreError>;
    fn drop_table(&self, name: &str) -> Result<(), StoreError>;
    fn table_exists(&self, name: &str) -> bool;

    /// Begin a batch of writes against one table. Nothing is visible to
    /// scans until [`BatchWriter::flush`].
    fn writer(&self, table: &str) -> Result<Self::Writer<'_>, StoreError>;

    /// Open a single-range scan over a snapshot of `table`.
    fn open_scan(&self, table: &str) -> Result<Scanner, StoreError>;

    /// Open a multi-range scan that drives its ranges on up to `threads`
    /// worker threads.
    fn open_batch_scan(&self, table: &str, threads: usize) -> Result<BatchScanner, StoreError>;

    /// Factories for pushed iterators, keyed by kind.
    fn registry(&self) -> &IteratorRegistry;

    /// Open/close counters for every scan handed out by this store.
    fn scan_counts(&self) -> ScanCounts;
}

pub trait BatchWriter {
    fn put(&mut self, key: Key, value: Vec<u8>) -> Result<(), StoreError>;
    fn delete(&mut self, key: &Key) -> Result<(), StoreError>;
    fn flush(self) -> Result<(), StoreError>;
}
