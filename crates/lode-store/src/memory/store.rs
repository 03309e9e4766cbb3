use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use arc_swap::ArcSwap;
use imbl::OrdMap;

use crate::error::StoreError;
use crate::iterator::IteratorRegistry;
use crate::key::Key;
use crate::scanner::{BatchScanner, ScanCounts, ScanStats, Scanner};
use crate::store::Store;

use super::table_iter::TableIterator;
use super::writer::MemoryWriter;

pub(crate) type Table = OrdMap<Key, Vec<u8>>;

/// In-process store backed by persistent ordered maps.
///
/// Every scan works on a snapshot taken when it is opened; writers build
/// a new version of the table and swap it in on flush. Snapshots are
/// cheap thanks to imbl's structural sharing.
pub struct MemoryStore {
    tables: RwLock<HashMap<String, Arc<ArcSwap<Table>>>>,
    write_lock: Mutex<()>,
    registry: IteratorRegistry,
    stats: Arc<ScanStats>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_registry(IteratorRegistry::new())
    }

    pub fn with_registry(registry: IteratorRegistry) -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            write_lock: Mutex::new(()),
            registry,
            stats: Arc::new(ScanStats::default()),
        }
    }

    fn table(&self, name: &str) -> Result<Arc<ArcSwap<Table>>, StoreError> {
        let tables = self
            .tables
            .read()
            .map_err(|e| StoreError::Storage(format!("table map poisoned: {e}")))?;
        tables
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::TableNotFound(name.to_string()))
    }

    /// Snapshot a table's current contents.
    pub(crate) fn snapshot(&self, name: &str) -> Result<Arc<Table>, StoreError> {
        Ok(self.table(name)?.load_full())
    }

    /// Swap a table's data with a new version.
    pub(crate) fn swap(&self, name: &str, data: Table) -> Result<(), StoreError> {
        self.table(name)?.store(Arc::new(data));
        Ok(())
    }

    /// Number of entries currently stored in a table.
    pub fn len(&self, name: &str) -> Result<usize, StoreError> {
        Ok(self.snapshot(name)?.len())
    }
}

impl Store for MemoryStore {
    type Writer<'a> = MemoryWriter<'a>;

    fn create_table(&self, name: &str) -> Result<(), StoreError> {
        let mut tables = self
            .tables
            .write()
            .map_err(|e| StoreError::Storage(format!("table map poisoned: {e}")))?;
        tables
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(ArcSwap::new(Arc::new(OrdMap::new()))));
        Ok(())
    }

    fn drop_table(&self, name: &str) -> Result<(), StoreError> {
        let mut tables = self
            .tables
            .write()
            .map_err(|e| StoreError::Storage(format!("table map poisoned: {e}")))?;
        tables.remove(name);
        Ok(())
    }

    fn table_exists(&self, name: &str) -> bool {
        self.tables
            .read()
            .map(|t| t.contains_key(name))
            .unwrap_or(false)
    }

    fn writer(&self, table: &str) -> Result<Self::Writer<'_>, StoreError> {
        let guard = self
            .write_lock
            .lock()
            .map_err(|e| StoreError::Storage(format!("write lock poisoned: {e}")))?;
        let data = (*self.snapshot(table)?).clone();
        Ok(MemoryWriter::new(self, table, data, guard))
    }

    fn open_scan(&self, table: &str) -> Result<Scanner, StoreError> {
        let source = TableIterator::new(self.snapshot(table)?);
        Ok(Scanner::new(
            table,
            Box::new(source),
            self.registry.clone(),
            Arc::clone(&self.stats),
        ))
    }

    fn open_batch_scan(&self, table: &str, threads: usize) -> Result<BatchScanner, StoreError> {
        let source = TableIterator::new(self.snapshot(table)?);
        Ok(BatchScanner::new(
            table,
            Box::new(source),
            self.registry.clone(),
            Arc::clone(&self.stats),
            threads,
        ))
    }

    fn registry(&self) -> &IteratorRegistry {
        &self.registry
    }

    fn scan_counts(&self) -> ScanCounts {
        self.stats.counts()
    }
}
