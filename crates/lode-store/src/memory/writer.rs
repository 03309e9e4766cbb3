use std::sync::MutexGuard;

use crate::error::StoreError;
use crate::key::Key;
use crate::store::BatchWriter;

use super::store::{MemoryStore, Table};

/// Buffered writes against one table of a [`MemoryStore`].
///
/// Holds the store's write lock until flushed or dropped; dropping
/// without flushing discards the batch.
pub struct MemoryWriter<'a> {
    store: &'a MemoryStore,
    table: String,
    data: Table,
    dirty: bool,
    _guard: MutexGuard<'a, ()>,
}

impl<'a> MemoryWriter<'a> {
    pub(crate) fn new(
        store: &'a MemoryStore,
        table: &str,
        data: Table,
        guard: MutexGuard<'a, ()>,
    ) -> Self {
        Self {
            store,
            table: table.to_string(),
            data,
            dirty: false,
            _guard: guard,
        }
    }
}

impl BatchWriter for MemoryWriter<'_> {
    fn put(&mut self, key: Key, value: Vec<u8>) -> Result<(), StoreError> {
        self.data.insert(key, value);
        self.dirty = true;
        Ok(())
    }

    fn delete(&mut self, key: &Key) -> Result<(), StoreError> {
        self.data.remove(key);
        self.dirty = true;
        Ok(())
    }

    fn flush(self) -> Result<(), StoreError> {
        if !self.dirty {
            return Ok(());
        }
        self.store.swap(&self.table, self.data)
    }
}
