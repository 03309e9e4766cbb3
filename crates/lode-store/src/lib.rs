mod error;
mod iterator;
mod key;
mod scanner;
mod store;

pub use error::StoreError;
pub use iterator::{
    IteratorFactory, IteratorRegistry, IteratorSetting, SortedKvIterator, family_visible,
};
pub use key::{ByteRange, Key, following_prefix};
pub use scanner::{BatchScanner, ScanCounts, ScanIter, ScanStats, Scanner};
pub use store::{BatchWriter, Store};

#[cfg(feature = "memory")]
mod memory;

#[cfg(feature = "memory")]
pub use memory::{MemoryStore, MemoryWriter, TableIterator};
