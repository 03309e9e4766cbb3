mod store;
mod table_iter;
mod writer;

pub use store::MemoryStore;
pub use table_iter::TableIterator;
pub use writer::MemoryWriter;
