use std::fmt;

#[derive(Debug)]
pub enum StoreError {
    TableNotFound(String),
    Storage(String),
    /// A pushed iterator failed while producing or skipping entries.
    Iterator(String),
    /// A pushed iterator was used outside its contract (e.g. before it
    /// was configured). Always a programming error.
    Protocol(String),
    UnknownIterator(String),
    DuplicateIterator(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::TableNotFound(name) => write!(f, "table not found: {name}"),
            StoreError::Storage(msg) => write!(f, "storage error: {msg}"),
            StoreError::Iterator(msg) => write!(f, "iterator error: {msg}"),
            StoreError::Protocol(msg) => write!(f, "iterator protocol violation: {msg}"),
            StoreError::UnknownIterator(kind) => write!(f, "unknown iterator kind: {kind}"),
            StoreError::DuplicateIterator(msg) => write!(f, "duplicate iterator: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}
