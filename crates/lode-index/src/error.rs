use std::fmt;

use lode_query::{FilterParseError, SchemaError};
use lode_store::StoreError;

// ── EncodingError ─────────────────────────────────────────────

#[derive(Debug)]
pub enum EncodingError {
    Bson(bson::error::Error),
    /// A literal could not be converted to the attribute's declared type.
    Coercion {
        attribute: String,
        expected: String,
        value: String,
    },
    /// The attribute's type has no row encoding (e.g. geometries).
    Unsupported(String),
    UnknownAttribute(String),
    MalformedRow(String),
}

impl fmt::Display for EncodingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bson(e) => write!(f, "bson: {e}"),
            Self::Coercion {
                attribute,
                expected,
                value,
            } => write!(f, "cannot convert {value} to {expected} for attribute '{attribute}'"),
            Self::Unsupported(msg) => write!(f, "unsupported encoding: {msg}"),
            Self::UnknownAttribute(name) => write!(f, "unknown attribute: {name}"),
            Self::MalformedRow(msg) => write!(f, "malformed index row: {msg}"),
        }
    }
}

impl std::error::Error for EncodingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Bson(e) => Some(e),
            _ => None,
        }
    }
}

impl From<bson::error::Error> for EncodingError {
    fn from(e: bson::error::Error) -> Self {
        Self::Bson(e)
    }
}

// ── IndexError ────────────────────────────────────────────────

#[derive(Debug)]
pub enum IndexError {
    Store(StoreError),
    Encoding(EncodingError),
    Filter(FilterParseError),
    Schema(SchemaError),
    Config(String),
    /// A query hint that cannot apply to this index.
    Hint(String),
}

impl fmt::Display for IndexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Store(e) => write!(f, "store error: {e}"),
            Self::Encoding(e) => write!(f, "encoding error: {e}"),
            Self::Filter(e) => write!(f, "{e}"),
            Self::Schema(e) => write!(f, "{e}"),
            Self::Config(msg) => write!(f, "invalid config: {msg}"),
            Self::Hint(msg) => write!(f, "invalid query hint: {msg}"),
        }
    }
}

impl std::error::Error for IndexError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Store(e) => Some(e),
            Self::Encoding(e) => Some(e),
            Self::Filter(e) => Some(e),
            Self::Schema(e) => Some(e),
            Self::Config(_) | Self::Hint(_) => None,
        }
    }
}

impl From<StoreError> for IndexError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

impl From<EncodingError> for IndexError {
    fn from(e: EncodingError) -> Self {
        Self::Encoding(e)
    }
}

impl From<FilterParseError> for IndexError {
    fn from(e: FilterParseError) -> Self {
        Self::Filter(e)
    }
}

impl From<SchemaError> for IndexError {
    fn from(e: SchemaError) -> Self {
        Self::Schema(e)
    }
}

impl From<bson::error::Error> for IndexError {
    fn from(e: bson::error::Error) -> Self {
        Self::Encoding(EncodingError::Bson(e))
    }
}
