//! Operators pushed into store scans.
//!
//! Each operator is a [`SortedKvIterator`] wrapping the one below it and
//! is configured entirely through string options, so a scan can be
//! described by its [`IteratorSetting`]s alone. Lower priorities sit
//! closer to the table.

mod attribute;
mod bucket;
mod record_filter;
mod st_filter;
mod unique;

use lode_store::{ByteRange, IteratorRegistry, IteratorSetting, Key, SortedKvIterator, StoreError};
use serde::Serialize;
use serde::de::DeserializeOwned;

pub use attribute::{AttributeIndexIterator, IndexToFeature};
pub use bucket::BucketSkipIterator;
pub use record_filter::{RecordFilterIterator, RecordTransform};
pub use st_filter::{IndexValueFilter, SpatioTemporalFilter};
pub use unique::UniqueRowIterator;

pub const BUCKET_SKIP: &str = "bucket-skip";
pub const ST_FILTER: &str = "st-filter";
pub const RECORD_FILTER: &str = "record-filter";
pub const ATTRIBUTE_INDEX: &str = "attribute-index";
pub const ATTRIBUTE_UNIQUE: &str = "attribute-unique";

pub const BUCKET_SKIP_PRIORITY: u32 = 5;
pub const ST_FILTER_PRIORITY: u32 = 25;
pub const RECORD_FILTER_PRIORITY: u32 = 25;
pub const ATTRIBUTE_INDEX_PRIORITY: u32 = 30;
pub const ATTRIBUTE_UNIQUE_PRIORITY: u32 = 40;

pub(crate) const OPT_SCHEMA: &str = "schema";
pub(crate) const OPT_SHARING: &str = "sharing";
pub(crate) const OPT_ATTRIBUTE: &str = "attribute";
pub(crate) const OPT_FILTER: &str = "filter";
pub(crate) const OPT_PROPERTIES: &str = "properties";
pub(crate) const OPT_SUFFIXES: &str = "suffixes";
pub(crate) const OPT_MAX_RESEEKS: &str = "max_reseeks";

/// Make every operator available to scans built from `registry`.
pub fn register_iterators(registry: &IteratorRegistry) -> Result<(), StoreError> {
    registry.register(BUCKET_SKIP, |source, setting| {
        Ok(Box::new(BucketSkipIterator::from_setting(source, setting)?))
    })?;
    registry.register(ST_FILTER, |source, setting| {
        Ok(Box::new(SpatioTemporalFilter::from_setting(source, setting)?))
    })?;
    registry.register(RECORD_FILTER, |source, setting| {
        Ok(Box::new(RecordFilterIterator::from_setting(source, setting)?))
    })?;
    registry.register(ATTRIBUTE_INDEX, |source, setting| {
        Ok(Box::new(AttributeIndexIterator::from_setting(source, setting)?))
    })?;
    registry.register(ATTRIBUTE_UNIQUE, |source, _setting| {
        Ok(Box::new(UniqueRowIterator::new(source)))
    })?;
    tracing::debug!("registered attribute index iterators");
    Ok(())
}

// ── Options ───────────────────────────────────────────────────

pub(crate) fn encode_option<T: Serialize>(value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(|e| StoreError::Iterator(format!("encode option: {e}")))
}

pub(crate) fn decode_option<T: DeserializeOwned>(setting: &IteratorSetting, key: &str) -> Result<T, StoreError> {
    let raw = setting.require(key)?;
    serde_json::from_str(raw)
        .map_err(|e| StoreError::Iterator(format!("{}: bad option '{key}': {e}", setting.name)))
}

pub(crate) fn decode_optional<T: DeserializeOwned>(
    setting: &IteratorSetting,
    key: &str,
) -> Result<Option<T>, StoreError> {
    match setting.option(key) {
        Some(_) => decode_option(setting, key).map(Some),
        None => Ok(None),
    }
}

// ── TransformIterator ─────────────────────────────────────────

/// Per-entry rewrite applied by a filtering operator: `None` drops the
/// entry, `Some(value)` keeps it with a (possibly new) value.
pub trait EntryTransform: Clone + Send + 'static {
    fn apply(&self, key: &Key, value: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;
}

/// Generic filter/transform operator: exposes only the entries its
/// transform keeps, with the transformed values.
pub struct TransformIterator<T> {
    source: Box<dyn SortedKvIterator>,
    transform: T,
    top: Option<(Key, Vec<u8>)>,
}

impl<T: EntryTransform> TransformIterator<T> {
    pub fn new(source: Box<dyn SortedKvIterator>, transform: T) -> Self {
        Self {
            source,
            transform,
            top: None,
        }
    }

    /// Advance the source until an entry survives the transform.
    fn find_top(&mut self) -> Result<(), StoreError> {
        self.top = None;
        while let (Some(key), Some(value)) = (self.source.top_key(), self.source.top_value()) {
            if let Some(out) = self.transform.apply(key, value)? {
                self.top = Some((key.clone(), out));
                return Ok(());
            }
            self.source.next()?;
        }
        Ok(())
    }
}

impl<T: EntryTransform> SortedKvIterator for TransformIterator<T> {
    fn seek(
        &mut self,
        range: &ByteRange,
        families: &[Vec<u8>],
        inclusive: bool,
    ) -> Result<(), StoreError> {
        self.source.seek(range, families, inclusive)?;
        self.find_top()
    }

    fn top_key(&self) -> Option<&Key> {
        self.top.as_ref().map(|(k, _)| k)
    }

    fn top_value(&self) -> Option<&[u8]> {
        self.top.as_ref().map(|(_, v)| v.as_slice())
    }

    fn next(&mut self) -> Result<(), StoreError> {
        if self.top.is_none() {
            return Ok(());
        }
        self.source.next()?;
        self.find_top()
    }

    fn deep_copy(&self) -> Result<Box<dyn SortedKvIterator>, StoreError> {
        Ok(Box::new(Self {
            source: self.source.deep_copy()?,
            transform: self.transform.clone(),
            top: self.top.clone(),
        }))
    }
}
