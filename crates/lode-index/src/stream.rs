use std::collections::HashSet;

use lode_store::{ByteRange, ScanIter};

use crate::codec::value_key;
use crate::error::{EncodingError, IndexError};
use crate::feature::Feature;
use crate::layout::TableLayout;

// ── FeatureStream ─────────────────────────────────────────────

/// Lazy, single-pass sequence of query results.
///
/// The stream owns every scan it reads from; dropping it (or calling
/// [`FeatureStream::close`]) releases them, whether or not it was read
/// to the end.
pub struct FeatureStream {
    inner: Box<dyn Iterator<Item = Result<Feature, IndexError>> + Send>,
}

impl FeatureStream {
    pub(crate) fn new(
        inner: impl Iterator<Item = Result<Feature, IndexError>> + Send + 'static,
    ) -> Self {
        Self { inner: Box::new(inner) }
    }

    pub fn empty() -> Self {
        Self::new(std::iter::empty())
    }

    /// A stream over a scan whose values are serialized features.
    pub(crate) fn decoded(scan: ScanIter) -> Self {
        Self::new(scan.map(|entry| -> Result<Feature, IndexError> {
            let (_, value) = entry?;
            Ok(Feature::from_bytes(&value)?)
        }))
    }

    /// Drop results whose feature id was already emitted.
    pub(crate) fn deduplicated(self) -> Self {
        Self::new(Dedup {
            inner: self,
            seen: HashSet::new(),
        })
    }

    /// Release the underlying scans now.
    pub fn close(self) {}
}

impl Iterator for FeatureStream {
    type Item = Result<Feature, IndexError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

// ── Dedup ─────────────────────────────────────────────────────

/// Keeps the first result per feature id; order is otherwise unchanged.
struct Dedup<I> {
    inner: I,
    seen: HashSet<String>,
}

impl<I> Iterator for Dedup<I>
where
    I: Iterator<Item = Result<Feature, IndexError>>,
{
    type Item = Result<Feature, IndexError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.inner.next()? {
                Ok(feature) if !self.seen.insert(feature.id.clone()) => {
                    tracing::trace!(id = %feature.id, "dropping duplicate");
                }
                other => return Some(other),
            }
        }
    }
}

// ── Join ──────────────────────────────────────────────────────

/// Walks an index scan and looks each entry's feature up in the record
/// table as it goes.
///
/// Index entries carry the feature id in their qualifier. The record scan
/// is re-seeked to that one row per entry; an entry whose record is
/// missing or rejected by the record scan's operators yields nothing.
pub(crate) struct JoinIter {
    index: ScanIter,
    records: ScanIter,
    layout: TableLayout,
    /// One result per distinct attribute value, whatever bucket its rows
    /// are in.
    unique: bool,
    last_value: Option<Vec<u8>>,
    done: bool,
}

impl JoinIter {
    pub(crate) fn new(index: ScanIter, records: ScanIter, layout: TableLayout, unique: bool) -> Self {
        Self {
            index,
            records,
            layout,
            unique,
            last_value: None,
            done: false,
        }
    }

    fn lookup(&mut self, qualifier: &[u8]) -> Result<Option<Feature>, IndexError> {
        let id = std::str::from_utf8(qualifier)
            .map_err(|_| EncodingError::MalformedRow("feature id is not utf-8".into()))?;
        self.records.seek(ByteRange::exact(self.layout.record_row(id)))?;
        match self.records.next() {
            Some(entry) => {
                let (_, value) = entry?;
                Ok(Some(Feature::from_bytes(&value)?))
            }
            None => Ok(None),
        }
    }
}

impl Iterator for JoinIter {
    type Item = Result<Feature, IndexError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            let key = match self.index.next()? {
                Ok((key, _)) => key,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e.into()));
                }
            };
            if self.unique && self.last_value.as_deref() == Some(value_key(&key.row)) {
                continue;
            }
            match self.lookup(&key.qualifier) {
                Ok(Some(feature)) => {
                    if self.unique {
                        self.last_value = Some(value_key(&key.row).to_vec());
                    }
                    return Some(Ok(feature));
                }
                Ok(None) => continue,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}
