use std::ops::Bound;

use lode_store::{ByteRange, IteratorSetting, Key, SortedKvIterator, StoreError, following_prefix};

use super::{ATTRIBUTE_UNIQUE, ATTRIBUTE_UNIQUE_PRIORITY};
use crate::codec::value_key;

/// Emits the first entry of every attribute value and seeks past the
/// rest, bucket rows included.
pub struct UniqueRowIterator {
    source: Box<dyn SortedKvIterator>,
    range: ByteRange,
    families: Vec<Vec<u8>>,
    inclusive: bool,
}

impl UniqueRowIterator {
    pub fn new(source: Box<dyn SortedKvIterator>) -> Self {
        Self {
            source,
            range: ByteRange::empty(),
            families: Vec::new(),
            inclusive: false,
        }
    }

    pub fn setting() -> IteratorSetting {
        IteratorSetting::new(ATTRIBUTE_UNIQUE_PRIORITY, "attribute-unique", ATTRIBUTE_UNIQUE)
    }
}

impl SortedKvIterator for UniqueRowIterator {
    fn seek(
        &mut self,
        range: &ByteRange,
        families: &[Vec<u8>],
        inclusive: bool,
    ) -> Result<(), StoreError> {
        self.range = range.clone();
        self.families = families.to_vec();
        self.inclusive = inclusive;
        self.source.seek(range, families, inclusive)
    }

    fn top_key(&self) -> Option<&Key> {
        self.source.top_key()
    }

    fn top_value(&self) -> Option<&[u8]> {
        self.source.top_value()
    }

    fn next(&mut self) -> Result<(), StoreError> {
        let Some(top) = self.source.top_key() else {
            return Ok(());
        };
        let past_value = match following_prefix(value_key(&top.row)) {
            Some(next) => ByteRange::new(Bound::Included(next), Bound::Unbounded),
            None => ByteRange::empty(),
        };
        let range = self.range.clip(&past_value);
        self.source.seek(&range, &self.families, self.inclusive)
    }

    fn deep_copy(&self) -> Result<Box<dyn SortedKvIterator>, StoreError> {
        Ok(Box::new(Self {
            source: self.source.deep_copy()?,
            range: self.range.clone(),
            families: self.families.clone(),
            inclusive: self.inclusive,
        }))
    }
}
