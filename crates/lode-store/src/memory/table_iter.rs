use std::ops::Bound;
use std::sync::Arc;

use crate::error::StoreError;
use crate::iterator::{SortedKvIterator, family_visible};
use crate::key::{ByteRange, Key};

use super::store::Table;

/// The bottom of every iterator stack: walks a table snapshot in key
/// order, honouring the seek range and column-family scope.
#[derive(Clone)]
pub struct TableIterator {
    data: Arc<Table>,
    range: ByteRange,
    families: Vec<Vec<u8>>,
    inclusive: bool,
    top: Option<(Key, Vec<u8>)>,
}

impl TableIterator {
    pub fn new(data: Arc<Table>) -> Self {
        Self {
            data,
            range: ByteRange::empty(),
            families: Vec::new(),
            inclusive: false,
            top: None,
        }
    }

    /// Build an iterator over an ad-hoc set of entries.
    pub fn from_entries(entries: impl IntoIterator<Item = (Key, Vec<u8>)>) -> Self {
        Self::new(Arc::new(entries.into_iter().collect()))
    }

    /// Position `top` at the first visible entry at or after `lower`.
    fn settle(&mut self, lower: Bound<Key>) {
        self.top = None;
        for (key, value) in self.data.range((lower, Bound::Unbounded)) {
            if self.range.is_past_end(&key.row) {
                return;
            }
            if !family_visible(&key.family, &self.families, self.inclusive) {
                continue;
            }
            self.top = Some((key.clone(), value.clone()));
            return;
        }
    }
}

impl SortedKvIterator for TableIterator {
    fn seek(
        &mut self,
        range: &ByteRange,
        families: &[Vec<u8>],
        inclusive: bool,
    ) -> Result<(), StoreError> {
        self.range = range.clone();
        self.families = families.to_vec();
        self.inclusive = inclusive;

        if range.is_empty() {
            self.top = None;
            return Ok(());
        }
        let lower = match &range.start {
            Bound::Unbounded => Bound::Unbounded,
            Bound::Included(row) => Bound::Included(Key::row_start(row.clone())),
            // The first row strictly after `row` is `row` followed by 0x00.
            Bound::Excluded(row) => {
                let mut next = row.clone();
                next.push(0x00);
                Bound::Included(Key::row_start(next))
            }
        };
        self.settle(lower);
        Ok(())
    }

    fn top_key(&self) -> Option<&Key> {
        self.top.as_ref().map(|(k, _)| k)
    }

    fn top_value(&self) -> Option<&[u8]> {
        self.top.as_ref().map(|(_, v)| v.as_slice())
    }

    fn next(&mut self) -> Result<(), StoreError> {
        let Some((key, _)) = self.top.take() else {
            return Ok(());
        };
        self.settle(Bound::Excluded(key));
        Ok(())
    }

    fn deep_copy(&self) -> Result<Box<dyn SortedKvIterator>, StoreError> {
        Ok(Box::new(self.clone()))
    }
}
