use bson::Document;
use lode_query::{Filter, Predicate};
use lode_store::{IteratorSetting, Key, SortedKvIterator, StoreError};

use super::{
    EntryTransform, OPT_FILTER, ST_FILTER, ST_FILTER_PRIORITY, TransformIterator, decode_option,
    encode_option,
};

/// Drops index entries whose stored default geometry and date do not
/// satisfy a filter. Values pass through unchanged.
pub type SpatioTemporalFilter = TransformIterator<IndexValueFilter>;

#[derive(Clone)]
pub struct IndexValueFilter {
    predicate: Predicate,
}

impl IndexValueFilter {
    pub fn new(filter: &Filter) -> Result<Self, StoreError> {
        let predicate = Predicate::compile(filter).map_err(|e| StoreError::Iterator(e.to_string()))?;
        Ok(Self { predicate })
    }
}

impl EntryTransform for IndexValueFilter {
    fn apply(&self, _key: &Key, value: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        let stored: Document = bson::deserialize_from_slice(value)
            .map_err(|e| StoreError::Iterator(format!("index value: {e}")))?;
        Ok(self.predicate.matches(&stored).then(|| value.to_vec()))
    }
}

impl TransformIterator<IndexValueFilter> {
    pub fn from_setting(
        source: Box<dyn SortedKvIterator>,
        setting: &IteratorSetting,
    ) -> Result<Self, StoreError> {
        let filter: Filter = decode_option(setting, OPT_FILTER)?;
        Ok(Self::new(source, IndexValueFilter::new(&filter)?))
    }

    pub fn setting(filter: &Filter) -> Result<IteratorSetting, StoreError> {
        Ok(IteratorSetting::new(ST_FILTER_PRIORITY, "st-filter", ST_FILTER)
            .with_option(OPT_FILTER, encode_option(filter)?))
    }
}

#[cfg(test)]
mod tests {
    use bson::doc;
    use lode_store::{ByteRange, TableIterator};

    use super::*;

    fn entry(row: &str, value: Document) -> (Key, Vec<u8>) {
        (
            Key::new(row.as_bytes().to_vec(), b"F".to_vec(), b"id".to_vec()),
            bson::serialize_to_vec(&value).unwrap(),
        )
    }

    #[test]
    fn keeps_entries_inside_the_box() {
        let table = TableIterator::from_entries([
            entry("a", doc! { "geom": [1.0, 1.0] }),
            entry("b", doc! { "geom": [9.0, 9.0] }),
            entry("c", doc! { "geom": [2.0, 0.5] }),
        ]);
        let setting = SpatioTemporalFilter::setting(&Filter::bbox("geom", 0.0, 0.0, 5.0, 5.0)).unwrap();
        let mut iter = SpatioTemporalFilter::from_setting(Box::new(table), &setting).unwrap();
        iter.seek(&ByteRange::all(), &[], false).unwrap();

        let mut rows = Vec::new();
        while let Some(k) = iter.top_key() {
            rows.push(k.row.clone());
            iter.next().unwrap();
        }
        assert_eq!(rows, vec![b"a".to_vec(), b"c".to_vec()]);
    }

    #[test]
    fn missing_filter_option_is_rejected() {
        let table = TableIterator::from_entries(Vec::<(Key, Vec<u8>)>::new());
        let setting = IteratorSetting::new(ST_FILTER_PRIORITY, "st", ST_FILTER);
        assert!(SpatioTemporalFilter::from_setting(Box::new(table), &setting).is_err());
    }
}
