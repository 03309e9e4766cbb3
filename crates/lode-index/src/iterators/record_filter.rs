use lode_query::{Filter, Predicate};
use lode_store::{IteratorSetting, Key, SortedKvIterator, StoreError};

use super::{
    EntryTransform, OPT_FILTER, OPT_PROPERTIES, RECORD_FILTER, RECORD_FILTER_PRIORITY, TransformIterator,
    decode_optional, encode_option,
};
use crate::feature::Feature;

/// Applies a filter and a projection to serialized records.
pub type RecordFilterIterator = TransformIterator<RecordTransform>;

#[derive(Clone, Default)]
pub struct RecordTransform {
    predicate: Option<Predicate>,
    properties: Option<Vec<String>>,
}

impl RecordTransform {
    pub fn new(filter: Option<&Filter>, properties: Option<Vec<String>>) -> Result<Self, StoreError> {
        let predicate = match filter {
            Some(Filter::Include) | None => None,
            Some(f) => Some(Predicate::compile(f).map_err(|e| StoreError::Iterator(e.to_string()))?),
        };
        Ok(Self {
            predicate,
            properties,
        })
    }
}

impl EntryTransform for RecordTransform {
    fn apply(&self, _key: &Key, value: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        if self.predicate.is_none() && self.properties.is_none() {
            return Ok(Some(value.to_vec()));
        }
        let feature = Feature::from_bytes(value).map_err(|e| StoreError::Iterator(format!("record: {e}")))?;
        if let Some(predicate) = &self.predicate {
            if !predicate.matches(&feature.attributes) {
                return Ok(None);
            }
        }
        let Some(properties) = &self.properties else {
            return Ok(Some(value.to_vec()));
        };
        let projected = feature.project(properties);
        projected
            .to_bytes()
            .map(Some)
            .map_err(|e| StoreError::Iterator(format!("record: {e}")))
    }
}

impl TransformIterator<RecordTransform> {
    pub fn from_setting(
        source: Box<dyn SortedKvIterator>,
        setting: &IteratorSetting,
    ) -> Result<Self, StoreError> {
        let filter: Option<Filter> = decode_optional(setting, OPT_FILTER)?;
        let properties = decode_optional(setting, OPT_PROPERTIES)?;
        Ok(Self::new(source, RecordTransform::new(filter.as_ref(), properties)?))
    }

    /// `None` if there is nothing to filter or project.
    pub fn setting(
        filter: &Filter,
        properties: Option<&[String]>,
    ) -> Result<Option<IteratorSetting>, StoreError> {
        if *filter == Filter::Include && properties.is_none() {
            return Ok(None);
        }
        let mut setting = IteratorSetting::new(RECORD_FILTER_PRIORITY, "record-filter", RECORD_FILTER);
        if *filter != Filter::Include {
            setting.add_option(OPT_FILTER, encode_option(filter)?);
        }
        if let Some(properties) = properties {
            setting.add_option(OPT_PROPERTIES, encode_option(&properties)?);
        }
        Ok(Some(setting))
    }
}
