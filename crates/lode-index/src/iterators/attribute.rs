use std::sync::Arc;

use bson::{Bson, Document};
use lode_query::{FeatureSchema, Filter, Predicate};
use lode_store::{IteratorSetting, Key, SortedKvIterator, StoreError};

use super::{
    ATTRIBUTE_INDEX, ATTRIBUTE_INDEX_PRIORITY, EntryTransform, OPT_ATTRIBUTE, OPT_FILTER, OPT_PROPERTIES,
    OPT_SCHEMA, OPT_SHARING, TransformIterator, decode_option, decode_optional, encode_option,
};
use crate::codec::RowKeyCodec;
use crate::feature::Feature;

/// Turns index entries into serialized features, so a covered query can
/// be answered without touching the record table.
///
/// The feature is rebuilt from the value decoded out of the row plus the
/// default geometry and date stored in the entry value, then filtered and
/// projected.
pub type AttributeIndexIterator = TransformIterator<IndexToFeature>;

#[derive(Clone)]
pub struct IndexToFeature {
    codec: RowKeyCodec,
    attribute: String,
    predicate: Predicate,
    properties: Option<Vec<String>>,
}

impl IndexToFeature {
    pub fn new(
        codec: RowKeyCodec,
        attribute: impl Into<String>,
        filter: Option<&Filter>,
        properties: Option<Vec<String>>,
    ) -> Result<Self, StoreError> {
        let predicate = match filter {
            Some(f) => Predicate::compile(f).map_err(|e| StoreError::Iterator(e.to_string()))?,
            None => Predicate::default(),
        };
        Ok(Self {
            codec,
            attribute: attribute.into(),
            predicate,
            properties,
        })
    }
}

impl EntryTransform for IndexToFeature {
    fn apply(&self, key: &Key, value: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        let (name, decoded) = self
            .codec
            .decode_row(&key.row)
            .map_err(|e| StoreError::Iterator(e.to_string()))?;
        if name != self.attribute {
            return Ok(None);
        }
        let stored: Document = bson::deserialize_from_slice(value)
            .map_err(|e| StoreError::Iterator(format!("index value: {e}")))?;

        let mut attributes = Document::new();
        if decoded != Bson::Null {
            attributes.insert(name, decoded);
        }
        for (k, v) in stored {
            attributes.insert(k, v);
        }
        if !self.predicate.matches(&attributes) {
            return Ok(None);
        }

        let id = String::from_utf8(key.qualifier.clone())
            .map_err(|_| StoreError::Iterator("feature id is not utf-8".into()))?;
        let mut feature = Feature::new(id, attributes);
        if let Some(properties) = &self.properties {
            feature = feature.project(properties);
        }
        feature
            .to_bytes()
            .map(Some)
            .map_err(|e| StoreError::Iterator(e.to_string()))
    }
}

impl TransformIterator<IndexToFeature> {
    pub fn from_setting(
        source: Box<dyn SortedKvIterator>,
        setting: &IteratorSetting,
    ) -> Result<Self, StoreError> {
        let schema: FeatureSchema = decode_option(setting, OPT_SCHEMA)?;
        let sharing: Vec<u8> = decode_option(setting, OPT_SHARING)?;
        let attribute = setting.require(OPT_ATTRIBUTE)?;
        let filter: Option<Filter> = decode_optional(setting, OPT_FILTER)?;
        let properties = decode_optional(setting, OPT_PROPERTIES)?;
        let codec = RowKeyCodec::new(Arc::new(schema), sharing);
        Ok(Self::new(
            source,
            IndexToFeature::new(codec, attribute, filter.as_ref(), properties)?,
        ))
    }

    /// `filter` is applied to the rebuilt feature; pass `Include` when the
    /// scan range already answers everything.
    pub fn setting(
        codec: &RowKeyCodec,
        attribute: &str,
        filter: &Filter,
        properties: Option<&[String]>,
    ) -> Result<IteratorSetting, StoreError> {
        let mut setting = IteratorSetting::new(ATTRIBUTE_INDEX_PRIORITY, "attribute-index", ATTRIBUTE_INDEX)
            .with_option(OPT_SCHEMA, encode_option(codec.schema())?)
            .with_option(OPT_SHARING, encode_option(&codec.sharing())?)
            .with_option(OPT_ATTRIBUTE, attribute);
        if *filter != Filter::Include {
            setting.add_option(OPT_FILTER, encode_option(filter)?);
        }
        if let Some(properties) = properties {
            setting.add_option(OPT_PROPERTIES, encode_option(&properties)?);
        }
        Ok(setting)
    }
}

#[cfg(test)]
mod tests {
    use bson::doc;
    use lode_store::{ByteRange, TableIterator};

    use super::*;

    fn codec() -> RowKeyCodec {
        let schema = FeatureSchema::parse("t", "name:String:index=true,dtg:Date,*geom:Point").unwrap();
        RowKeyCodec::new(Arc::new(schema), b"s".to_vec())
    }

    fn entry(codec: &RowKeyCodec, name: Option<&str>, id: &str, geom: [f64; 2]) -> (Key, Vec<u8>) {
        let value = name.map(|n| Bson::String(n.into()));
        let row = codec.index_rows("name", value.as_ref(), id).unwrap().remove(0);
        let stored = doc! { "geom": [geom[0], geom[1]] };
        (
            Key::new(row, b"F".to_vec(), id.as_bytes().to_vec()),
            bson::serialize_to_vec(&stored).unwrap(),
        )
    }

    fn features(iter: &mut dyn SortedKvIterator) -> Vec<Feature> {
        iter.seek(&ByteRange::all(), &[], false).unwrap();
        let mut out = Vec::new();
        while let Some(v) = iter.top_value() {
            out.push(Feature::from_bytes(v).unwrap());
            iter.next().unwrap();
        }
        out
    }

    #[test]
    fn rebuilds_features_from_rows() {
        let codec = codec();
        let table = TableIterator::from_entries([
            entry(&codec, Some("alice"), "f1", [1.0, 2.0]),
            entry(&codec, None, "f2", [3.0, 4.0]),
        ]);
        let setting = AttributeIndexIterator::setting(&codec, "name", &Filter::Include, None).unwrap();
        let mut iter = AttributeIndexIterator::from_setting(Box::new(table), &setting).unwrap();
        let out = features(&mut iter);
        assert_eq!(out.len(), 2);
        // The null marker sorts first.
        assert_eq!(out[0], Feature::new("f2", doc! { "geom": [3.0, 4.0] }));
        assert_eq!(
            out[1],
            Feature::new("f1", doc! { "name": "alice", "geom": [1.0, 2.0] })
        );
    }

    #[test]
    fn filters_on_stored_geometry_and_projects() {
        let codec = codec();
        let table = TableIterator::from_entries([
            entry(&codec, Some("alice"), "f1", [1.0, 1.0]),
            entry(&codec, Some("bob"), "f2", [50.0, 50.0]),
        ]);
        let bbox = Filter::bbox("geom", 0.0, 0.0, 10.0, 10.0);
        let properties = vec!["name".to_string()];
        let setting =
            AttributeIndexIterator::setting(&codec, "name", &bbox, Some(properties.as_slice())).unwrap();
        let mut iter = AttributeIndexIterator::from_setting(Box::new(table), &setting).unwrap();
        assert_eq!(features(&mut iter), vec![Feature::new("f1", doc! { "name": "alice" })]);
    }
}
