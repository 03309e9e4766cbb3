use bson::Document;
use lode_store::{BatchWriter, ByteRange, Key, Store};

use crate::codec::RowKeyCodec;
use crate::error::IndexError;
use crate::feature::Feature;
use crate::layout::{FAMILY, TableLayout};

/// Writes features to the record table and keeps their index rows in
/// step.
///
/// Writing a feature that already exists replaces it: index rows of the
/// old version are deleted before the new ones go in. The record table is
/// flushed before the index table, so a reader may briefly see a record
/// whose index rows are stale but never index rows without a record.
///
/// Concurrent writers of the same ids must be serialized by the caller;
/// [`crate::AttributeIndex`] does so.
pub struct IndexWriter<'a, S: Store> {
    store: &'a S,
    layout: &'a TableLayout,
    codec: &'a RowKeyCodec,
}

impl<'a, S: Store> IndexWriter<'a, S> {
    pub fn new(store: &'a S, layout: &'a TableLayout, codec: &'a RowKeyCodec) -> Self {
        Self {
            store,
            layout,
            codec,
        }
    }

    pub fn write(&self, features: &[Feature]) -> Result<(), IndexError> {
        let previous = self.existing(features.iter().map(|f| f.id.as_str()))?;

        let mut entries = Vec::new();
        for feature in features {
            entries.extend(self.index_entries(feature)?);
        }
        let mut stale = Vec::new();
        for feature in &previous {
            stale.extend(self.index_entries(feature)?.into_iter().map(|(key, _)| key));
        }

        let mut records = self.store.writer(&self.layout.record_table)?;
        for feature in features {
            records.put(self.record_key(&feature.id), feature.to_bytes()?)?;
        }
        records.flush()?;

        let mut index = self.store.writer(&self.layout.index_table)?;
        for key in &stale {
            index.delete(key)?;
        }
        for (key, value) in entries {
            index.put(key, value)?;
        }
        index.flush()?;

        tracing::debug!(
            written = features.len(),
            replaced = previous.len(),
            table = %self.layout.index_table,
            "wrote features"
        );
        Ok(())
    }

    /// Delete features and their index rows. Unknown ids are ignored.
    pub fn remove(&self, ids: &[&str]) -> Result<(), IndexError> {
        let previous = self.existing(ids.iter().copied())?;
        if previous.is_empty() {
            return Ok(());
        }

        let mut stale = Vec::new();
        for feature in &previous {
            stale.extend(self.index_entries(feature)?.into_iter().map(|(key, _)| key));
        }

        let mut records = self.store.writer(&self.layout.record_table)?;
        for feature in &previous {
            records.delete(&self.record_key(&feature.id))?;
        }
        records.flush()?;

        let mut index = self.store.writer(&self.layout.index_table)?;
        for key in &stale {
            index.delete(key)?;
        }
        index.flush()?;

        tracing::debug!(removed = previous.len(), "removed features");
        Ok(())
    }

    /// Every index entry of `feature`: one per indexed attribute value,
    /// each in the feature's bucket and carrying its default geometry and
    /// date.
    pub fn index_entries(&self, feature: &Feature) -> Result<Vec<(Key, Vec<u8>)>, IndexError> {
        let value = bson::serialize_to_vec(&self.index_value(feature))?;
        let mut entries = Vec::new();
        for descriptor in self.codec.schema().descriptors() {
            if !descriptor.indexed {
                continue;
            }
            for row in self.codec.index_rows(&descriptor.name, feature.get(&descriptor.name), &feature.id)? {
                entries.push((
                    Key::new(row, FAMILY, feature.id.as_bytes()),
                    value.clone(),
                ));
            }
        }
        Ok(entries)
    }

    fn index_value(&self, feature: &Feature) -> Document {
        let schema = self.codec.schema();
        let mut value = Document::new();
        for name in [schema.default_geometry(), schema.default_date()].into_iter().flatten() {
            if let Some(v) = feature.get(name) {
                value.insert(name, v.clone());
            }
        }
        value
    }

    fn record_key(&self, id: &str) -> Key {
        Key::new(self.layout.record_row(id), FAMILY, Vec::<u8>::new())
    }

    /// Current stored versions of the given ids.
    fn existing<'i>(&self, ids: impl IntoIterator<Item = &'i str>) -> Result<Vec<Feature>, IndexError> {
        let mut scanner = self.store.open_scan(&self.layout.record_table)?;
        scanner.set_range(ByteRange::empty());
        scanner.fetch_family(FAMILY);
        let mut scan = scanner.execute()?;

        let mut found = Vec::new();
        for id in ids {
            scan.seek(ByteRange::exact(self.layout.record_row(id)))?;
            if let Some(entry) = scan.next() {
                let (_, value) = entry?;
                found.push(Feature::from_bytes(&value)?);
            }
        }
        Ok(found)
    }
}
