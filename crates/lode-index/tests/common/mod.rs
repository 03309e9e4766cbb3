#![allow(dead_code)]

use bson::{Bson, DateTime, doc};
use lode_index::{AttributeIndex, Feature, FeatureStream, IndexConfig, TableLayout};
use lode_query::FeatureSchema;
use lode_store::{MemoryStore, Store};

pub const SCHEMA: &str = "name:String:index=true:cardinality=high,age:Int:index=true,\
                          tags:List[String]:index=true,score:Double,dtg:Date,*geom:Point";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn schema() -> FeatureSchema {
    FeatureSchema::parse("people", SCHEMA).unwrap()
}

pub fn day(n: i64) -> DateTime {
    DateTime::from_millis(1_704_067_200_000 + n * 86_400_000)
}

pub fn temp_index(config: IndexConfig) -> AttributeIndex<MemoryStore> {
    init_tracing();
    let layout = TableLayout::for_type("test", "people").with_sharing(*b"\x01");
    AttributeIndex::new(MemoryStore::new(), schema(), layout, config).unwrap()
}

/// Five people:
///
/// | id | name  | age | tags            | geom   | dtg   |
/// |----|-------|-----|-----------------|--------|-------|
/// | f1 | alice | 30  | red, blue       | 1, 1   | day 0 |
/// | f2 | bob   | 12  | blue            | 5, 5   | day 1 |
/// | f3 | carol | 45  | red             | 9, 9   | day 2 |
/// | f4 | dave  | 30  | (empty)         | 2, 2   | day 3 |
/// | f5 | -     | 51  | green           | 3, 3   | day 4 |
pub fn people() -> Vec<Feature> {
    vec![
        Feature::new(
            "f1",
            doc! { "name": "alice", "age": 30, "tags": ["red", "blue"], "score": 1.5, "dtg": day(0), "geom": [1.0, 1.0] },
        ),
        Feature::new(
            "f2",
            doc! { "name": "bob", "age": 12, "tags": ["blue"], "score": 0.5, "dtg": day(1), "geom": [5.0, 5.0] },
        ),
        Feature::new(
            "f3",
            doc! { "name": "carol", "age": 45, "tags": ["red"], "score": 3.0, "dtg": day(2), "geom": [9.0, 9.0] },
        ),
        Feature::new(
            "f4",
            doc! { "name": "dave", "age": 30, "tags": [], "score": 2.0, "dtg": day(3), "geom": [2.0, 2.0] },
        ),
        Feature::new(
            "f5",
            doc! { "age": 51, "tags": ["green"], "score": 4.0, "dtg": day(4), "geom": [3.0, 3.0] },
        ),
    ]
}

pub fn seeded_index(config: IndexConfig) -> AttributeIndex<MemoryStore> {
    let index = temp_index(config);
    index.write(&people()).unwrap();
    index
}

pub fn collect(stream: FeatureStream) -> Vec<Feature> {
    stream.collect::<Result<Vec<_>, _>>().unwrap()
}

pub fn ids(stream: FeatureStream) -> Vec<String> {
    collect(stream).into_iter().map(|f| f.id).collect()
}

pub fn sorted_ids(stream: FeatureStream) -> Vec<String> {
    let mut ids = ids(stream);
    ids.sort();
    ids
}

pub fn opened(index: &AttributeIndex<MemoryStore>) -> u64 {
    index.store().scan_counts().opened
}

pub fn value<'a>(feature: &'a Feature, name: &str) -> Option<&'a Bson> {
    feature.attributes.get(name)
}
