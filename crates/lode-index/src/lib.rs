//! Attribute secondary index over a sorted key-value store.
//!
//! Every indexed attribute value of a feature becomes one row in an index
//! table whose key sorts like the value. Queries are planned by picking
//! the cheapest attribute predicate, scanning its row range and either
//! answering from the index rows alone or joining each entry against the
//! record table.

mod codec;
mod config;
mod error;
mod feature;
pub mod iterators;
mod layout;
mod pipeline;
mod planner;
mod range;
mod residual;
mod strategy;
mod stream;
mod trigger;
mod writer;

use std::sync::{Arc, Mutex, MutexGuard};

use lode_query::{FeatureSchema, Filter, Query};
use lode_store::{Store, StoreError};

pub use codec::{BUCKET_WIDTH, DEFAULT_BUCKETS, RowKeyCodec, following_prefix, value_key};
pub use config::IndexConfig;
pub use error::{EncodingError, IndexError};
pub use feature::Feature;
pub use layout::{FAMILY, TableLayout};
pub use pipeline::ScanPipeline;
pub use planner::{QueryPlan, QueryPlanner};
pub use range::RangeBuilder;
pub use residual::{split_spatio_temporal, strip};
pub use strategy::{
    AttributeStrategy, CardinalityCostEstimator, Cost, CostEstimator, CostHints, PeriodRef, PropertyRef,
    RangeShape, StrategyDecision, StrategySelector,
};
pub use stream::FeatureStream;
pub use trigger::{CoverageTrigger, IndexOnlyTrigger};
pub use writer::IndexWriter;

// ── AttributeIndex ────────────────────────────────────────────

/// One feature type's attribute index: its tables, codec, cost model and
/// configuration bundled over a store.
///
/// Writes and removals through one index are serialized: each reads the
/// stored versions it replaces, and two interleaved writes of one id
/// would otherwise both miss the other's index rows.
pub struct AttributeIndex<S: Store> {
    store: S,
    layout: TableLayout,
    codec: RowKeyCodec,
    config: IndexConfig,
    estimator: Box<dyn CostEstimator>,
    trigger: Box<dyn IndexOnlyTrigger>,
    write_lock: Mutex<()>,
}

impl<S: Store> AttributeIndex<S> {
    /// Registers the index operators with the store and creates any
    /// missing tables.
    pub fn new(store: S, schema: FeatureSchema, layout: TableLayout, config: IndexConfig) -> Result<Self, IndexError> {
        config.validate()?;
        iterators::register_iterators(store.registry())?;
        layout.create_tables(&store)?;
        let codec = RowKeyCodec::new(Arc::new(schema), layout.sharing.clone()).with_buckets(config.buckets);
        tracing::info!(
            type_name = %codec.schema().type_name,
            index_table = %layout.index_table,
            record_table = %layout.record_table,
            buckets = codec.bucket_count(),
            "attribute index ready"
        );
        Ok(Self {
            store,
            layout,
            codec,
            config,
            estimator: Box::new(CardinalityCostEstimator),
            trigger: Box::new(CoverageTrigger),
            write_lock: Mutex::new(()),
        })
    }

    pub fn with_estimator(mut self, estimator: impl CostEstimator + 'static) -> Self {
        self.estimator = Box::new(estimator);
        self
    }

    pub fn with_trigger(mut self, trigger: impl IndexOnlyTrigger + 'static) -> Self {
        self.trigger = Box::new(trigger);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn layout(&self) -> &TableLayout {
        &self.layout
    }

    pub fn codec(&self) -> &RowKeyCodec {
        &self.codec
    }

    pub fn schema(&self) -> &FeatureSchema {
        self.codec.schema()
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn write(&self, features: &[Feature]) -> Result<(), IndexError> {
        let _guard = self.lock_writes()?;
        IndexWriter::new(&self.store, &self.layout, &self.codec).write(features)
    }

    pub fn remove(&self, ids: &[&str]) -> Result<(), IndexError> {
        let _guard = self.lock_writes()?;
        IndexWriter::new(&self.store, &self.layout, &self.codec).remove(ids)
    }

    fn lock_writes(&self) -> Result<MutexGuard<'_, ()>, IndexError> {
        self.write_lock
            .lock()
            .map_err(|e| StoreError::Storage(format!("index write lock poisoned: {e}")).into())
    }

    pub fn plan(&self, filter: &Filter) -> Result<QueryPlan, IndexError> {
        Ok(QueryPlanner::new(&self.codec, self.estimator.as_ref()).plan(filter)?)
    }

    /// Plan and start executing `query`.
    pub fn query(&self, query: &Query) -> Result<FeatureStream, IndexError> {
        let plan = self.plan(&query.filter)?;
        self.execute(&plan, query)
    }

    pub fn execute(&self, plan: &QueryPlan, query: &Query) -> Result<FeatureStream, IndexError> {
        ScanPipeline::new(&self.store, &self.layout, &self.codec, &self.config)
            .with_trigger(self.trigger.as_ref())
            .execute(plan, query)
    }
}
