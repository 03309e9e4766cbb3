use lode_query::{Filter, Query};
use lode_store::{ByteRange, Scanner, Store};

use crate::codec::{BUCKET_WIDTH, RowKeyCodec};
use crate::config::IndexConfig;
use crate::error::IndexError;
use crate::iterators::{
    AttributeIndexIterator, BucketSkipIterator, RecordFilterIterator, SpatioTemporalFilter,
    UniqueRowIterator,
};
use crate::layout::{FAMILY, TableLayout};
use crate::planner::QueryPlan;
use crate::residual::split_spatio_temporal;
use crate::stream::{FeatureStream, JoinIter};
use crate::strategy::AttributeStrategy;
use crate::trigger::{CoverageTrigger, IndexOnlyTrigger};

/// Turns a [`QueryPlan`] into scans against the store.
///
/// Attribute plans run either index-only, answering from the index rows
/// through the `attribute-index` operator, or as a join that looks every
/// index entry up in the record table. Which one is up to the
/// [`IndexOnlyTrigger`].
pub struct ScanPipeline<'a, S: Store> {
    store: &'a S,
    layout: &'a TableLayout,
    codec: &'a RowKeyCodec,
    config: &'a IndexConfig,
    trigger: &'a dyn IndexOnlyTrigger,
}

impl<'a, S: Store> ScanPipeline<'a, S> {
    pub fn new(
        store: &'a S,
        layout: &'a TableLayout,
        codec: &'a RowKeyCodec,
        config: &'a IndexConfig,
    ) -> Self {
        Self {
            store,
            layout,
            codec,
            config,
            trigger: &CoverageTrigger,
        }
    }

    pub fn with_trigger(mut self, trigger: &'a dyn IndexOnlyTrigger) -> Self {
        self.trigger = trigger;
        self
    }

    /// Start executing `plan`. Store errors while opening the scans are
    /// returned here; later ones come out of the stream.
    pub fn execute(&self, plan: &QueryPlan, query: &Query) -> Result<FeatureStream, IndexError> {
        match plan {
            QueryPlan::Empty => Ok(FeatureStream::empty()),
            QueryPlan::FullScan { filter } => self.full_scan(filter, query),
            QueryPlan::Attribute { decision, residual } => {
                if decision.strategy.range.is_empty() {
                    tracing::debug!(
                        attribute = %decision.strategy.attribute,
                        "empty range, nothing to scan"
                    );
                    return Ok(FeatureStream::empty());
                }
                self.attribute_scan(&decision.strategy, residual, query)
            }
        }
    }

    fn full_scan(&self, filter: &Filter, query: &Query) -> Result<FeatureStream, IndexError> {
        if query.unique {
            tracing::debug!("distinct values need an attribute scan, returning every match");
        }
        let mut scanner = self.records_scanner(self.layout.record_range())?;
        if let Some(setting) = RecordFilterIterator::setting(filter, query.properties.as_deref())? {
            scanner.add_iterator(setting)?;
        }
        Ok(FeatureStream::decoded(scanner.execute()?))
    }

    fn attribute_scan(
        &self,
        strategy: &AttributeStrategy,
        residual: &Filter,
        query: &Query,
    ) -> Result<FeatureStream, IndexError> {
        let schema = self.codec.schema();
        let attribute = strategy.attribute.as_str();
        let (spatio_temporal, other) = split_spatio_temporal(residual, schema);
        let index_only =
            self.config.index_only && self.trigger.index_only(query, &other, schema, attribute);
        let multi_valued = schema.descriptor(attribute).is_some_and(|d| d.is_multi_valued());
        let dedup = multi_valued && !self.config.dedup_free_index && !query.unique;
        let properties = query.properties.as_deref();

        let buckets = match &query.hints.accepted_suffixes {
            Some(buckets) => Some(BucketSkipIterator::setting(
                bucket_suffixes(buckets)?,
                self.config.max_reseeks,
            )?),
            None => None,
        };

        let mut index = self.store.open_scan(&self.layout.index_table)?;
        index.set_range(strategy.range.clone());
        index.fetch_family(FAMILY);
        if let Some(setting) = buckets {
            index.add_iterator(setting)?;
        }

        let stream = if index_only {
            index.add_iterator(AttributeIndexIterator::setting(
                self.codec,
                attribute,
                &spatio_temporal,
                properties,
            )?)?;
            if query.unique {
                index.add_iterator(UniqueRowIterator::setting())?;
            }
            trace_stack(&index);
            FeatureStream::decoded(index.execute()?)
        } else {
            if spatio_temporal != Filter::Include {
                index.add_iterator(SpatioTemporalFilter::setting(&spatio_temporal)?)?;
            }
            let mut records = self.records_scanner(ByteRange::empty())?;
            if let Some(setting) = RecordFilterIterator::setting(&other, properties)? {
                records.add_iterator(setting)?;
            }
            trace_stack(&index);
            trace_stack(&records);
            let index = index.execute()?;
            let records = records.execute()?;
            FeatureStream::new(JoinIter::new(index, records, self.layout.clone(), query.unique))
        };

        tracing::debug!(
            attribute = %attribute,
            index_only,
            dedup,
            unique = query.unique,
            "executing attribute scan"
        );
        Ok(if dedup { stream.deduplicated() } else { stream })
    }

    fn records_scanner(&self, range: ByteRange) -> Result<Scanner, IndexError> {
        let mut scanner = self.store.open_scan(&self.layout.record_table)?;
        scanner.set_range(range);
        scanner.fetch_family(FAMILY);
        Ok(scanner)
    }
}

/// Index rows end in a single bucket byte; any other suffix width would
/// split rows in the middle of their value.
fn bucket_suffixes(suffixes: &[Vec<u8>]) -> Result<&[Vec<u8>], IndexError> {
    match suffixes.iter().find(|s| s.len() != BUCKET_WIDTH) {
        Some(bad) => Err(IndexError::Hint(format!(
            "accepted suffix {bad:?} is not a {BUCKET_WIDTH}-byte bucket"
        ))),
        None => Ok(suffixes),
    }
}

fn trace_stack(scanner: &Scanner) {
    for setting in scanner.iterators() {
        tracing::debug!(
            table = %scanner.table(),
            kind = %setting.kind,
            priority = setting.priority,
            "pushed operator"
        );
    }
}
