use lode_query::{FeatureSchema, Filter, Query};

/// Decides whether an attribute scan can answer a query from index rows
/// alone, without joining against the record table.
pub trait IndexOnlyTrigger: Send + Sync {
    /// `residual` is the non-spatio-temporal part of the filter left after
    /// the scanned predicate was stripped.
    fn index_only(&self, query: &Query, residual: &Filter, schema: &FeatureSchema, attribute: &str) -> bool;
}

/// Index rows carry the attribute value, the default geometry and the
/// default date. A query is covered when nothing else is filtered on and
/// nothing else is requested.
#[derive(Debug, Clone, Copy, Default)]
pub struct CoverageTrigger;

impl IndexOnlyTrigger for CoverageTrigger {
    fn index_only(&self, query: &Query, residual: &Filter, schema: &FeatureSchema, attribute: &str) -> bool {
        if *residual != Filter::Include {
            return false;
        }
        let Some(properties) = &query.properties else {
            return false;
        };
        if query.unique {
            return properties.iter().all(|p| p == attribute);
        }
        // One list element per row cannot rebuild the whole list.
        let multi_valued = schema.descriptor(attribute).is_some_and(|d| d.is_multi_valued());
        properties.iter().all(|p| {
            if p == attribute {
                !multi_valued
            } else {
                schema.is_spatio_temporal(p)
            }
        })
    }
}
