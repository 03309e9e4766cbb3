use lode_query::{FeatureSchema, Filter};

/// Remove the leaf answered by the index scan from the filter's top-level
/// conjunction. Only the first equal conjunct is removed.
pub fn strip(filter: &Filter, satisfied: &Filter) -> Filter {
    if filter == satisfied {
        return Filter::Include;
    }
    let mut removed = false;
    let rest = filter
        .conjuncts()
        .into_iter()
        .filter(|c| {
            if !removed && *c == satisfied {
                removed = true;
                false
            } else {
                true
            }
        })
        .cloned()
        .collect();
    Filter::and(rest)
}

/// Partition a residual into the conjuncts that only touch the default
/// geometry or date (answerable from index values) and everything else.
/// Returns `(spatio_temporal, other)`.
pub fn split_spatio_temporal(filter: &Filter, schema: &FeatureSchema) -> (Filter, Filter) {
    let (st, other): (Vec<&Filter>, Vec<&Filter>) = filter.conjuncts().into_iter().partition(|c| {
        let props = c.properties();
        !props.is_empty() && props.iter().all(|p| schema.is_spatio_temporal(p))
    });
    (
        Filter::and(st.into_iter().cloned().collect()),
        Filter::and(other.into_iter().cloned().collect()),
    )
}
