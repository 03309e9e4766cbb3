use std::fmt;

use lode_query::Filter;

use crate::codec::RowKeyCodec;
use crate::error::EncodingError;
use crate::residual::strip;
use crate::strategy::{CostEstimator, StrategyDecision, StrategySelector};

/// How a query's filter will be answered.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryPlan {
    /// The filter can match nothing.
    Empty,
    /// No attribute strategy applies; scan every record.
    FullScan { filter: Filter },
    /// Scan one attribute's index rows; `residual` is what the scan does
    /// not already guarantee.
    Attribute {
        decision: StrategyDecision,
        residual: Filter,
    },
}

impl fmt::Display for QueryPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryPlan::Empty => write!(f, "empty"),
            QueryPlan::FullScan { .. } => write!(f, "full record scan"),
            QueryPlan::Attribute { decision, residual } => {
                write!(f, "{decision}")?;
                if *residual != Filter::Include {
                    write!(f, " with residual filter")?;
                }
                Ok(())
            }
        }
    }
}

/// Picks the cheapest attribute strategy among a filter's top-level
/// conjuncts.
pub struct QueryPlanner<'a> {
    selector: StrategySelector<'a>,
}

impl<'a> QueryPlanner<'a> {
    pub fn new(codec: &'a RowKeyCodec, estimator: &'a dyn CostEstimator) -> Self {
        Self {
            selector: StrategySelector::new(codec, estimator),
        }
    }

    /// Ties keep the earliest conjunct.
    pub fn plan(&self, filter: &Filter) -> Result<QueryPlan, EncodingError> {
        if *filter == Filter::Exclude {
            return Ok(QueryPlan::Empty);
        }

        let mut best: Option<StrategyDecision> = None;
        for leaf in filter.conjuncts() {
            let Some(decision) = self.selector.select(leaf)? else {
                continue;
            };
            if best.as_ref().is_none_or(|b| decision.cost < b.cost) {
                best = Some(decision);
            }
        }

        let plan = match best {
            Some(decision) => {
                let residual = strip(filter, &decision.strategy.filter);
                QueryPlan::Attribute { decision, residual }
            }
            None => {
                if *filter != Filter::Include {
                    tracing::warn!("no attribute strategy applies, falling back to a full scan");
                }
                QueryPlan::FullScan {
                    filter: filter.clone(),
                }
            }
        };
        tracing::debug!(plan = %plan, "planned query");
        Ok(plan)
    }
}
