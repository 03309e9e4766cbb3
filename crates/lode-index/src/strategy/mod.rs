mod cost;
mod property;

use std::fmt;

use bson::Bson;
use lode_query::{AttributeType, CompareOp, Filter, TemporalOp, like_prefix};
use lode_store::ByteRange;

use crate::codec::RowKeyCodec;
use crate::error::EncodingError;
use crate::range::RangeBuilder;

pub use cost::{CardinalityCostEstimator, Cost, CostEstimator, CostHints, RangeShape};
pub use property::{PeriodRef, PropertyRef};

/// A decided attribute scan: the rows to read, the attribute they belong
/// to, and the predicate they answer (stripped from the residual later).
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeStrategy {
    pub attribute: String,
    pub range: ByteRange,
    pub filter: Filter,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StrategyDecision {
    pub strategy: AttributeStrategy,
    pub cost: Cost,
}

impl fmt::Display for StrategyDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.strategy.range.is_empty() { "empty " } else { "" };
        write!(
            f,
            "{kind}attribute scan on '{}' (cost {})",
            self.strategy.attribute, self.cost.0
        )
    }
}

/// Maps single predicate leaves to attribute-index scans.
pub struct StrategySelector<'a> {
    codec: &'a RowKeyCodec,
    estimator: &'a dyn CostEstimator,
}

impl<'a> StrategySelector<'a> {
    pub fn new(codec: &'a RowKeyCodec, estimator: &'a dyn CostEstimator) -> Self {
        Self { codec, estimator }
    }

    /// Decide whether `filter`, a single leaf, can be answered by scanning
    /// one attribute's index rows.
    ///
    /// `Ok(None)` means not applicable: the shape is unsupported, the
    /// attribute is unknown, unindexed or a geometry. An `Err` means the
    /// literal could not be encoded for the attribute's type.
    pub fn select(&self, filter: &Filter) -> Result<Option<StrategyDecision>, EncodingError> {
        let Some((attribute, range, hints)) = self.range_for(filter)? else {
            return Ok(None);
        };
        let Some(descriptor) = self.codec.schema().descriptor(&attribute) else {
            return Ok(None);
        };
        let cost = self.estimator.cost(descriptor, &hints);
        tracing::debug!(
            attribute = %attribute,
            cost = cost.0,
            shape = ?hints.shape,
            empty = range.is_empty(),
            "attribute strategy applies"
        );
        Ok(Some(StrategyDecision {
            strategy: AttributeStrategy {
                attribute,
                range,
                filter: filter.clone(),
            },
            cost,
        }))
    }

    fn indexed(&self, attribute: &str) -> bool {
        self.codec
            .schema()
            .descriptor(attribute)
            .is_some_and(|d| d.indexed && d.ty != AttributeType::Geometry)
    }

    fn range_for(&self, filter: &Filter) -> Result<Option<(String, ByteRange, CostHints)>, EncodingError> {
        let ranges = RangeBuilder::new(self.codec);
        let decided = match filter {
            Filter::Compare { left, op, right } => {
                let Some(p) = PropertyRef::extract(left, right) else {
                    return Ok(None);
                };
                if !self.indexed(&p.name) {
                    return Ok(None);
                }
                let op = if p.flipped { op.flip() } else { *op };
                match comparison(&ranges, &p.name, op, &p.literal)? {
                    Some((range, hints)) => (p.name, range, hints),
                    None => return Ok(None),
                }
            }
            Filter::Temporal { left, op, right } => {
                if let Some(p) = PropertyRef::extract(left, right) {
                    if !self.indexed(&p.name) {
                        return Ok(None);
                    }
                    let op = if p.flipped { op.flip() } else { *op };
                    let as_compare = match op {
                        TemporalOp::TEquals => CompareOp::Eq,
                        TemporalOp::After => CompareOp::Gt,
                        TemporalOp::Before => CompareOp::Lt,
                        TemporalOp::During => return Ok(None),
                    };
                    match comparison(&ranges, &p.name, as_compare, &p.literal)? {
                        Some((range, hints)) => (p.name, range, hints),
                        None => return Ok(None),
                    }
                } else if let Some(p) = PeriodRef::extract(left, right) {
                    if !self.indexed(&p.name) {
                        return Ok(None);
                    }
                    let start = Bson::DateTime(p.period.start);
                    let end = Bson::DateTime(p.period.end);
                    let decided = match (op, p.flipped) {
                        (TemporalOp::During, false) => {
                            let range = ranges.between(&p.name, &start, &end)?;
                            (range, CostHints::new(RangeShape::Bounded, Some(start), Some(end)))
                        }
                        // attribute before the period, or the period after the attribute
                        (TemporalOp::Before, false) | (TemporalOp::After, true) => {
                            let range = ranges.less(&p.name, &start, false)?;
                            (range, CostHints::new(RangeShape::OneSided, None, Some(start)))
                        }
                        (TemporalOp::After, false) | (TemporalOp::Before, true) => {
                            let range = ranges.greater(&p.name, &end, false)?;
                            (range, CostHints::new(RangeShape::OneSided, Some(end), None))
                        }
                        _ => return Ok(None),
                    };
                    (p.name, decided.0, decided.1)
                } else {
                    return Ok(None);
                }
            }
            Filter::Like {
                property,
                pattern,
                match_case,
            } => {
                if !*match_case || !self.indexed(property) || !self.is_string(property) {
                    return Ok(None);
                }
                let Some(prefix) = like_prefix(pattern) else {
                    return Ok(None);
                };
                let range = ranges.prefix(property, &prefix)?;
                let hint = Bson::String(prefix);
                (
                    property.clone(),
                    range,
                    CostHints::new(RangeShape::Prefix, Some(hint), None),
                )
            }
            Filter::Between {
                property,
                lower,
                upper,
            } => {
                if !self.indexed(property) {
                    return Ok(None);
                }
                let range = ranges.between(property, lower, upper)?;
                (
                    property.clone(),
                    range,
                    CostHints::new(RangeShape::Bounded, Some(lower.clone()), Some(upper.clone())),
                )
            }
            Filter::IsNull(property) | Filter::IsNil(property) => {
                if !self.indexed(property) {
                    return Ok(None);
                }
                (
                    property.clone(),
                    ranges.null(property)?,
                    CostHints::new(RangeShape::Null, None, None),
                )
            }
            _ => return Ok(None),
        };
        Ok(Some(decided))
    }

    fn is_string(&self, attribute: &str) -> bool {
        self.codec
            .schema()
            .descriptor(attribute)
            .is_some_and(|d| matches!(d.index_type(), AttributeType::String) || d.is_map())
    }
}

/// Range and hints for "attribute OP literal" with the attribute already
/// on the left.
fn comparison(
    ranges: &RangeBuilder<'_>,
    attribute: &str,
    op: CompareOp,
    literal: &Bson,
) -> Result<Option<(ByteRange, CostHints)>, EncodingError> {
    let lit = || Some(literal.clone());
    let decided = match op {
        CompareOp::Eq => (
            ranges.equals(attribute, literal)?,
            CostHints::new(RangeShape::Equality, lit(), lit()),
        ),
        CompareOp::Gt => (
            ranges.greater(attribute, literal, false)?,
            CostHints::new(RangeShape::OneSided, lit(), None),
        ),
        CompareOp::Gte => (
            ranges.greater(attribute, literal, true)?,
            CostHints::new(RangeShape::OneSided, lit(), None),
        ),
        CompareOp::Lt => (
            ranges.less(attribute, literal, false)?,
            CostHints::new(RangeShape::OneSided, None, lit()),
        ),
        CompareOp::Lte => (
            ranges.less(attribute, literal, true)?,
            CostHints::new(RangeShape::OneSided, None, lit()),
        ),
        CompareOp::Ne => return Ok(None),
    };
    Ok(Some(decided))
}
