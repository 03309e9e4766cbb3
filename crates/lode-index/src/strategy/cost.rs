use bson::Bson;
use lode_query::{AttributeDescriptor, Cardinality};

/// Relative selectivity estimate; lower is cheaper. Only comparisons
/// between decisions for the same query are meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Cost(pub u64);

/// The shape of the range a strategy scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeShape {
    Equality,
    Bounded,
    OneSided,
    Prefix,
    Null,
}

/// Bound hints handed to a [`CostEstimator`], already corrected for
/// operand order: `lower` is always the smaller end.
#[derive(Debug, Clone, PartialEq)]
pub struct CostHints {
    pub shape: RangeShape,
    pub lower: Option<Bson>,
    pub upper: Option<Bson>,
}

impl CostHints {
    pub fn new(shape: RangeShape, lower: Option<Bson>, upper: Option<Bson>) -> Self {
        Self { shape, lower, upper }
    }
}

pub trait CostEstimator: Send + Sync {
    fn cost(&self, descriptor: &AttributeDescriptor, hints: &CostHints) -> Cost;
}

/// Ranks by range shape, scaled by the descriptor's cardinality hint:
/// equality < bounded < one-sided < prefix < null, and a high-cardinality
/// attribute is cheaper than an unknown one, which is cheaper than a
/// low-cardinality one.
#[derive(Debug, Clone, Copy, Default)]
pub struct CardinalityCostEstimator;

impl CostEstimator for CardinalityCostEstimator {
    fn cost(&self, descriptor: &AttributeDescriptor, hints: &CostHints) -> Cost {
        let shape = match hints.shape {
            RangeShape::Bounded if hints.lower.is_some() && hints.lower == hints.upper => 1,
            RangeShape::Equality => 1,
            RangeShape::Bounded => 10,
            RangeShape::OneSided => 50,
            RangeShape::Prefix => 60,
            RangeShape::Null => 80,
        };
        let scale = match descriptor.cardinality {
            Cardinality::High => 1,
            Cardinality::Unknown => 10,
            Cardinality::Low => 100,
        };
        Cost(shape * scale)
    }
}

#[cfg(test)]
mod tests {
    use lode_query::AttributeType;

    use super::*;

    fn descriptor(cardinality: Cardinality) -> AttributeDescriptor {
        AttributeDescriptor::new("a", AttributeType::Int32)
            .indexed()
            .with_cardinality(cardinality)
    }

    fn cost(cardinality: Cardinality, shape: RangeShape) -> Cost {
        let hints = CostHints::new(shape, Some(Bson::Int32(1)), Some(Bson::Int32(2)));
        CardinalityCostEstimator.cost(&descriptor(cardinality), &hints)
    }

    #[test]
    fn shapes_are_ranked() {
        let c = Cardinality::Unknown;
        assert!(cost(c, RangeShape::Equality) < cost(c, RangeShape::Bounded));
        assert!(cost(c, RangeShape::Bounded) < cost(c, RangeShape::OneSided));
        assert!(cost(c, RangeShape::OneSided) < cost(c, RangeShape::Prefix));
        assert!(cost(c, RangeShape::Prefix) < cost(c, RangeShape::Null));
    }

    #[test]
    fn cardinality_scales() {
        assert!(cost(Cardinality::High, RangeShape::Equality) < cost(Cardinality::Unknown, RangeShape::Equality));
        assert!(cost(Cardinality::Unknown, RangeShape::Equality) < cost(Cardinality::Low, RangeShape::Equality));
    }

    #[test]
    fn degenerate_bounded_range_costs_like_equality() {
        let d = descriptor(Cardinality::Unknown);
        let same = CostHints::new(RangeShape::Bounded, Some(Bson::Int32(3)), Some(Bson::Int32(3)));
        let eq = CostHints::new(RangeShape::Equality, Some(Bson::Int32(3)), Some(Bson::Int32(3)));
        assert_eq!(CardinalityCostEstimator.cost(&d, &same), CardinalityCostEstimator.cost(&d, &eq));
    }
}
