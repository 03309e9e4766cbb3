use bson::Bson;
use lode_query::{Expr, Period};

/// An attribute/literal pair pulled out of a binary predicate.
///
/// `flipped` is set when the attribute was the right-hand operand, so the
/// predicate's operator must be mirrored before it is read as
/// "attribute OP literal".
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyRef {
    pub name: String,
    pub literal: Bson,
    pub flipped: bool,
}

impl PropertyRef {
    /// Resolve which operand is the attribute. `None` unless exactly one
    /// side is a property and the other a literal value.
    pub fn extract(left: &Expr, right: &Expr) -> Option<Self> {
        match (left, right) {
            (Expr::Property(name), Expr::Literal(literal)) => Some(Self {
                name: name.clone(),
                literal: literal.clone(),
                flipped: false,
            }),
            (Expr::Literal(literal), Expr::Property(name)) => Some(Self {
                name: name.clone(),
                literal: literal.clone(),
                flipped: true,
            }),
            _ => None,
        }
    }
}

/// Like [`PropertyRef`], for a property compared against a time period.
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodRef {
    pub name: String,
    pub period: Period,
    pub flipped: bool,
}

impl PeriodRef {
    pub fn extract(left: &Expr, right: &Expr) -> Option<Self> {
        match (left, right) {
            (Expr::Property(name), Expr::Period(period)) => Some(Self {
                name: name.clone(),
                period: *period,
                flipped: false,
            }),
            (Expr::Period(period), Expr::Property(name)) => Some(Self {
                name: name.clone(),
                period: *period,
                flipped: true,
            }),
            _ => None,
        }
    }
}
