use std::collections::BTreeSet;

use bson::Bson;
use serde::{Deserialize, Serialize};

/// Comparison operators of a `Compare` node, read left to right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl CompareOp {
    /// The operator that keeps the meaning when both operands swap sides:
    /// `a < b` is `b > a`.
    pub fn flip(self) -> Self {
        match self {
            CompareOp::Lt => CompareOp::Gt,
            CompareOp::Lte => CompareOp::Gte,
            CompareOp::Gt => CompareOp::Lt,
            CompareOp::Gte => CompareOp::Lte,
            op => op,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemporalOp {
    Before,
    After,
    During,
    TEquals,
}

impl TemporalOp {
    /// Same as [`CompareOp::flip`]; `During` only makes sense with the
    /// period on the right and is left as is.
    pub fn flip(self) -> Self {
        match self {
            TemporalOp::Before => TemporalOp::After,
            TemporalOp::After => TemporalOp::Before,
            op => op,
        }
    }
}

/// A closed time interval, both ends inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub start: bson::DateTime,
    pub end: bson::DateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Envelope {
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }
}

/// The literal prefix of a like pattern whose only wildcard is a single
/// trailing `%`, with escapes resolved. `None` for any other shape.
pub fn like_prefix(pattern: &str) -> Option<String> {
    let body = pattern.strip_suffix('%')?;
    let mut prefix = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        match c {
            // A dangling escape means the trailing '%' was escaped.
            '\\' => prefix.push(chars.next()?),
            '%' | '_' => return None,
            c => prefix.push(c),
        }
    }
    Some(prefix)
}

/// Operand of a binary predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    Property(String),
    Literal(Bson),
    Period(Period),
}

impl Expr {
    pub fn property(name: impl Into<String>) -> Self {
        Expr::Property(name.into())
    }

    pub fn literal(value: impl Into<Bson>) -> Self {
        Expr::Literal(value.into())
    }

    pub fn as_property(&self) -> Option<&str> {
        match self {
            Expr::Property(name) => Some(name),
            _ => None,
        }
    }
}

// ── Filter ────────────────────────────────────────────────────

/// Predicate tree over feature attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Filter {
    Include,
    Exclude,
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    Compare {
        left: Expr,
        op: CompareOp,
        right: Expr,
    },
    /// SQL-style pattern: `%` matches any run, `_` one character, `\`
    /// escapes the next character.
    Like {
        property: String,
        pattern: String,
        match_case: bool,
    },
    /// Inclusive on both ends.
    Between {
        property: String,
        lower: Bson,
        upper: Bson,
    },
    IsNull(String),
    IsNil(String),
    Temporal {
        left: Expr,
        op: TemporalOp,
        right: Expr,
    },
    BBox {
        property: String,
        envelope: Envelope,
    },
}

impl Filter {
    pub fn compare(property: &str, op: CompareOp, value: impl Into<Bson>) -> Self {
        Filter::Compare {
            left: Expr::property(property),
            op,
            right: Expr::literal(value),
        }
    }

    pub fn eq(property: &str, value: impl Into<Bson>) -> Self {
        Filter::compare(property, CompareOp::Eq, value)
    }

    pub fn like(property: &str, pattern: &str) -> Self {
        Filter::Like {
            property: property.to_string(),
            pattern: pattern.to_string(),
            match_case: true,
        }
    }

    pub fn between(property: &str, lower: impl Into<Bson>, upper: impl Into<Bson>) -> Self {
        Filter::Between {
            property: property.to_string(),
            lower: lower.into(),
            upper: upper.into(),
        }
    }

    pub fn during(property: &str, start: bson::DateTime, end: bson::DateTime) -> Self {
        Filter::Temporal {
            left: Expr::property(property),
            op: TemporalOp::During,
            right: Expr::Period(Period { start, end }),
        }
    }

    pub fn bbox(property: &str, min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Filter::BBox {
            property: property.to_string(),
            envelope: Envelope {
                min_x,
                min_y,
                max_x,
                max_y,
            },
        }
    }

    /// Conjunction of `children`, flattening nested `And`s and dropping
    /// `Include`. No children is `Include`; one child is returned as is.
    pub fn and(children: Vec<Filter>) -> Self {
        let mut flat = Vec::with_capacity(children.len());
        for child in children {
            match child {
                Filter::Include => {}
                Filter::And(grand) => flat.extend(grand),
                other => flat.push(other),
            }
        }
        if flat.iter().any(|f| *f == Filter::Exclude) {
            return Filter::Exclude;
        }
        match flat.len() {
            0 => Filter::Include,
            1 => flat.remove(0),
            _ => Filter::And(flat),
        }
    }

    /// Top-level conjuncts; any other node is its own single leaf.
    pub fn conjuncts(&self) -> Vec<&Filter> {
        match self {
            Filter::And(children) => children.iter().flat_map(|c| c.conjuncts()).collect(),
            Filter::Include => Vec::new(),
            other => vec![other],
        }
    }

    /// Every attribute name the filter references.
    pub fn properties(&self) -> BTreeSet<&str> {
        let mut out = BTreeSet::new();
        self.collect_properties(&mut out);
        out
    }

    fn collect_properties<'a>(&'a self, out: &mut BTreeSet<&'a str>) {
        match self {
            Filter::Include | Filter::Exclude => {}
            Filter::And(children) | Filter::Or(children) => {
                for child in children {
                    child.collect_properties(out);
                }
            }
            Filter::Not(inner) => inner.collect_properties(out),
            Filter::Compare { left, right, .. } | Filter::Temporal { left, right, .. } => {
                out.extend(left.as_property());
                out.extend(right.as_property());
            }
            Filter::Like { property, .. }
            | Filter::Between { property, .. }
            | Filter::BBox { property, .. } => {
                out.insert(property);
            }
            Filter::IsNull(property) | Filter::IsNil(property) => {
                out.insert(property);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn and_flattens_and_simplifies() {
        let f = Filter::and(vec![
            Filter::Include,
            Filter::And(vec![Filter::eq("a", 1), Filter::eq("b", 2)]),
            Filter::eq("c", 3),
        ]);
        assert_eq!(f.conjuncts().len(), 3);

        assert_eq!(Filter::and(vec![]), Filter::Include);
        assert_eq!(Filter::and(vec![Filter::eq("a", 1)]), Filter::eq("a", 1));
        assert_eq!(
            Filter::and(vec![Filter::eq("a", 1), Filter::Exclude]),
            Filter::Exclude
        );
    }

    #[test]
    fn properties_cover_both_operand_sides() {
        let f = Filter::Or(vec![
            Filter::Compare {
                left: Expr::literal(5),
                op: CompareOp::Lt,
                right: Expr::property("age"),
            },
            Filter::Not(Box::new(Filter::IsNull("name".into()))),
            Filter::bbox("geom", 0.0, 0.0, 1.0, 1.0),
        ]);
        let props: Vec<_> = f.properties().into_iter().collect();
        assert_eq!(props, vec!["age", "geom", "name"]);
    }

    #[test]
    fn flip_is_an_involution() {
        for op in [
            CompareOp::Eq,
            CompareOp::Ne,
            CompareOp::Lt,
            CompareOp::Lte,
            CompareOp::Gt,
            CompareOp::Gte,
        ] {
            assert_eq!(op.flip().flip(), op);
        }
        assert_eq!(TemporalOp::Before.flip(), TemporalOp::After);
    }

    #[test]
    fn like_prefix_shapes() {
        assert_eq!(like_prefix("sm%").as_deref(), Some("sm"));
        assert_eq!(like_prefix("a\\_b%").as_deref(), Some("a_b"));
        assert_eq!(like_prefix("%").as_deref(), Some(""));
        assert_eq!(like_prefix("s%m%"), None);
        assert_eq!(like_prefix("s_m%"), None);
        assert_eq!(like_prefix("sm"), None);
        assert_eq!(like_prefix("sm\\%"), None);
    }

    #[test]
    fn serde_round_trip() {
        let f = Filter::and(vec![Filter::eq("name", "alice"), Filter::like("n", "sm%")]);
        let json = serde_json::to_string(&f).unwrap();
        assert_eq!(serde_json::from_str::<Filter>(&json).unwrap(), f);
    }
}
