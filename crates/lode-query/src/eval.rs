use std::cmp::Ordering;

use bson::{Bson, Document};
use regex::Regex;

use crate::filter::{CompareOp, Envelope, Expr, Filter, TemporalOp};
use crate::parse_filter::FilterParseError;

/// A [`Filter`] compiled for repeated evaluation: operands normalized so
/// the attribute is always on the left, like patterns turned into regexes
/// and temporal nodes lowered to comparisons.
#[derive(Debug, Clone)]
pub struct Predicate {
    root: Node,
}

#[derive(Debug, Clone)]
enum Node {
    Const(bool),
    And(Vec<Node>),
    Or(Vec<Node>),
    Not(Box<Node>),
    Compare {
        property: String,
        op: CompareOp,
        value: Bson,
    },
    CompareProperties {
        left: String,
        op: CompareOp,
        right: String,
    },
    Like {
        property: String,
        regex: Regex,
    },
    Between {
        property: String,
        lower: Bson,
        upper: Bson,
    },
    Null(String),
    BBox {
        property: String,
        envelope: Envelope,
    },
}

impl Predicate {
    pub fn compile(filter: &Filter) -> Result<Self, FilterParseError> {
        Ok(Self {
            root: compile(filter)?,
        })
    }

    /// Whether a feature's attributes satisfy the predicate.
    pub fn matches(&self, attributes: &Document) -> bool {
        eval(&self.root, attributes)
    }
}

impl Default for Predicate {
    fn default() -> Self {
        Self {
            root: Node::Const(true),
        }
    }
}

// ── Compilation ───────────────────────────────────────────────

fn compile(filter: &Filter) -> Result<Node, FilterParseError> {
    let node = match filter {
        Filter::Include => Node::Const(true),
        Filter::Exclude => Node::Const(false),
        Filter::And(children) => Node::And(children.iter().map(compile).collect::<Result<_, _>>()?),
        Filter::Or(children) => Node::Or(children.iter().map(compile).collect::<Result<_, _>>()?),
        Filter::Not(inner) => Node::Not(Box::new(compile(inner)?)),
        Filter::Compare { left, op, right } => match (left, right) {
            (Expr::Property(p), Expr::Literal(v)) => compare(p, *op, v),
            (Expr::Literal(v), Expr::Property(p)) => compare(p, op.flip(), v),
            (Expr::Property(l), Expr::Property(r)) => Node::CompareProperties {
                left: l.clone(),
                op: *op,
                right: r.clone(),
            },
            (Expr::Literal(l), Expr::Literal(r)) => {
                Node::Const(holds(*op, value_cmp(l, r)))
            }
            _ => return Err(FilterParseError("period operand in a comparison".into())),
        },
        Filter::Like {
            property,
            pattern,
            match_case,
        } => Node::Like {
            property: property.clone(),
            regex: like_regex(pattern, *match_case)?,
        },
        Filter::Between {
            property,
            lower,
            upper,
        } => Node::Between {
            property: property.clone(),
            lower: lower.clone(),
            upper: upper.clone(),
        },
        Filter::IsNull(property) | Filter::IsNil(property) => Node::Null(property.clone()),
        Filter::Temporal { left, op, right } => match (left, right) {
            (Expr::Property(p), other) => temporal(p, *op, other)?,
            (other, Expr::Property(p)) if *op != TemporalOp::During => {
                temporal(p, op.flip(), other)?
            }
            _ => return Err(FilterParseError("temporal filter without a property".into())),
        },
        Filter::BBox { property, envelope } => Node::BBox {
            property: property.clone(),
            envelope: *envelope,
        },
    };
    Ok(node)
}

fn compare(property: &str, op: CompareOp, value: &Bson) -> Node {
    Node::Compare {
        property: property.to_string(),
        op,
        value: value.clone(),
    }
}

/// Lower a temporal operator on `property` to comparisons over dates.
fn temporal(property: &str, op: TemporalOp, operand: &Expr) -> Result<Node, FilterParseError> {
    let node = match (op, operand) {
        (TemporalOp::Before, Expr::Literal(v)) => compare(property, CompareOp::Lt, v),
        (TemporalOp::After, Expr::Literal(v)) => compare(property, CompareOp::Gt, v),
        (TemporalOp::TEquals, Expr::Literal(v)) => compare(property, CompareOp::Eq, v),
        (TemporalOp::Before, Expr::Period(p)) => {
            compare(property, CompareOp::Lt, &Bson::DateTime(p.start))
        }
        (TemporalOp::After, Expr::Period(p)) => {
            compare(property, CompareOp::Gt, &Bson::DateTime(p.end))
        }
        (TemporalOp::During, Expr::Period(p)) => Node::Between {
            property: property.to_string(),
            lower: Bson::DateTime(p.start),
            upper: Bson::DateTime(p.end),
        },
        (op, operand) => {
            return Err(FilterParseError(format!(
                "unsupported temporal operand for {op:?}: {operand:?}"
            )));
        }
    };
    Ok(node)
}

/// Translate a like pattern into an anchored regex.
fn like_regex(pattern: &str, match_case: bool) -> Result<Regex, FilterParseError> {
    let mut re = String::with_capacity(pattern.len() + 8);
    if !match_case {
        re.push_str("(?i)");
    }
    re.push_str("(?s)^");
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '%' => re.push_str(".*"),
            '_' => re.push('.'),
            '\\' => match chars.next() {
                Some(escaped) => re.push_str(&regex::escape(&escaped.to_string())),
                None => return Err(FilterParseError("like pattern ends with an escape".into())),
            },
            c => re.push_str(&regex::escape(&c.to_string())),
        }
    }
    re.push('$');
    Regex::new(&re).map_err(|e| FilterParseError(format!("invalid like pattern: {e}")))
}

// ── Evaluation ────────────────────────────────────────────────

fn eval(node: &Node, doc: &Document) -> bool {
    match node {
        Node::Const(b) => *b,
        Node::And(children) => children.iter().all(|c| eval(c, doc)),
        Node::Or(children) => children.iter().any(|c| eval(c, doc)),
        Node::Not(inner) => !eval(inner, doc),
        Node::Compare {
            property,
            op: CompareOp::Ne,
            value,
        } => !any_value(doc, property, |v| value_cmp(v, value) == Some(Ordering::Equal)),
        Node::Compare {
            property,
            op,
            value,
        } => any_value(doc, property, |v| holds(*op, value_cmp(v, value))),
        Node::CompareProperties { left, op, right } => match doc.get(right) {
            Some(r) if !matches!(r, Bson::Null) => {
                let ord = |v: &Bson| value_cmp(v, r);
                if *op == CompareOp::Ne {
                    !any_value(doc, left, |v| ord(v) == Some(Ordering::Equal))
                } else {
                    any_value(doc, left, |v| holds(*op, ord(v)))
                }
            }
            _ => false,
        },
        Node::Like { property, regex } => any_value(doc, property, |v| match v {
            Bson::String(s) => regex.is_match(s),
            _ => false,
        }),
        Node::Between {
            property,
            lower,
            upper,
        } => any_value(doc, property, |v| {
            holds(CompareOp::Gte, value_cmp(v, lower)) && holds(CompareOp::Lte, value_cmp(v, upper))
        }),
        Node::Null(property) => matches!(doc.get(property), None | Some(Bson::Null)),
        Node::BBox { property, envelope } => match doc.get(property) {
            Some(Bson::Array(coords)) => point(coords).is_some_and(|(x, y)| envelope.contains(x, y)),
            _ => false,
        },
    }
}

/// Apply `test` to a field's value, or to each element if it is an array.
fn any_value(doc: &Document, field: &str, test: impl Fn(&Bson) -> bool) -> bool {
    match doc.get(field) {
        Some(Bson::Array(arr)) => arr.iter().any(&test),
        Some(Bson::Null) | None => false,
        Some(v) => test(v),
    }
}

fn holds(op: CompareOp, ord: Option<Ordering>) -> bool {
    let Some(ord) = ord else { return false };
    match op {
        CompareOp::Eq => ord == Ordering::Equal,
        CompareOp::Ne => ord != Ordering::Equal,
        CompareOp::Lt => ord == Ordering::Less,
        CompareOp::Lte => ord != Ordering::Greater,
        CompareOp::Gt => ord == Ordering::Greater,
        CompareOp::Gte => ord != Ordering::Less,
    }
}

fn point(coords: &[Bson]) -> Option<(f64, f64)> {
    match coords {
        [x, y] => Some((as_f64(x)?, as_f64(y)?)),
        _ => None,
    }
}

fn as_f64(v: &Bson) -> Option<f64> {
    match v {
        Bson::Double(d) => Some(*d),
        Bson::Int32(i) => Some(f64::from(*i)),
        Bson::Int64(i) => Some(*i as f64),
        _ => None,
    }
}

/// Order a stored value against a query value. Query strings are parsed
/// into the stored value's type and integers compare with dates as epoch
/// milliseconds. Incompatible types have no order.
fn value_cmp(stored: &Bson, query: &Bson) -> Option<Ordering> {
    match (stored, query) {
        // ── Direct type matches ─────────────────────────────
        (Bson::Int32(a), Bson::Int32(b)) => Some(a.cmp(b)),
        (Bson::Int32(a), Bson::Int64(b)) => Some(i64::from(*a).cmp(b)),
        (Bson::Int64(a), Bson::Int64(b)) => Some(a.cmp(b)),
        (Bson::Int64(a), Bson::Int32(b)) => Some(a.cmp(&i64::from(*b))),
        (Bson::Double(a), Bson::Double(b)) => a.partial_cmp(b),
        (Bson::Double(a), Bson::Int64(b)) => a.partial_cmp(&(*b as f64)),
        (Bson::Double(a), Bson::Int32(b)) => a.partial_cmp(&f64::from(*b)),
        (Bson::Int64(a), Bson::Double(b)) => (*a as f64).partial_cmp(b),
        (Bson::Int32(a), Bson::Double(b)) => f64::from(*a).partial_cmp(b),
        (Bson::Boolean(a), Bson::Boolean(b)) => Some(a.cmp(b)),
        (Bson::DateTime(a), Bson::DateTime(b)) => {
            Some(a.timestamp_millis().cmp(&b.timestamp_millis()))
        }
        (Bson::String(a), Bson::String(b)) => Some(a.as_str().cmp(b.as_str())),
        (Bson::Binary(a), Bson::Binary(b)) => Some(a.bytes.cmp(&b.bytes)),
        (Bson::Binary(a), Bson::String(b)) => Some(a.bytes.as_slice().cmp(b.as_bytes())),

        // ── Cross-type coercion: query string → stored type ─
        (Bson::Int32(a), Bson::String(s)) => s.parse::<i64>().ok().map(|b| i64::from(*a).cmp(&b)),
        (Bson::Int64(a), Bson::String(s)) => s.parse::<i64>().ok().map(|b| a.cmp(&b)),
        (Bson::Double(a), Bson::String(s)) => s.parse::<f64>().ok().and_then(|b| a.partial_cmp(&b)),
        (Bson::Boolean(a), Bson::String(s)) => match s.as_str() {
            "true" => Some(a.cmp(&true)),
            "false" => Some(a.cmp(&false)),
            _ => None,
        },
        (Bson::DateTime(a), Bson::String(s)) => bson::DateTime::parse_rfc3339_str(s)
            .ok()
            .map(|dt| a.timestamp_millis().cmp(&dt.timestamp_millis())),

        // ── Cross-type coercion: integer → date (epoch millis) ─
        (Bson::DateTime(a), Bson::Int64(b)) => Some(a.timestamp_millis().cmp(b)),
        (Bson::DateTime(a), Bson::Int32(b)) => Some(a.timestamp_millis().cmp(&i64::from(*b))),

        // ── Cross-type coercion: stored string vs scalar ─
        (Bson::String(a), Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Boolean(_)) => {
            Some(a.as_str().cmp(query.to_string().as_str()))
        }

        // ── Incompatible types: silent exclusion ────────────
        _ => None,
    }
}
