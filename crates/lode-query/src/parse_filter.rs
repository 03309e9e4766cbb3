use bson::{Bson, Document};

use crate::filter::{CompareOp, Envelope, Expr, Filter, Period, TemporalOp};

/// Parse error for filter documents.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterParseError(pub String);

impl std::fmt::Display for FilterParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "filter parse error: {}", self.0)
    }
}

impl std::error::Error for FilterParseError {}

/// Parse a BSON filter document into a [`Filter`] tree.
///
/// - Top-level document is an implicit AND of all entries
/// - `{ "field": value }` is implicit `$eq`
/// - `{ "field": { "$gt": v } }` uses operator sub-documents
/// - `{ "$or": [...] }` / `{ "$and": [...] }` / `{ "$not": {...} }` for logic
/// - `$like` / `$ilike` take a `%`/`_` pattern
/// - `$between` and `$during` take a two-element array, `$bbox` a
///   four-element `[min_x, min_y, max_x, max_y]` array
/// - `$null: true` / `$nil: true` test for a missing or null value
pub fn parse_filter(doc: &Document) -> Result<Filter, FilterParseError> {
    let mut children = Vec::new();

    for (key, value) in doc {
        match key.as_str() {
            "$and" => children.push(Filter::And(parse_logical_array(value)?)),
            "$or" => children.push(Filter::Or(parse_logical_array(value)?)),
            "$not" => match value {
                Bson::Document(inner) => children.push(Filter::Not(Box::new(parse_filter(inner)?))),
                _ => return Err(FilterParseError("$not value must be a document".into())),
            },
            k if k.starts_with('$') => {
                return Err(FilterParseError(format!("unknown top-level operator: {k}")));
            }
            _ => children.push(parse_field_condition(key, value)?),
        }
    }

    match children.len() {
        0 => Err(FilterParseError("empty filter document".into())),
        1 => Ok(children.remove(0)),
        _ => Ok(Filter::And(children)),
    }
}

fn parse_logical_array(value: &Bson) -> Result<Vec<Filter>, FilterParseError> {
    let arr = match value {
        Bson::Array(a) => a,
        _ => return Err(FilterParseError("$and/$or value must be an array".into())),
    };

    let mut children = Vec::with_capacity(arr.len());
    for elem in arr {
        match elem {
            Bson::Document(sub_doc) => children.push(parse_filter(sub_doc)?),
            _ => {
                return Err(FilterParseError(
                    "$and/$or array elements must be documents".into(),
                ));
            }
        }
    }

    if children.is_empty() {
        return Err(FilterParseError("$and/$or array must not be empty".into()));
    }
    Ok(children)
}

/// Parse a field condition: either implicit $eq or an operator sub-document.
fn parse_field_condition(field: &str, value: &Bson) -> Result<Filter, FilterParseError> {
    if let Bson::Document(sub_doc) = value
        && sub_doc.keys().next().is_some_and(|k| k.starts_with('$'))
    {
        return parse_operator_doc(field, sub_doc);
    }
    Ok(Filter::eq(field, value.clone()))
}

/// Parse an operator sub-document like `{ "$gt": 21, "$lte": 100 }`.
fn parse_operator_doc(field: &str, doc: &Document) -> Result<Filter, FilterParseError> {
    let mut conditions = Vec::new();

    for (op_key, op_value) in doc {
        let filter = match op_key.as_str() {
            "$eq" => Filter::compare(field, CompareOp::Eq, op_value.clone()),
            "$ne" => Filter::compare(field, CompareOp::Ne, op_value.clone()),
            "$gt" => Filter::compare(field, CompareOp::Gt, op_value.clone()),
            "$gte" => Filter::compare(field, CompareOp::Gte, op_value.clone()),
            "$lt" => Filter::compare(field, CompareOp::Lt, op_value.clone()),
            "$lte" => Filter::compare(field, CompareOp::Lte, op_value.clone()),
            "$like" | "$ilike" => match op_value {
                Bson::String(pattern) => Filter::Like {
                    property: field.to_string(),
                    pattern: pattern.clone(),
                    match_case: op_key == "$like",
                },
                _ => return Err(FilterParseError(format!("{op_key} value must be a string"))),
            },
            "$between" => {
                let [lower, upper] = pair(op_key, op_value)?;
                Filter::Between {
                    property: field.to_string(),
                    lower,
                    upper,
                }
            }
            "$null" | "$nil" => match op_value {
                Bson::Boolean(true) if op_key == "$null" => Filter::IsNull(field.to_string()),
                Bson::Boolean(true) => Filter::IsNil(field.to_string()),
                Bson::Boolean(false) if op_key == "$null" => {
                    Filter::Not(Box::new(Filter::IsNull(field.to_string())))
                }
                Bson::Boolean(false) => Filter::Not(Box::new(Filter::IsNil(field.to_string()))),
                _ => return Err(FilterParseError(format!("{op_key} value must be a boolean"))),
            },
            "$before" => temporal(field, TemporalOp::Before, op_value),
            "$after" => temporal(field, TemporalOp::After, op_value),
            "$tequals" => temporal(field, TemporalOp::TEquals, op_value),
            "$during" => {
                let [start, end] = pair(op_key, op_value)?;
                match (start, end) {
                    (Bson::DateTime(start), Bson::DateTime(end)) => Filter::during(field, start, end),
                    _ => return Err(FilterParseError("$during bounds must be dates".into())),
                }
            }
            "$bbox" => Filter::BBox {
                property: field.to_string(),
                envelope: envelope(op_value)?,
            },
            k => return Err(FilterParseError(format!("unknown field operator: {k}"))),
        };
        conditions.push(filter);
    }

    match conditions.len() {
        0 => Err(FilterParseError("empty operator document".into())),
        1 => Ok(conditions.remove(0)),
        _ => Ok(Filter::And(conditions)),
    }
}

fn temporal(field: &str, op: TemporalOp, value: &Bson) -> Filter {
    Filter::Temporal {
        left: Expr::property(field),
        op,
        right: match value {
            Bson::Document(d) => period_doc(d).map_or_else(|| Expr::Literal(value.clone()), Expr::Period),
            _ => Expr::Literal(value.clone()),
        },
    }
}

/// `{ "start": date, "end": date }` as a period operand.
fn period_doc(doc: &Document) -> Option<Period> {
    match (doc.get("start"), doc.get("end")) {
        (Some(Bson::DateTime(start)), Some(Bson::DateTime(end))) => Some(Period {
            start: *start,
            end: *end,
        }),
        _ => None,
    }
}

fn pair(op: &str, value: &Bson) -> Result<[Bson; 2], FilterParseError> {
    match value {
        Bson::Array(a) if a.len() == 2 => Ok([a[0].clone(), a[1].clone()]),
        _ => Err(FilterParseError(format!("{op} value must be a two-element array"))),
    }
}

fn envelope(value: &Bson) -> Result<Envelope, FilterParseError> {
    let coords = match value {
        Bson::Array(a) if a.len() == 4 => a
            .iter()
            .map(|v| match v {
                Bson::Double(d) => Some(*d),
                Bson::Int32(i) => Some(f64::from(*i)),
                Bson::Int64(i) => Some(*i as f64),
                _ => None,
            })
            .collect::<Option<Vec<f64>>>(),
        _ => None,
    }
    .ok_or_else(|| FilterParseError("$bbox value must be four numbers".into()))?;

    Ok(Envelope {
        min_x: coords[0],
        min_y: coords[1],
        max_x: coords[2],
        max_y: coords[3],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn bare_field_implicit_eq() {
        let filter = parse_filter(&doc! { "status": "active" }).unwrap();
        assert_eq!(filter, Filter::eq("status", "active"));
    }

    #[test]
    fn multiple_bare_fields_become_and() {
        let filter = parse_filter(&doc! { "status": "active", "age": 30_i32 }).unwrap();
        match filter {
            Filter::And(children) => {
                assert_eq!(children.len(), 2);
                assert_eq!(children[1], Filter::eq("age", 30_i32));
            }
            _ => panic!("expected And, got {filter:?}"),
        }
    }

    #[test]
    fn operator_doc_gte() {
        let filter = parse_filter(&doc! { "age": { "$gte": 21_i32 } }).unwrap();
        assert_eq!(filter, Filter::compare("age", CompareOp::Gte, 21_i32));
    }

    #[test]
    fn multiple_operators_same_field() {
        let filter = parse_filter(&doc! { "score": { "$gt": 50_i32, "$lte": 100_i32 } }).unwrap();
        match filter {
            Filter::And(children) => {
                assert!(matches!(children[0], Filter::Compare { op: CompareOp::Gt, .. }));
                assert!(matches!(children[1], Filter::Compare { op: CompareOp::Lte, .. }));
            }
            _ => panic!("expected And"),
        }
    }

    #[test]
    fn nested_or_containing_not() {
        let filter = parse_filter(&doc! {
            "$or": [
                { "status": "active" },
                { "$not": { "name": { "$null": true } } }
            ]
        })
        .unwrap();
        match filter {
            Filter::Or(children) => {
                assert_eq!(children.len(), 2);
                assert_eq!(
                    children[1],
                    Filter::Not(Box::new(Filter::IsNull("name".into())))
                );
            }
            _ => panic!("expected Or"),
        }
    }

    #[test]
    fn like_and_ilike() {
        let filter = parse_filter(&doc! { "name": { "$ilike": "sm%" } }).unwrap();
        assert_eq!(
            filter,
            Filter::Like {
                property: "name".into(),
                pattern: "sm%".into(),
                match_case: false,
            }
        );
    }

    #[test]
    fn between_needs_two_bounds() {
        let filter = parse_filter(&doc! { "age": { "$between": [10_i32, 20_i32] } }).unwrap();
        assert_eq!(filter, Filter::between("age", 10_i32, 20_i32));

        let err = parse_filter(&doc! { "age": { "$between": [10_i32] } }).unwrap_err();
        assert!(err.0.contains("two-element"), "{}", err.0);
    }

    #[test]
    fn during_builds_period() {
        let start = bson::DateTime::from_millis(1_000);
        let end = bson::DateTime::from_millis(2_000);
        let filter = parse_filter(&doc! { "dtg": { "$during": [start, end] } }).unwrap();
        assert_eq!(filter, Filter::during("dtg", start, end));
    }

    #[test]
    fn bbox_accepts_mixed_numbers() {
        let filter = parse_filter(&doc! { "geom": { "$bbox": [0_i32, 0.5, 10_i64, 20.0] } }).unwrap();
        assert_eq!(filter, Filter::bbox("geom", 0.0, 0.5, 10.0, 20.0));
    }

    #[test]
    fn unknown_operators_error() {
        let err = parse_filter(&doc! { "$nor": [{ "a": 1_i32 }] }).unwrap_err();
        assert!(err.0.contains("unknown top-level operator"), "{}", err.0);

        let err = parse_filter(&doc! { "age": { "$regex": "x" } }).unwrap_err();
        assert!(err.0.contains("unknown field operator"), "{}", err.0);
    }

    #[test]
    fn empty_doc_errors() {
        let err = parse_filter(&doc! {}).unwrap_err();
        assert!(err.0.contains("empty"), "{}", err.0);
    }

    #[test]
    fn embedded_doc_as_eq_value() {
        let filter = parse_filter(&doc! { "address": { "city": "Austin" } }).unwrap();
        assert!(matches!(filter, Filter::Compare { op: CompareOp::Eq, .. }));
    }
}
