use bson::Bson;
use bson::spec::BinarySubtype;
use lode_query::AttributeType;

use crate::error::EncodingError;

/// Convert `value` to the canonical BSON form of the scalar type `ty`.
///
/// | declared | canonical | accepted literals |
/// |---|---|---|
/// | String | String | any scalar (display form) |
/// | Int32 | Int32 | Int64 in range, integral Double, numeric String |
/// | Int64 | Int64 | Int32, integral Double, numeric String |
/// | Float32/Float64 | Double | Int32, Int64, numeric String |
/// | Boolean | Boolean | `"true"` / `"false"` |
/// | Date | DateTime | Int64/Int32 epoch millis, RFC 3339 String |
/// | Bytes | Binary | String (UTF-8 bytes) |
pub(crate) fn coerce(attribute: &str, ty: &AttributeType, value: &Bson) -> Result<Bson, EncodingError> {
    let converted = match (ty, value) {
        (AttributeType::String, Bson::String(_)) => Some(value.clone()),
        (AttributeType::String, Bson::Int32(n)) => Some(Bson::String(n.to_string())),
        (AttributeType::String, Bson::Int64(n)) => Some(Bson::String(n.to_string())),
        (AttributeType::String, Bson::Double(n)) => Some(Bson::String(n.to_string())),
        (AttributeType::String, Bson::Boolean(b)) => Some(Bson::String(b.to_string())),
        (AttributeType::String, Bson::DateTime(dt)) => dt.try_to_rfc3339_string().ok().map(Bson::String),

        (AttributeType::Int32, Bson::Int32(_)) => Some(value.clone()),
        (AttributeType::Int32, Bson::Int64(n)) => i32::try_from(*n).ok().map(Bson::Int32),
        (AttributeType::Int32, Bson::Double(d)) => integral(*d)
            .and_then(|n| i32::try_from(n).ok())
            .map(Bson::Int32),
        (AttributeType::Int32, Bson::String(s)) => s.trim().parse::<i32>().ok().map(Bson::Int32),

        (AttributeType::Int64, Bson::Int64(_)) => Some(value.clone()),
        (AttributeType::Int64, Bson::Int32(n)) => Some(Bson::Int64(i64::from(*n))),
        (AttributeType::Int64, Bson::Double(d)) => integral(*d).map(Bson::Int64),
        (AttributeType::Int64, Bson::String(s)) => s.trim().parse::<i64>().ok().map(Bson::Int64),

        (AttributeType::Float32 | AttributeType::Float64, v) => as_f64(v).map(Bson::Double),

        (AttributeType::Boolean, Bson::Boolean(_)) => Some(value.clone()),
        (AttributeType::Boolean, Bson::String(s)) => match s.as_str() {
            "true" => Some(Bson::Boolean(true)),
            "false" => Some(Bson::Boolean(false)),
            _ => None,
        },

        (AttributeType::Date, Bson::DateTime(_)) => Some(value.clone()),
        (AttributeType::Date, Bson::Int64(ms)) => Some(Bson::DateTime(bson::DateTime::from_millis(*ms))),
        (AttributeType::Date, Bson::Int32(ms)) => {
            Some(Bson::DateTime(bson::DateTime::from_millis(i64::from(*ms))))
        }
        (AttributeType::Date, Bson::String(s)) => {
            bson::DateTime::parse_rfc3339_str(s).ok().map(Bson::DateTime)
        }

        (AttributeType::Bytes, Bson::Binary(_)) => Some(value.clone()),
        (AttributeType::Bytes, Bson::String(s)) => Some(Bson::Binary(bson::Binary {
            subtype: BinarySubtype::Generic,
            bytes: s.as_bytes().to_vec(),
        })),

        (AttributeType::Geometry | AttributeType::List(_) | AttributeType::Map(..), _) => {
            return Err(EncodingError::Unsupported(format!(
                "{ty:?} values of attribute '{attribute}' have no row encoding"
            )));
        }
        _ => None,
    };

    converted.ok_or_else(|| EncodingError::Coercion {
        attribute: attribute.to_string(),
        expected: format!("{ty:?}"),
        value: value.to_string(),
    })
}

fn integral(d: f64) -> Option<i64> {
    if d.fract() == 0.0 && d >= i64::MIN as f64 && d < i64::MAX as f64 {
        Some(d as i64)
    } else {
        None
    }
}

fn as_f64(v: &Bson) -> Option<f64> {
    match v {
        Bson::Double(d) => Some(*d),
        Bson::Int32(n) => Some(f64::from(*n)),
        Bson::Int64(n) => Some(*n as f64),
        Bson::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(ty: AttributeType, v: impl Into<Bson>) -> Bson {
        coerce("a", &ty, &v.into()).unwrap()
    }

    #[test]
    fn integers() {
        assert_eq!(ok(AttributeType::Int32, 7_i64), Bson::Int32(7));
        assert_eq!(ok(AttributeType::Int32, 7.0), Bson::Int32(7));
        assert_eq!(ok(AttributeType::Int32, " 7 "), Bson::Int32(7));
        assert_eq!(ok(AttributeType::Int64, 7_i32), Bson::Int64(7));
        assert!(coerce("a", &AttributeType::Int32, &Bson::Int64(i64::MAX)).is_err());
        assert!(coerce("a", &AttributeType::Int32, &Bson::Double(7.5)).is_err());
        assert!(coerce("a", &AttributeType::Int64, &Bson::String("seven".into())).is_err());
    }

    #[test]
    fn floats() {
        assert_eq!(ok(AttributeType::Float64, 2_i32), Bson::Double(2.0));
        assert_eq!(ok(AttributeType::Float64, "2.5"), Bson::Double(2.5));
        // Float attributes keep full double precision.
        assert_eq!(ok(AttributeType::Float32, 0.1), Bson::Double(0.1));
        assert_eq!(ok(AttributeType::Float32, 0.10000000001), Bson::Double(0.10000000001));
    }

    #[test]
    fn dates() {
        let dt = bson::DateTime::from_millis(86_400_000);
        assert_eq!(ok(AttributeType::Date, 86_400_000_i64), Bson::DateTime(dt));
        assert_eq!(ok(AttributeType::Date, "1970-01-02T00:00:00Z"), Bson::DateTime(dt));
        assert!(coerce("a", &AttributeType::Date, &Bson::String("yesterday".into())).is_err());
    }

    #[test]
    fn strings_accept_scalars() {
        assert_eq!(ok(AttributeType::String, 42_i32), Bson::String("42".into()));
        assert_eq!(ok(AttributeType::String, true), Bson::String("true".into()));
    }

    #[test]
    fn booleans_and_bytes() {
        assert_eq!(ok(AttributeType::Boolean, "false"), Bson::Boolean(false));
        assert!(coerce("a", &AttributeType::Boolean, &Bson::Int32(1)).is_err());
        match ok(AttributeType::Bytes, "ab") {
            Bson::Binary(b) => assert_eq!(b.bytes, b"ab".to_vec()),
            other => panic!("expected binary, got {other:?}"),
        }
    }

    #[test]
    fn geometry_is_unsupported() {
        let err = coerce("geom", &AttributeType::Geometry, &Bson::Array(vec![])).unwrap_err();
        assert!(matches!(err, EncodingError::Unsupported(_)));
    }
}
