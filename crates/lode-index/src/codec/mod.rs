mod coerce;
mod lexicode;

use std::sync::Arc;

use bson::Bson;
use bson::spec::BinarySubtype;
use lode_query::{AttributeDescriptor, AttributeType, FeatureSchema};
use xxhash_rust::xxh3::xxh3_64;

use crate::error::EncodingError;

pub(crate) use coerce::coerce;
pub use lode_store::following_prefix;

// ── Row layout ────────────────────────────────────────────────
//
// Index row: {sharing}{attribute ordinal: u16 BE}{type tag}{value bytes}{bucket}
//
// The ordinal keeps attributes apart, the tag keeps values of different
// declared types apart. Tag 0x00 is the null marker and sorts before all
// real tags, so a range over one attribute's values never includes it.
// String and byte values are escaped and terminated, which makes the
// value part prefix-free: every row of one value is `{value key}{bucket}`
// with a fixed-width bucket, and no other value's rows fall in between.

const NULL_TAG: u8 = 0x00;
const STRING_TAG: u8 = 0x01;
const INT32_TAG: u8 = 0x02;
const INT64_TAG: u8 = 0x03;
const FLOAT32_TAG: u8 = 0x04;
const FLOAT64_TAG: u8 = 0x05;
const BOOLEAN_TAG: u8 = 0x06;
const DATE_TAG: u8 = 0x07;
const BYTES_TAG: u8 = 0x08;

/// Width of the bucket suffix that closes every index row.
pub const BUCKET_WIDTH: usize = 1;

/// Buckets a codec spreads rows over unless told otherwise.
pub const DEFAULT_BUCKETS: u8 = 4;

fn type_tag(ty: &AttributeType) -> Option<u8> {
    match ty {
        AttributeType::String => Some(STRING_TAG),
        AttributeType::Int32 => Some(INT32_TAG),
        AttributeType::Int64 => Some(INT64_TAG),
        AttributeType::Float32 => Some(FLOAT32_TAG),
        AttributeType::Float64 => Some(FLOAT64_TAG),
        AttributeType::Boolean => Some(BOOLEAN_TAG),
        AttributeType::Date => Some(DATE_TAG),
        AttributeType::Bytes => Some(BYTES_TAG),
        AttributeType::Geometry | AttributeType::List(_) | AttributeType::Map(..) => None,
    }
}

/// The row without its bucket suffix. Rows of the same attribute value
/// share it whatever bucket they landed in.
pub fn value_key(row: &[u8]) -> &[u8] {
    &row[..row.len().saturating_sub(BUCKET_WIDTH)]
}

// ── RowKeyCodec ───────────────────────────────────────────────

/// Encodes attribute values of one schema into sortable index rows.
#[derive(Debug, Clone)]
pub struct RowKeyCodec {
    schema: Arc<FeatureSchema>,
    sharing: Vec<u8>,
    buckets: u8,
}

impl RowKeyCodec {
    pub fn new(schema: Arc<FeatureSchema>, sharing: impl Into<Vec<u8>>) -> Self {
        Self {
            schema,
            sharing: sharing.into(),
            buckets: DEFAULT_BUCKETS,
        }
    }

    /// Spread rows over `buckets` suffixes. Zero is treated as one.
    pub fn with_buckets(mut self, buckets: u8) -> Self {
        self.buckets = buckets.max(1);
        self
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn shared_schema(&self) -> Arc<FeatureSchema> {
        Arc::clone(&self.schema)
    }

    pub fn sharing(&self) -> &[u8] {
        &self.sharing
    }

    pub fn bucket_count(&self) -> u8 {
        self.buckets
    }

    /// The bucket every index row of feature `id` ends in.
    pub fn bucket(&self, id: &str) -> u8 {
        let bucket = xxh3_64(id.as_bytes()) % u64::from(self.buckets);
        u8::try_from(bucket).unwrap_or(0)
    }

    fn lookup(&self, attribute: &str) -> Result<(u16, &AttributeDescriptor), EncodingError> {
        let ordinal = self
            .schema
            .index_of(attribute)
            .ok_or_else(|| EncodingError::UnknownAttribute(attribute.to_string()))?;
        let ordinal = u16::try_from(ordinal)
            .map_err(|_| EncodingError::Unsupported(format!("attribute ordinal {ordinal} too large")))?;
        Ok((ordinal, &self.schema.descriptors()[usize::from(ordinal)]))
    }

    /// `{sharing}{ordinal}`: the prefix of every row of the attribute,
    /// null marker included.
    pub fn attribute_prefix(&self, attribute: &str) -> Result<Vec<u8>, EncodingError> {
        let (ordinal, _) = self.lookup(attribute)?;
        let mut row = Vec::with_capacity(self.sharing.len() + 3);
        row.extend_from_slice(&self.sharing);
        row.extend_from_slice(&ordinal.to_be_bytes());
        Ok(row)
    }

    /// `{sharing}{ordinal}{tag}`: the prefix shared by every encoded value
    /// of the attribute.
    pub fn row_prefix(&self, attribute: &str) -> Result<Vec<u8>, EncodingError> {
        let (_, descriptor) = self.lookup(attribute)?;
        let tag = type_tag(descriptor.index_type()).ok_or_else(|| {
            EncodingError::Unsupported(format!(
                "attribute '{attribute}' of type {:?} has no row encoding",
                descriptor.ty
            ))
        })?;
        let mut row = self.attribute_prefix(attribute)?;
        row.push(tag);
        Ok(row)
    }

    /// The prefix of the rows recording that a feature has no value for
    /// the attribute.
    pub fn null_prefix(&self, attribute: &str) -> Result<Vec<u8>, EncodingError> {
        let mut row = self.attribute_prefix(attribute)?;
        row.push(NULL_TAG);
        Ok(row)
    }

    /// Encode a query literal as the value key of the rows it matches;
    /// each of those rows is the key plus one bucket byte.
    ///
    /// The literal is converted to the declared type first. For list
    /// attributes a scalar stands for a single element; an array literal
    /// uses its first element only. Map attributes have no rows, which
    /// yields `Ok(None)` (an empty scan rather than an error).
    pub fn encode_row(&self, attribute: &str, value: &Bson) -> Result<Option<Vec<u8>>, EncodingError> {
        let (_, descriptor) = self.lookup(attribute)?;
        let element = match (&descriptor.ty, value) {
            (AttributeType::Map(..), _) => return Ok(None),
            (AttributeType::List(_), Bson::Array(items)) => match items.first() {
                Some(first) => first,
                None => return Ok(None),
            },
            (_, v) => v,
        };
        if matches!(element, Bson::Null) {
            return Err(EncodingError::Coercion {
                attribute: attribute.to_string(),
                expected: format!("{:?}", descriptor.index_type()),
                value: "null".into(),
            });
        }
        self.encode_element(attribute, descriptor.index_type(), element, true)
            .map(Some)
    }

    /// The common prefix of every string or byte value starting with
    /// `prefix`, bucket and terminator left off.
    pub fn encode_prefix(&self, attribute: &str, prefix: &str) -> Result<Option<Vec<u8>>, EncodingError> {
        let (_, descriptor) = self.lookup(attribute)?;
        if descriptor.is_map() {
            return Ok(None);
        }
        let ty = descriptor.index_type();
        if !matches!(ty, AttributeType::String | AttributeType::Bytes) {
            return Err(EncodingError::Unsupported(format!(
                "prefix match on {ty:?} attribute '{attribute}'"
            )));
        }
        self.encode_element(attribute, ty, &Bson::String(prefix.to_string()), false)
            .map(Some)
    }

    /// Every index row feature `id` produces for one attribute value: one
    /// per distinct list element, a null row for a missing or null value,
    /// none for maps and geometries. All of them end in the feature's
    /// bucket.
    pub fn index_rows(&self, attribute: &str, value: Option<&Bson>, id: &str) -> Result<Vec<Vec<u8>>, EncodingError> {
        let (_, descriptor) = self.lookup(attribute)?;
        if descriptor.is_map() || descriptor.ty == AttributeType::Geometry {
            return Ok(Vec::new());
        }
        let values: Vec<&Bson> = match value {
            None | Some(Bson::Null) => Vec::new(),
            Some(Bson::Array(items)) if descriptor.is_multi_valued() => {
                items.iter().filter(|v| !matches!(v, Bson::Null)).collect()
            }
            Some(v) => vec![v],
        };
        let mut keys = Vec::with_capacity(values.len().max(1));
        if values.is_empty() {
            keys.push(self.null_prefix(attribute)?);
        }
        for v in values {
            let key = self.encode_element(attribute, descriptor.index_type(), v, true)?;
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        let bucket = self.bucket(id);
        for key in &mut keys {
            key.push(bucket);
        }
        Ok(keys)
    }

    fn encode_element(
        &self,
        attribute: &str,
        ty: &AttributeType,
        value: &Bson,
        terminate: bool,
    ) -> Result<Vec<u8>, EncodingError> {
        let value = coerce(attribute, ty, value)?;
        let mut row = self.row_prefix(attribute)?;
        match value {
            Bson::String(s) => lexicode::encode_bytes(s.as_bytes(), &mut row, terminate),
            Bson::Int32(n) => row.extend_from_slice(&lexicode::encode_i32(n)),
            Bson::Int64(n) => row.extend_from_slice(&lexicode::encode_i64(n)),
            Bson::Double(d) => row.extend_from_slice(&lexicode::encode_f64(d)),
            Bson::Boolean(b) => row.push(u8::from(b)),
            Bson::DateTime(dt) => row.extend_from_slice(&lexicode::encode_i64(dt.timestamp_millis())),
            Bson::Binary(b) => lexicode::encode_bytes(&b.bytes, &mut row, terminate),
            other => {
                return Err(EncodingError::Unsupported(format!(
                    "cannot encode {other} for attribute '{attribute}'"
                )));
            }
        }
        Ok(row)
    }

    /// Decode an index row back into its attribute name and value. The
    /// null marker decodes to `Bson::Null`.
    pub fn decode_row(&self, row: &[u8]) -> Result<(String, Bson), EncodingError> {
        let rest = row
            .strip_prefix(self.sharing.as_slice())
            .ok_or_else(|| EncodingError::MalformedRow("missing sharing prefix".into()))?;
        let (ordinal, rest) = match rest {
            [hi, lo, rest @ ..] => (u16::from_be_bytes([*hi, *lo]), rest),
            _ => return Err(EncodingError::MalformedRow("truncated ordinal".into())),
        };
        let descriptor = self
            .schema
            .descriptors()
            .get(usize::from(ordinal))
            .ok_or_else(|| EncodingError::MalformedRow(format!("unknown ordinal {ordinal}")))?;
        let (&tag, rest) = rest
            .split_first()
            .ok_or_else(|| EncodingError::MalformedRow("missing type tag".into()))?;
        let bytes = rest
            .len()
            .checked_sub(BUCKET_WIDTH)
            .map(|n| &rest[..n])
            .ok_or_else(|| EncodingError::MalformedRow("missing bucket".into()))?;

        let malformed = || EncodingError::MalformedRow(format!("bad value for '{}'", descriptor.name));
        let value = match tag {
            NULL_TAG if bytes.is_empty() => Bson::Null,
            STRING_TAG => {
                let raw = lexicode::decode_bytes(bytes).ok_or_else(malformed)?;
                Bson::String(String::from_utf8(raw).map_err(|_| malformed())?)
            }
            INT32_TAG => Bson::Int32(lexicode::decode_i32(bytes.try_into().map_err(|_| malformed())?)),
            INT64_TAG => Bson::Int64(lexicode::decode_i64(bytes.try_into().map_err(|_| malformed())?)),
            FLOAT32_TAG | FLOAT64_TAG => {
                Bson::Double(lexicode::decode_f64(bytes.try_into().map_err(|_| malformed())?))
            }
            BOOLEAN_TAG => match bytes {
                [b] => Bson::Boolean(*b != 0),
                _ => return Err(malformed()),
            },
            DATE_TAG => Bson::DateTime(bson::DateTime::from_millis(lexicode::decode_i64(
                bytes.try_into().map_err(|_| malformed())?,
            ))),
            BYTES_TAG => Bson::Binary(bson::Binary {
                subtype: BinarySubtype::Generic,
                bytes: lexicode::decode_bytes(bytes).ok_or_else(malformed)?,
            }),
            NULL_TAG => return Err(malformed()),
            other => {
                return Err(EncodingError::MalformedRow(format!("unknown type tag 0x{other:02x}")));
            }
        };
        Ok((descriptor.name.clone(), value))
    }
}
