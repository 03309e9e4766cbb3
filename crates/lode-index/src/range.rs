use std::ops::Bound;

use bson::Bson;
use lode_store::{ByteRange, following_prefix};

use crate::codec::RowKeyCodec;
use crate::error::EncodingError;

/// Turns predicate bounds into row ranges over one attribute's rows.
///
/// Open ends are closed off at the attribute's own key space,
/// `[row_prefix, following_prefix(row_prefix))`, so a one-sided
/// comparison never reaches another attribute's rows or the null marker.
/// A value's rows all start with its value key and differ only in the
/// bucket byte, so every bound covers or skips a value's rows as a whole.
pub struct RangeBuilder<'a> {
    codec: &'a RowKeyCodec,
}

impl<'a> RangeBuilder<'a> {
    pub fn new(codec: &'a RowKeyCodec) -> Self {
        Self { codec }
    }

    /// Lowest row of the attribute's values, inclusive.
    pub fn lower_bound(&self, attribute: &str) -> Result<Bound<Vec<u8>>, EncodingError> {
        Ok(Bound::Included(self.codec.row_prefix(attribute)?))
    }

    /// First row past the attribute's values, exclusive.
    pub fn upper_bound(&self, attribute: &str) -> Result<Bound<Vec<u8>>, EncodingError> {
        let prefix = self.codec.row_prefix(attribute)?;
        Ok(match following_prefix(&prefix) {
            Some(end) => Bound::Excluded(end),
            None => Bound::Unbounded,
        })
    }

    pub fn equals(&self, attribute: &str, value: &Bson) -> Result<ByteRange, EncodingError> {
        Ok(match self.codec.encode_row(attribute, value)? {
            Some(key) => ByteRange::prefix(key),
            None => ByteRange::empty(),
        })
    }

    pub fn null(&self, attribute: &str) -> Result<ByteRange, EncodingError> {
        Ok(ByteRange::prefix(self.codec.null_prefix(attribute)?))
    }

    /// Every value starting with `prefix`.
    pub fn prefix(&self, attribute: &str, prefix: &str) -> Result<ByteRange, EncodingError> {
        Ok(match self.codec.encode_prefix(attribute, prefix)? {
            Some(start) => ByteRange::prefix(start),
            None => ByteRange::empty(),
        })
    }

    /// `[lower, upper]`, inclusive on both ends.
    pub fn between(&self, attribute: &str, lower: &Bson, upper: &Bson) -> Result<ByteRange, EncodingError> {
        let lower = self.codec.encode_row(attribute, lower)?;
        let upper = self.codec.encode_row(attribute, upper)?;
        let (Some(lower), Some(upper)) = (lower, upper) else {
            return Ok(ByteRange::empty());
        };
        let end = match following_prefix(&upper) {
            Some(end) => Bound::Excluded(end),
            None => self.upper_bound(attribute)?,
        };
        Ok(ByteRange::new(Bound::Included(lower), end))
    }

    /// Values above `value`, up to the end of the attribute.
    pub fn greater(&self, attribute: &str, value: &Bson, inclusive: bool) -> Result<ByteRange, EncodingError> {
        let Some(key) = self.codec.encode_row(attribute, value)? else {
            return Ok(ByteRange::empty());
        };
        let start = if inclusive {
            Bound::Included(key)
        } else {
            // Past every bucket of the value.
            match following_prefix(&key) {
                Some(after) => Bound::Included(after),
                None => return Ok(ByteRange::empty()),
            }
        };
        Ok(ByteRange::new(start, self.upper_bound(attribute)?))
    }

    /// Values below `value`, from the start of the attribute.
    pub fn less(&self, attribute: &str, value: &Bson, inclusive: bool) -> Result<ByteRange, EncodingError> {
        let Some(key) = self.codec.encode_row(attribute, value)? else {
            return Ok(ByteRange::empty());
        };
        let end = if inclusive {
            match following_prefix(&key) {
                Some(after) => Bound::Excluded(after),
                None => self.upper_bound(attribute)?,
            }
        } else {
            Bound::Excluded(key)
        };
        Ok(ByteRange::new(self.lower_bound(attribute)?, end))
    }
}
