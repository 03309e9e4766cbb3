use std::ops::Bound;
use std::sync::Arc;

use lode_store::{ByteRange, IteratorSetting, Key, SortedKvIterator, StoreError, following_prefix};

use super::{
    BUCKET_SKIP, BUCKET_SKIP_PRIORITY, OPT_MAX_RESEEKS, OPT_SUFFIXES, decode_optional, encode_option,
};
use crate::config::IndexConfig;

// ── Buckets ───────────────────────────────────────────────────

/// The accepted suffixes, sorted and de-duplicated. Shared between the
/// copies of one iterator; never mutated after construction.
#[derive(Debug, Clone)]
struct Buckets {
    suffixes: Arc<[Vec<u8>]>,
    width: usize,
}

impl Buckets {
    fn new(suffixes: &[Vec<u8>]) -> Result<Self, StoreError> {
        let Some(first) = suffixes.first() else {
            return Err(StoreError::Iterator("bucket-skip: no accepted suffixes".into()));
        };
        let width = first.len();
        if width == 0 {
            return Err(StoreError::Iterator("bucket-skip: suffixes must not be empty".into()));
        }
        if suffixes.iter().any(|s| s.len() != width) {
            return Err(StoreError::Iterator(format!(
                "bucket-skip: suffixes must all be {width} bytes long"
            )));
        }
        let mut sorted = suffixes.to_vec();
        sorted.sort();
        sorted.dedup();
        Ok(Self {
            suffixes: sorted.into(),
            width,
        })
    }

    fn accepts(&self, suffix: &[u8]) -> bool {
        self.suffixes.binary_search_by(|s| s.as_slice().cmp(suffix)).is_ok()
    }

    /// Smallest accepted suffix strictly greater than `suffix`.
    fn next_after(&self, suffix: &[u8]) -> Option<&[u8]> {
        let i = self.suffixes.partition_point(|s| s.as_slice() <= suffix);
        self.suffixes.get(i).map(Vec::as_slice)
    }
}

// ── BucketSkipIterator ────────────────────────────────────────

enum Advance {
    /// The source is on an accepted entry or exhausted.
    Stop,
    Step,
    Reseek(ByteRange),
}

/// Exposes only entries whose row ends in one of a fixed set of
/// equal-width suffixes.
///
/// Rows are read as `{head}{suffix}`, and every row sharing a head must
/// carry a suffix of the same width (index rows end in their bucket byte
/// after a prefix-free value key). On a rejected row the source is
/// re-seeked straight to `{head}{next accepted suffix}`, so each rejected
/// bucket costs one seek rather than one step per entry.
///
/// When no larger suffix is accepted the head is done, and the source is
/// re-seeked to the first row past it: a scan range spans many heads
/// (one per attribute value), and the next head may still hold accepted
/// buckets. Re-seeks are always clipped to the range of the last `seek`.
/// After `max_reseeks` re-seeks in one advance the iterator falls back
/// to stepping.
pub struct BucketSkipIterator {
    source: Box<dyn SortedKvIterator>,
    buckets: Option<Buckets>,
    max_reseeks: usize,
    range: ByteRange,
    families: Vec<Vec<u8>>,
    inclusive: bool,
}

impl BucketSkipIterator {
    /// An iterator with no accepted suffixes yet. Seeking, advancing or
    /// copying it fails until [`BucketSkipIterator::init`] is called.
    pub fn new(source: Box<dyn SortedKvIterator>) -> Self {
        Self {
            source,
            buckets: None,
            max_reseeks: IndexConfig::default().max_reseeks,
            range: ByteRange::empty(),
            families: Vec::new(),
            inclusive: false,
        }
    }

    pub fn init(&mut self, suffixes: &[Vec<u8>], max_reseeks: usize) -> Result<(), StoreError> {
        self.buckets = Some(Buckets::new(suffixes)?);
        self.max_reseeks = max_reseeks;
        Ok(())
    }

    pub fn from_setting(
        source: Box<dyn SortedKvIterator>,
        setting: &IteratorSetting,
    ) -> Result<Self, StoreError> {
        let mut iter = Self::new(source);
        let max_reseeks = match setting.option(OPT_MAX_RESEEKS) {
            Some(raw) => raw.parse().map_err(|_| {
                StoreError::Iterator(format!("{}: bad option '{OPT_MAX_RESEEKS}'", setting.name))
            })?,
            None => iter.max_reseeks,
        };
        iter.max_reseeks = max_reseeks;
        // Left unconfigured without suffixes; use fails loudly.
        if let Some(suffixes) = decode_optional::<Vec<Vec<u8>>>(setting, OPT_SUFFIXES)? {
            iter.init(&suffixes, max_reseeks)?;
        }
        Ok(iter)
    }

    /// Attach the accepted suffixes to an operator config.
    pub fn configure(setting: &mut IteratorSetting, suffixes: &[Vec<u8>]) -> Result<(), StoreError> {
        let buckets = Buckets::new(suffixes)?;
        setting.add_option(OPT_SUFFIXES, encode_option(&buckets.suffixes.to_vec())?);
        Ok(())
    }

    pub fn setting(suffixes: &[Vec<u8>], max_reseeks: usize) -> Result<IteratorSetting, StoreError> {
        let mut setting = IteratorSetting::new(BUCKET_SKIP_PRIORITY, "bucket-skip", BUCKET_SKIP)
            .with_option(OPT_MAX_RESEEKS, max_reseeks.to_string());
        Self::configure(&mut setting, suffixes)?;
        Ok(setting)
    }

    fn buckets(&self) -> Result<&Buckets, StoreError> {
        self.buckets
            .as_ref()
            .ok_or_else(|| StoreError::Protocol("bucket-skip iterator has no accepted suffixes".into()))
    }

    fn decide(&self, buckets: &Buckets, reseeks: usize) -> Advance {
        let Some(key) = self.source.top_key() else {
            return Advance::Stop;
        };
        let row = key.row.as_slice();
        let Some(split) = row.len().checked_sub(buckets.width) else {
            tracing::trace!(row = ?row, "row shorter than a bucket suffix");
            return Advance::Step;
        };
        let (head, suffix) = row.split_at(split);
        if buckets.accepts(suffix) {
            return Advance::Stop;
        }
        if reseeks >= self.max_reseeks {
            tracing::trace!(row = ?row, reseeks, "re-seek budget spent, stepping");
            return Advance::Step;
        }
        let start = match buckets.next_after(suffix) {
            Some(next) => [head, next].concat(),
            None => match following_prefix(head) {
                Some(after) => after,
                None => return Advance::Step,
            },
        };
        let target = ByteRange::new(Bound::Included(start), Bound::Unbounded).clip(&self.range);
        tracing::trace!(row = ?row, target = ?target.start, "skipping rejected bucket");
        Advance::Reseek(target)
    }

    /// Move the source forward until it sits on an accepted entry.
    fn advance(&mut self) -> Result<(), StoreError> {
        let buckets = self.buckets()?.clone();
        let mut reseeks = 0;
        loop {
            match self.decide(&buckets, reseeks) {
                Advance::Stop => return Ok(()),
                Advance::Step => self.source.next()?,
                Advance::Reseek(range) => {
                    reseeks += 1;
                    self.source.seek(&range, &self.families, self.inclusive)?;
                }
            }
        }
    }
}

impl SortedKvIterator for BucketSkipIterator {
    fn seek(
        &mut self,
        range: &ByteRange,
        families: &[Vec<u8>],
        inclusive: bool,
    ) -> Result<(), StoreError> {
        self.buckets()?;
        self.range = range.clone();
        self.families = families.to_vec();
        self.inclusive = inclusive;
        self.source.seek(range, families, inclusive)?;
        self.advance()
    }

    fn top_key(&self) -> Option<&Key> {
        self.source.top_key()
    }

    fn top_value(&self) -> Option<&[u8]> {
        self.source.top_value()
    }

    fn next(&mut self) -> Result<(), StoreError> {
        self.buckets()?;
        if !self.source.has_top() {
            return Ok(());
        }
        self.source.next()?;
        self.advance()
    }

    fn deep_copy(&self) -> Result<Box<dyn SortedKvIterator>, StoreError> {
        let buckets = self.buckets()?.clone();
        Ok(Box::new(Self {
            source: self.source.deep_copy()?,
            buckets: Some(buckets),
            max_reseeks: self.max_reseeks,
            range: self.range.clone(),
            families: self.families.clone(),
            inclusive: self.inclusive,
        }))
    }
}
