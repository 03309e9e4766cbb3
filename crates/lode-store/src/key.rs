use std::cmp::Ordering;
use std::ops::Bound;

// ── Key ───────────────────────────────────────────────────────
//
// Entries are addressed by `(row, family, qualifier)` and sorted by
// each component in turn. Ranges only constrain the row; every column
// of a row that falls inside a range is visible to the scan.

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Key {
    pub row: Vec<u8>,
    pub family: Vec<u8>,
    pub qualifier: Vec<u8>,
}

impl Key {
    pub fn new(
        row: impl Into<Vec<u8>>,
        family: impl Into<Vec<u8>>,
        qualifier: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            row: row.into(),
            family: family.into(),
            qualifier: qualifier.into(),
        }
    }

    /// The smallest key of `row` (empty family and qualifier).
    pub fn row_start(row: impl Into<Vec<u8>>) -> Self {
        Self {
            row: row.into(),
            family: Vec::new(),
            qualifier: Vec::new(),
        }
    }
}

/// The smallest byte string strictly greater than every string starting
/// with `prefix`: drop trailing `0xFF` bytes, then increment the last.
///
/// `None` when no such string exists (empty input or all `0xFF`), which
/// callers treat as an unbounded end.
pub fn following_prefix(prefix: &[u8]) -> Option<Vec<u8>> {
    let last = prefix.iter().rposition(|&b| b != 0xFF)?;
    let mut out = prefix[..=last].to_vec();
    out[last] += 1;
    Some(out)
}

// ── ByteRange ─────────────────────────────────────────────────

/// A contiguous interval of rows under lexicographic byte order.
///
/// `Unbounded` on either side means the range is open in that direction.
/// An inverted or degenerate range is valid and simply contains nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ByteRange {
    pub start: Bound<Vec<u8>>,
    pub end: Bound<Vec<u8>>,
}

impl ByteRange {
    pub fn new(start: Bound<Vec<u8>>, end: Bound<Vec<u8>>) -> Self {
        Self { start, end }
    }

    pub fn all() -> Self {
        Self {
            start: Bound::Unbounded,
            end: Bound::Unbounded,
        }
    }

    /// Exactly one row, inclusive on both ends.
    pub fn exact(row: impl Into<Vec<u8>>) -> Self {
        let row = row.into();
        Self {
            start: Bound::Included(row.clone()),
            end: Bound::Included(row),
        }
    }

    /// Every row starting with `prefix`. An empty or all-`0xFF` prefix
    /// has no finite end.
    pub fn prefix(prefix: impl Into<Vec<u8>>) -> Self {
        let start = prefix.into();
        let end = match following_prefix(&start) {
            Some(end) => Bound::Excluded(end),
            None => Bound::Unbounded,
        };
        Self {
            start: Bound::Included(start),
            end,
        }
    }

    /// The canonical empty range.
    pub fn empty() -> Self {
        Self {
            start: Bound::Excluded(Vec::new()),
            end: Bound::Excluded(Vec::new()),
        }
    }

    pub fn is_empty(&self) -> bool {
        match (&self.start, &self.end) {
            (_, Bound::Excluded(e)) if e.is_empty() => true,
            (Bound::Unbounded, _) | (_, Bound::Unbounded) => false,
            (Bound::Included(s), Bound::Included(e)) => s > e,
            (Bound::Included(s), Bound::Excluded(e))
            | (Bound::Excluded(s), Bound::Included(e))
            | (Bound::Excluded(s), Bound::Excluded(e)) => s >= e,
        }
    }

    /// True if `row` sorts before the start of this range.
    pub fn is_before_start(&self, row: &[u8]) -> bool {
        match &self.start {
            Bound::Unbounded => false,
            Bound::Included(s) => row < s.as_slice(),
            Bound::Excluded(s) => row <= s.as_slice(),
        }
    }

    /// True if `row` sorts after the end of this range.
    pub fn is_past_end(&self, row: &[u8]) -> bool {
        match &self.end {
            Bound::Unbounded => false,
            Bound::Included(e) => row > e.as_slice(),
            Bound::Excluded(e) => row >= e.as_slice(),
        }
    }

    pub fn contains_row(&self, row: &[u8]) -> bool {
        !self.is_before_start(row) && !self.is_past_end(row)
    }

    /// Intersection of two ranges: the later start and the earlier end.
    pub fn clip(&self, other: &ByteRange) -> ByteRange {
        let start = match cmp_starts(&self.start, &other.start) {
            Ordering::Less => other.start.clone(),
            _ => self.start.clone(),
        };
        let end = match cmp_ends(&self.end, &other.end) {
            Ordering::Greater => other.end.clone(),
            _ => self.end.clone(),
        };
        ByteRange { start, end }
    }
}

/// Order two lower bounds: `Unbounded` is lowest, and for equal bytes an
/// excluded bound starts later than an included one.
fn cmp_starts(a: &Bound<Vec<u8>>, b: &Bound<Vec<u8>>) -> Ordering {
    match (a, b) {
        (Bound::Unbounded, Bound::Unbounded) => Ordering::Equal,
        (Bound::Unbounded, _) => Ordering::Less,
        (_, Bound::Unbounded) => Ordering::Greater,
        (Bound::Included(x), Bound::Included(y)) | (Bound::Excluded(x), Bound::Excluded(y)) => {
            x.cmp(y)
        }
        (Bound::Included(x), Bound::Excluded(y)) => x.cmp(y).then(Ordering::Less),
        (Bound::Excluded(x), Bound::Included(y)) => x.cmp(y).then(Ordering::Greater),
    }
}

/// Order two upper bounds: `Unbounded` is highest, and for equal bytes an
/// excluded bound ends earlier than an included one.
fn cmp_ends(a: &Bound<Vec<u8>>, b: &Bound<Vec<u8>>) -> Ordering {
    match (a, b) {
        (Bound::Unbounded, Bound::Unbounded) => Ordering::Equal,
        (Bound::Unbounded, _) => Ordering::Greater,
        (_, Bound::Unbounded) => Ordering::Less,
        (Bound::Included(x), Bound::Included(y)) | (Bound::Excluded(x), Bound::Excluded(y)) => {
            x.cmp(y)
        }
        (Bound::Included(x), Bound::Excluded(y)) => x.cmp(y).then(Ordering::Greater),
        (Bound::Excluded(x), Bound::Included(y)) => x.cmp(y).then(Ordering::Less),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn incl(b: &[u8]) -> Bound<Vec<u8>> {
        Bound::Included(b.to_vec())
    }

    fn excl(b: &[u8]) -> Bound<Vec<u8>> {
        Bound::Excluded(b.to_vec())
    }

    #[test]
    fn key_orders_by_row_then_columns() {
        let a = Key::new(b"a".to_vec(), b"f".to_vec(), b"2".to_vec());
        let b = Key::new(b"a".to_vec(), b"g".to_vec(), b"1".to_vec());
        let c = Key::new(b"b".to_vec(), b"".to_vec(), b"".to_vec());
        assert!(a < b);
        assert!(b < c);
        assert!(Key::row_start(b"a".to_vec()) < a);
    }

    #[test]
    fn exact_range_contains_only_its_row() {
        let r = ByteRange::exact(b"abc".to_vec());
        assert!(r.contains_row(b"abc"));
        assert!(!r.contains_row(b"ab"));
        assert!(!r.contains_row(b"abcd"));
        assert!(!r.is_empty());
    }

    #[test]
    fn empty_detection() {
        assert!(ByteRange::empty().is_empty());
        assert!(ByteRange::new(incl(b"b"), incl(b"a")).is_empty());
        assert!(ByteRange::new(incl(b"a"), excl(b"a")).is_empty());
        assert!(ByteRange::new(excl(b"a"), incl(b"a")).is_empty());
        assert!(!ByteRange::new(incl(b"a"), incl(b"a")).is_empty());
        assert!(!ByteRange::new(Bound::Unbounded, excl(b"a")).is_empty());
        assert!(!ByteRange::all().is_empty());
    }

    #[test]
    fn bounds_respect_exclusivity() {
        let r = ByteRange::new(excl(b"b"), excl(b"d"));
        assert!(r.is_before_start(b"b"));
        assert!(!r.is_before_start(b"ba"));
        assert!(r.is_past_end(b"d"));
        assert!(!r.is_past_end(b"c"));
    }

    #[test]
    fn clip_takes_later_start_and_earlier_end() {
        let a = ByteRange::new(incl(b"b"), incl(b"m"));
        let b = ByteRange::new(excl(b"d"), Bound::Unbounded);
        let c = a.clip(&b);
        assert_eq!(c.start, excl(b"d"));
        assert_eq!(c.end, incl(b"m"));
    }

    #[test]
    fn clip_prefers_exclusive_on_ties() {
        let a = ByteRange::new(incl(b"b"), incl(b"m"));
        let b = ByteRange::new(excl(b"b"), excl(b"m"));
        let c = a.clip(&b);
        assert_eq!(c.start, excl(b"b"));
        assert_eq!(c.end, excl(b"m"));
    }

    #[test]
    fn following_prefix_increments_last_byte() {
        assert_eq!(following_prefix(b"abc"), Some(b"abd".to_vec()));
        assert_eq!(following_prefix(&[0x01, 0xFF, 0xFF]), Some(vec![0x02]));
        assert_eq!(following_prefix(&[0xFF, 0xFF]), None);
        assert_eq!(following_prefix(&[]), None);
    }

    #[test]
    fn following_prefix_bounds_every_extension() {
        for prefix in [&b"ab"[..], &[0x00][..], &[0x7F, 0xFF][..], &[0x10, 0xFF, 0x00][..]] {
            let next = following_prefix(prefix).unwrap();
            assert!(next.as_slice() > prefix);
            for ext in [&[][..], &[0x00][..], &[0xFF, 0xFF, 0xFF][..]] {
                let mut s = prefix.to_vec();
                s.extend_from_slice(ext);
                assert!(s < next, "{s:?} should sort before {next:?}");
            }
        }
    }

    #[test]
    fn prefix_range_ends_at_the_next_prefix() {
        let r = ByteRange::prefix(b"ab".to_vec());
        assert!(r.contains_row(b"ab"));
        assert!(r.contains_row(b"ab\xff\xff"));
        assert!(!r.contains_row(b"ac"));
        assert_eq!(ByteRange::prefix(b"a\xff".to_vec()).end, excl(b"b"));
        assert_eq!(ByteRange::prefix(b"\xff".to_vec()).end, Bound::Unbounded);
    }

    #[test]
    fn clip_past_end_is_empty() {
        let a = ByteRange::new(incl(b"b"), excl(b"d"));
        let b = ByteRange::new(incl(b"x"), Bound::Unbounded);
        assert!(a.clip(&b).is_empty());
    }
}
