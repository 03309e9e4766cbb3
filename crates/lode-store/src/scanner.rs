use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::StoreError;
use crate::iterator::{IteratorRegistry, IteratorSetting, SortedKvIterator};
use crate::key::{ByteRange, Key};

// ── Scan accounting ───────────────────────────────────────────

/// Shared open/close counters for the scans of one store.
#[derive(Debug, Default)]
pub struct ScanStats {
    opened: AtomicU64,
    closed: AtomicU64,
}

impl ScanStats {
    pub fn counts(&self) -> ScanCounts {
        ScanCounts {
            opened: self.opened.load(Ordering::SeqCst),
            closed: self.closed.load(Ordering::SeqCst),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanCounts {
    pub opened: u64,
    pub closed: u64,
}

impl ScanCounts {
    /// Scans opened but not yet released.
    pub fn live(&self) -> u64 {
        self.opened - self.closed
    }
}

/// Marks one scan resource as open; releasing it happens exactly once,
/// on drop, whatever path the owner takes out.
struct ScanGuard {
    stats: Arc<ScanStats>,
}

impl ScanGuard {
    fn open(stats: Arc<ScanStats>) -> Self {
        stats.opened.fetch_add(1, Ordering::SeqCst);
        Self { stats }
    }
}

impl Drop for ScanGuard {
    fn drop(&mut self) {
        self.stats.closed.fetch_add(1, Ordering::SeqCst);
    }
}

// ── Scanner ───────────────────────────────────────────────────

/// A configured-but-not-started scan over one table.
///
/// Set the range, fetch families and push iterators, then call
/// [`Scanner::execute`] to obtain the lazy entry sequence.
pub struct Scanner {
    table: String,
    source: Box<dyn SortedKvIterator>,
    registry: IteratorRegistry,
    range: ByteRange,
    families: Vec<Vec<u8>>,
    settings: Vec<IteratorSetting>,
    guard: ScanGuard,
}

impl Scanner {
    pub fn new(
        table: impl Into<String>,
        source: Box<dyn SortedKvIterator>,
        registry: IteratorRegistry,
        stats: Arc<ScanStats>,
    ) -> Self {
        Self {
            table: table.into(),
            source,
            registry,
            range: ByteRange::all(),
            families: Vec::new(),
            settings: Vec::new(),
            guard: ScanGuard::open(stats),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn range(&self) -> &ByteRange {
        &self.range
    }

    pub fn set_range(&mut self, range: ByteRange) {
        self.range = range;
    }

    pub fn fetch_family(&mut self, family: &[u8]) {
        self.families.push(family.to_vec());
    }

    pub fn iterators(&self) -> &[IteratorSetting] {
        &self.settings
    }

    /// Push an iterator onto the scan. Names and priorities must be unique
    /// within one scan.
    pub fn add_iterator(&mut self, setting: IteratorSetting) -> Result<(), StoreError> {
        check_unique(&self.settings, &setting)?;
        self.settings.push(setting);
        Ok(())
    }

    /// Build the iterator stack, seek it to the configured range and hand
    /// back the lazy entry sequence.
    pub fn execute(self) -> Result<ScanIter, StoreError> {
        let Scanner {
            table,
            source,
            registry,
            range,
            families,
            settings,
            guard,
        } = self;
        let stack = registry.build(source, &settings)?;
        let mut iter = ScanIter {
            table,
            stack,
            inclusive: !families.is_empty(),
            families,
            pending: None,
            done: false,
            _guard: guard,
        };
        iter.seek(range)?;
        Ok(iter)
    }
}

fn check_unique(existing: &[IteratorSetting], setting: &IteratorSetting) -> Result<(), StoreError> {
    for s in existing {
        if s.name == setting.name {
            return Err(StoreError::DuplicateIterator(format!(
                "name '{}' already used",
                s.name
            )));
        }
        if s.priority == setting.priority {
            return Err(StoreError::DuplicateIterator(format!(
                "priority {} already used by '{}'",
                s.priority, s.name
            )));
        }
    }
    Ok(())
}

// ── ScanIter ──────────────────────────────────────────────────

/// Lazy, single-pass sequence of entries produced by a scan's iterator
/// stack. Dropping it releases the scan.
pub struct ScanIter {
    table: String,
    stack: Box<dyn SortedKvIterator>,
    families: Vec<Vec<u8>>,
    inclusive: bool,
    pending: Option<StoreError>,
    done: bool,
    _guard: ScanGuard,
}

impl ScanIter {
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Re-position the whole stack at a new range, keeping the pushed
    /// iterators. Used for point lookups that share one open scan.
    pub fn seek(&mut self, range: ByteRange) -> Result<(), StoreError> {
        self.pending = None;
        self.done = false;
        self.stack.seek(&range, &self.families, self.inclusive)
    }

    /// Release the scan explicitly.
    pub fn close(self) {}
}

impl Iterator for ScanIter {
    type Item = Result<(Key, Vec<u8>), StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if let Some(e) = self.pending.take() {
            self.done = true;
            return Some(Err(e));
        }
        let entry = match (self.stack.top_key(), self.stack.top_value()) {
            (Some(k), Some(v)) => (k.clone(), v.to_vec()),
            _ => {
                self.done = true;
                return None;
            }
        };
        if let Err(e) = self.stack.next() {
            self.pending = Some(e);
        }
        Some(Ok(entry))
    }
}

// ── BatchScanner ──────────────────────────────────────────────

/// A scan over several ranges at once.
///
/// The iterator stack is built once and deep-copied per range; each copy
/// runs on its own worker thread, so no seek state is shared between
/// ranges. Results come back grouped in range order.
pub struct BatchScanner {
    table: String,
    source: Box<dyn SortedKvIterator>,
    registry: IteratorRegistry,
    ranges: Vec<ByteRange>,
    families: Vec<Vec<u8>>,
    settings: Vec<IteratorSetting>,
    threads: usize,
    _guard: ScanGuard,
}

impl BatchScanner {
    pub fn new(
        table: impl Into<String>,
        source: Box<dyn SortedKvIterator>,
        registry: IteratorRegistry,
        stats: Arc<ScanStats>,
        threads: usize,
    ) -> Self {
        Self {
            table: table.into(),
            source,
            registry,
            ranges: Vec::new(),
            families: Vec::new(),
            settings: Vec::new(),
            threads: threads.max(1),
            _guard: ScanGuard::open(stats),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn set_ranges(&mut self, ranges: Vec<ByteRange>) {
        self.ranges = ranges;
    }

    pub fn fetch_family(&mut self, family: &[u8]) {
        self.families.push(family.to_vec());
    }

    pub fn add_iterator(&mut self, setting: IteratorSetting) -> Result<(), StoreError> {
        check_unique(&self.settings, &setting)?;
        self.settings.push(setting);
        Ok(())
    }

    pub fn execute(self) -> Result<Vec<(Key, Vec<u8>)>, StoreError> {
        let stack = self.registry.build(self.source, &self.settings)?;
        let inclusive = !self.families.is_empty();
        let families = &self.families;

        let mut out = Vec::new();
        for chunk in self.ranges.chunks(self.threads) {
            let copies = chunk
                .iter()
                .map(|_| stack.deep_copy())
                .collect::<Result<Vec<_>, _>>()?;

            let results: Vec<Result<Vec<(Key, Vec<u8>)>, StoreError>> =
                std::thread::scope(|scope| {
                    let handles: Vec<_> = chunk
                        .iter()
                        .zip(copies)
                        .map(|(range, mut iter)| {
                            scope.spawn(move || drain(iter.as_mut(), range, families, inclusive))
                        })
                        .collect();
                    handles
                        .into_iter()
                        .map(|h| {
                            h.join().unwrap_or_else(|_| {
                                Err(StoreError::Storage("scan worker panicked".into()))
                            })
                        })
                        .collect()
                });

            for result in results {
                out.extend(result?);
            }
        }
        Ok(out)
    }
}

fn drain(
    iter: &mut dyn SortedKvIterator,
    range: &ByteRange,
    families: &[Vec<u8>],
    inclusive: bool,
) -> Result<Vec<(Key, Vec<u8>)>, StoreError> {
    iter.seek(range, families, inclusive)?;
    let mut entries = Vec::new();
    while let (Some(k), Some(v)) = (iter.top_key(), iter.top_value()) {
        entries.push((k.clone(), v.to_vec()));
        iter.next()?;
    }
    Ok(entries)
}
