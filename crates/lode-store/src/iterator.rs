use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::key::{ByteRange, Key};

// ── SortedKvIterator ──────────────────────────────────────────

/// The server-side iterator contract.
///
/// Every pushed operator wraps a source iterator and exposes the same
/// interface, so a scan is a stack of these built bottom-up from the raw
/// table. The exposed "top" entry must always lie inside the range passed
/// to the last `seek`.
pub trait SortedKvIterator: Send {
    /// Position the iterator at the first entry of `range`.
    ///
    /// `families` restricts which column families are visible: when
    /// `inclusive` is true only the listed families are returned, when it
    /// is false the listed families are hidden (an empty exclusive list
    /// means every family).
    fn seek(
        &mut self,
        range: &ByteRange,
        families: &[Vec<u8>],
        inclusive: bool,
    ) -> Result<(), StoreError>;

    fn top_key(&self) -> Option<&Key>;

    fn top_value(&self) -> Option<&[u8]>;

    /// Advance past the current top entry.
    fn next(&mut self) -> Result<(), StoreError>;

    /// An independent copy positioned where this one is. Used when the
    /// store drives several sub-ranges of one scan concurrently, so the
    /// copy must not share mutable state with the original.
    fn deep_copy(&self) -> Result<Box<dyn SortedKvIterator>, StoreError>;

    fn has_top(&self) -> bool {
        self.top_key().is_some()
    }
}

/// Whether `family` is visible under a seek's column-family scope.
pub fn family_visible(family: &[u8], families: &[Vec<u8>], inclusive: bool) -> bool {
    let listed = families.iter().any(|f| f.as_slice() == family);
    if inclusive { listed } else { !listed }
}

// ── IteratorSetting ───────────────────────────────────────────

/// Configuration for one pushed iterator.
///
/// Lower `priority` runs closer to the raw table. Options are plain
/// strings; structured values are JSON-encoded by whoever builds the
/// setting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IteratorSetting {
    pub priority: u32,
    pub name: String,
    pub kind: String,
    pub options: BTreeMap<String, String>,
}

impl IteratorSetting {
    pub fn new(priority: u32, name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            priority,
            name: name.into(),
            kind: kind.into(),
            options: BTreeMap::new(),
        }
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    pub fn add_option(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.options.insert(key.into(), value.into());
    }

    pub fn option(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }

    /// Fetch a required option, failing with an iterator error naming it.
    pub fn require(&self, key: &str) -> Result<&str, StoreError> {
        self.option(key).ok_or_else(|| {
            StoreError::Iterator(format!("{}: missing option '{key}'", self.name))
        })
    }
}

// ── IteratorRegistry ──────────────────────────────────────────

pub type IteratorFactory = Arc<
    dyn Fn(Box<dyn SortedKvIterator>, &IteratorSetting) -> Result<Box<dyn SortedKvIterator>, StoreError>
        + Send
        + Sync,
>;

/// Maps iterator kinds to the factories that build them.
///
/// Cheap to clone; clones share the same table of factories.
#[derive(Clone, Default)]
pub struct IteratorRegistry {
    factories: Arc<RwLock<HashMap<String, IteratorFactory>>>,
}

impl IteratorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&self, kind: &str, factory: F) -> Result<(), StoreError>
    where
        F: Fn(
                Box<dyn SortedKvIterator>,
                &IteratorSetting,
            ) -> Result<Box<dyn SortedKvIterator>, StoreError>
            + Send
            + Sync
            + 'static,
    {
        let mut factories = self
            .factories
            .write()
            .map_err(|e| StoreError::Storage(format!("iterator registry poisoned: {e}")))?;
        factories.insert(kind.to_string(), Arc::new(factory));
        Ok(())
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.factories
            .read()
            .map(|f| f.contains_key(kind))
            .unwrap_or(false)
    }

    /// Stack `settings` on top of `source` in ascending priority order.
    pub fn build(
        &self,
        source: Box<dyn SortedKvIterator>,
        settings: &[IteratorSetting],
    ) -> Result<Box<dyn SortedKvIterator>, StoreError> {
        let mut ordered: Vec<&IteratorSetting> = settings.iter().collect();
        ordered.sort_by_key(|s| s.priority);

        let factories = self
            .factories
            .read()
            .map_err(|e| StoreError::Storage(format!("iterator registry poisoned: {e}")))?;

        let mut top = source;
        for setting in ordered {
            let factory = factories
                .get(&setting.kind)
                .ok_or_else(|| StoreError::UnknownIterator(setting.kind.clone()))?;
            tracing::trace!(
                name = %setting.name,
                kind = %setting.kind,
                priority = setting.priority,
                "stacking iterator"
            );
            top = factory(top, setting)?;
        }
        Ok(top)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn family_scope() {
        let fams = vec![b"F".to_vec()];
        assert!(family_visible(b"F", &fams, true));
        assert!(!family_visible(b"G", &fams, true));
        assert!(!family_visible(b"F", &fams, false));
        assert!(family_visible(b"G", &[], false));
        assert!(!family_visible(b"G", &[], true));
    }

    #[test]
    fn setting_options() {
        let s = IteratorSetting::new(10, "filter", "record-filter").with_option("a", "1");
        assert_eq!(s.option("a"), Some("1"));
        assert!(s.require("b").is_err());
    }
}
