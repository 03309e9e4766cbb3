use serde::{Deserialize, Serialize};

use crate::codec::DEFAULT_BUCKETS;
use crate::error::IndexError;

/// Tuning for planning and scan execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Allow answering queries from index rows alone when they cover the
    /// request. When false every attribute scan joins against the record
    /// table.
    pub index_only: bool,
    /// The index table is known to hold at most one row per feature, so
    /// multi-valued scans skip de-duplication.
    pub dedup_free_index: bool,
    /// Re-seeks a skipping iterator may issue within a single advance
    /// before falling back to stepping.
    pub max_reseeks: usize,
    /// Buckets index rows are spread over by feature id. Fixed for the
    /// life of an index table; rows written under another count end in
    /// buckets the hint filter does not expect.
    pub buckets: u8,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            index_only: true,
            dedup_free_index: false,
            max_reseeks: 32,
            buckets: DEFAULT_BUCKETS,
        }
    }
}

impl IndexConfig {
    pub fn from_json(json: &str) -> Result<Self, IndexError> {
        let config: Self = serde_json::from_str(json).map_err(|e| IndexError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), IndexError> {
        if self.buckets == 0 {
            return Err(IndexError::Config("buckets must be at least 1".into()));
        }
        Ok(())
    }
}
