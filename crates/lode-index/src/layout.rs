use lode_store::{ByteRange, Store};

use crate::error::IndexError;

/// Column family every index and record entry is written under.
pub const FAMILY: &[u8] = b"F";

/// Where one feature type's rows live: the attribute index table, the
/// record table, and the sharing prefix that namespaces this type's rows
/// when several types share the same tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableLayout {
    pub index_table: String,
    pub record_table: String,
    pub sharing: Vec<u8>,
}

impl TableLayout {
    pub fn new(index_table: impl Into<String>, record_table: impl Into<String>) -> Self {
        Self {
            index_table: index_table.into(),
            record_table: record_table.into(),
            sharing: Vec::new(),
        }
    }

    /// Conventional table names for a catalog and feature type.
    pub fn for_type(catalog: &str, type_name: &str) -> Self {
        Self::new(
            format!("{catalog}_{type_name}_attr"),
            format!("{catalog}_{type_name}_records"),
        )
    }

    pub fn with_sharing(mut self, sharing: impl Into<Vec<u8>>) -> Self {
        self.sharing = sharing.into();
        self
    }

    pub fn create_tables<S: Store>(&self, store: &S) -> Result<(), IndexError> {
        for table in [&self.index_table, &self.record_table] {
            if !store.table_exists(table) {
                store.create_table(table)?;
                tracing::debug!(table = %table, "created table");
            }
        }
        Ok(())
    }

    pub fn record_row(&self, id: &str) -> Vec<u8> {
        let mut row = Vec::with_capacity(self.sharing.len() + id.len());
        row.extend_from_slice(&self.sharing);
        row.extend_from_slice(id.as_bytes());
        row
    }

    /// Every record row of this layout's sharing namespace.
    pub fn record_range(&self) -> ByteRange {
        if self.sharing.is_empty() {
            return ByteRange::all();
        }
        ByteRange::prefix(self.sharing.clone())
    }
}
