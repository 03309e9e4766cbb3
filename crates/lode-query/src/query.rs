use serde::{Deserialize, Serialize};

use crate::filter::Filter;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QueryHints {
    /// Row-key suffix buckets the caller is interested in. When set, index
    /// scans skip every row whose trailing bytes are not one of these.
    pub accepted_suffixes: Option<Vec<Vec<u8>>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub filter: Filter,
    /// Attributes to return; `None` returns every attribute.
    pub properties: Option<Vec<String>>,
    /// Return one result per distinct value of the scanned attribute.
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub hints: QueryHints,
}

impl Query {
    pub fn new(filter: Filter) -> Self {
        Self {
            filter,
            properties: None,
            unique: false,
            hints: QueryHints::default(),
        }
    }

    pub fn all() -> Self {
        Self::new(Filter::Include)
    }

    pub fn with_properties<I, S>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.properties = Some(properties.into_iter().map(Into::into).collect());
        self
    }

    pub fn distinct(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn with_accepted_suffixes(mut self, suffixes: Vec<Vec<u8>>) -> Self {
        self.hints.accepted_suffixes = Some(suffixes);
        self
    }
}
