use bson::{Bson, Document};
use serde::{Deserialize, Serialize};

use crate::error::EncodingError;

/// A record: identifier plus attribute values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub id: String,
    pub attributes: Document,
}

impl Feature {
    pub fn new(id: impl Into<String>, attributes: Document) -> Self {
        Self {
            id: id.into(),
            attributes,
        }
    }

    pub fn get(&self, name: &str) -> Option<&Bson> {
        self.attributes.get(name)
    }

    /// Keep only the listed attributes, in the listed order.
    pub fn project(self, properties: &[String]) -> Self {
        let mut attributes = Document::new();
        for name in properties {
            if let Some(v) = self.attributes.get(name) {
                attributes.insert(name.clone(), v.clone());
            }
        }
        Self {
            id: self.id,
            attributes,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, EncodingError> {
        Ok(bson::serialize_to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EncodingError> {
        Ok(bson::deserialize_from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn bytes_round_trip() {
        let f = Feature::new("f1", doc! { "name": "alice", "age": 30_i32 });
        assert_eq!(Feature::from_bytes(&f.to_bytes().unwrap()).unwrap(), f);
    }

    #[test]
    fn project_keeps_requested_order() {
        let f = Feature::new("f1", doc! { "a": 1_i32, "b": 2_i32, "c": 3_i32 });
        let p = f.project(&["c".to_string(), "a".to_string(), "zz".to_string()]);
        let keys: Vec<_> = p.attributes.keys().cloned().collect();
        assert_eq!(keys, vec!["c", "a"]);
    }
}
