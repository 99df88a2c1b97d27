use std::fmt::{Display, Formatter};

use crate::firestore::error::{invalid_argument, FirestoreResult};
use crate::firestore::model::ResourcePath;

/// Address of a single document: a collection path plus a document id.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocumentKey {
    path: ResourcePath,
}

impl DocumentKey {
    pub fn from_path(path: ResourcePath) -> FirestoreResult<Self> {
        if path.is_empty() || path.len() % 2 != 0 {
            return Err(invalid_argument(
                "Document keys must point to a document (even number of segments)",
            ));
        }
        Ok(Self { path })
    }

    pub fn from_string(path: &str) -> FirestoreResult<Self> {
        Self::from_path(ResourcePath::from_string(path)?)
    }

    /// Builds the key of document `id` inside `collection`.
    pub fn in_collection(collection: &ResourcePath, id: &str) -> FirestoreResult<Self> {
        if id.is_empty() {
            return Err(invalid_argument("Document ID cannot be empty."));
        }
        if id.contains('/') {
            return Err(invalid_argument("Document ID cannot contain '/'."));
        }
        Self::from_path(collection.child(id))
    }

    pub fn collection_path(&self) -> ResourcePath {
        self.path.without_last()
    }

    pub fn path(&self) -> &ResourcePath {
        &self.path
    }

    pub fn id(&self) -> &str {
        self.path.last_segment().unwrap_or_default()
    }
}

impl Display for DocumentKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validates_even_segments() {
        let err = DocumentKey::from_string("cities").unwrap_err();
        assert_eq!(err.code_str(), "firestore/invalid-argument");
    }

    #[test]
    fn parses_valid_path() {
        let key = DocumentKey::from_string("cities/sf").unwrap();
        assert_eq!(key.id(), "sf");
        assert_eq!(key.collection_path().canonical_string(), "cities");
    }

    #[test]
    fn rejects_ids_with_slashes() {
        let cities = ResourcePath::collection("cities").unwrap();
        assert!(DocumentKey::in_collection(&cities, "sf/la").is_err());
        assert!(DocumentKey::in_collection(&cities, "").is_err());
        let key = DocumentKey::in_collection(&cities, "sf").unwrap();
        assert_eq!(key.to_string(), "cities/sf");
    }
}
