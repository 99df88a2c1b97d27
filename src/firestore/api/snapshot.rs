use std::collections::BTreeMap;

use crate::firestore::model::DocumentKey;
use crate::firestore::value::{FirestoreValue, MapValue};

/// Point-in-time read of a single document.
///
/// `version` is the store's update version for the document at read time
/// (`None` when the document did not exist); transactions record it as a
/// commit precondition.
#[derive(Clone, Debug, PartialEq)]
pub struct DocumentSnapshot {
    key: DocumentKey,
    data: Option<MapValue>,
    version: Option<u64>,
}

impl DocumentSnapshot {
    pub fn new(key: DocumentKey, data: Option<MapValue>, version: Option<u64>) -> Self {
        Self { key, data, version }
    }

    /// Snapshot of a document that does not exist.
    pub fn missing(key: DocumentKey) -> Self {
        Self::new(key, None, None)
    }

    /// Returns whether the document exists in the store.
    pub fn exists(&self) -> bool {
        self.data.is_some()
    }

    /// Returns the document fields if the snapshot contains data.
    pub fn data(&self) -> Option<&BTreeMap<String, FirestoreValue>> {
        self.data.as_ref().map(|map| map.fields())
    }

    pub fn map_value(&self) -> Option<&MapValue> {
        self.data.as_ref()
    }

    pub fn into_data(self) -> Option<BTreeMap<String, FirestoreValue>> {
        self.data.map(MapValue::into_fields)
    }

    /// Reads a top-level field.
    pub fn get(&self, field: &str) -> Option<&FirestoreValue> {
        self.data.as_ref().and_then(|map| map.get(field))
    }

    pub fn id(&self) -> &str {
        self.key.id()
    }

    pub fn key(&self) -> &DocumentKey {
        &self.key
    }

    pub fn version(&self) -> Option<u64> {
        self.version
    }
}

/// The documents matched by a query, in result order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QuerySnapshot {
    documents: Vec<DocumentSnapshot>,
}

impl QuerySnapshot {
    pub fn new(documents: Vec<DocumentSnapshot>) -> Self {
        Self { documents }
    }

    pub fn documents(&self) -> &[DocumentSnapshot] {
        &self.documents
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn into_documents(self) -> Vec<DocumentSnapshot> {
        self.documents
    }
}

impl IntoIterator for QuerySnapshot {
    type Item = DocumentSnapshot;
    type IntoIter = std::vec::IntoIter<DocumentSnapshot>;

    fn into_iter(self) -> Self::IntoIter {
        self.documents.into_iter()
    }
}
