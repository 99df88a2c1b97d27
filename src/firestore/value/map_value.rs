use std::collections::BTreeMap;

use crate::firestore::value::FirestoreValue;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct MapValue {
    fields: BTreeMap<String, FirestoreValue>,
}

impl MapValue {
    pub fn new(fields: BTreeMap<String, FirestoreValue>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &BTreeMap<String, FirestoreValue> {
        &self.fields
    }

    pub fn get(&self, field: &str) -> Option<&FirestoreValue> {
        self.fields.get(field)
    }

    pub fn into_fields(self) -> BTreeMap<String, FirestoreValue> {
        self.fields
    }

    /// Merges `other` into `self`; nested maps are merged recursively, any other value replaces the
    /// existing one.
    pub fn merge(&mut self, other: MapValue) {
        for (key, incoming) in other.fields {
            if incoming.is_map() {
                if let Some(target) = self.fields.get_mut(&key).and_then(FirestoreValue::as_map_mut) {
                    if let Some(source) = incoming.into_map() {
                        target.merge(source);
                    }
                    continue;
                }
            }
            self.fields.insert(key, incoming);
        }
    }
}
