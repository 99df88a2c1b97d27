#![doc = include_str!("README.md")]
mod client;
pub mod config;
pub mod error;
pub mod id;
mod mutation;
mod query;
pub mod schema;
mod subscribe;
pub mod timestamps;

use std::collections::BTreeMap;

use crate::firestore::value::FirestoreValue;

pub use client::{CollectionBinding, FirestoreHelper};
pub use config::HelperSettings;
pub use error::{HelperError, HelperErrorCode, HelperResult};
pub use id::{generate_random_id, generate_unique_id};
pub use mutation::{DocumentUpdate, NewDocument};
pub use query::{FindOptions, QueryFilter, MAX_DISJUNCTION_VALUES};
pub use schema::CollectionSchema;
pub use subscribe::{Subscription, Watch};
pub use timestamps::{Clock, ManualClock, SystemClock, CREATED_AT, UPDATED_AT};

/// Field name to value mapping of a document. Never contains the document id.
pub type DocumentMap = BTreeMap<String, FirestoreValue>;

/// A document that exists, with its id.
#[derive(Clone, Debug, PartialEq)]
pub struct DocumentData {
    pub id: String,
    pub data: DocumentMap,
}

/// Result of a single-document read; `data` is `None` when the document does not exist.
#[derive(Clone, Debug, PartialEq)]
pub struct FetchedDocument {
    pub id: String,
    pub data: Option<DocumentMap>,
}

impl FetchedDocument {
    pub fn exists(&self) -> bool {
        self.data.is_some()
    }
}
