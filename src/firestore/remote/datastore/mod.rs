use std::sync::Arc;

use async_trait::async_trait;

use crate::firestore::api::{DocumentSnapshot, QueryDefinition, QuerySnapshot};
use crate::firestore::error::FirestoreResult;
use crate::firestore::model::DocumentKey;
use crate::firestore::value::MapValue;
use crate::util::subscribe::ListenerRegistration;

pub mod in_memory;

#[derive(Clone, Debug, PartialEq)]
pub enum WriteOperation {
    /// Replaces the document, or deep-merges into it when `merge` is set.
    Set {
        key: DocumentKey,
        data: MapValue,
        merge: bool,
    },
    /// Overwrites the given top-level fields; the document must exist.
    Update { key: DocumentKey, data: MapValue },
    Delete { key: DocumentKey },
}

impl WriteOperation {
    pub fn key(&self) -> &DocumentKey {
        match self {
            WriteOperation::Set { key, .. }
            | WriteOperation::Update { key, .. }
            | WriteOperation::Delete { key } => key,
        }
    }
}

/// Version a transaction observed when it read `key`; `None` means the document was absent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReadPrecondition {
    pub key: DocumentKey,
    pub version: Option<u64>,
}

pub type DocumentListener = Arc<dyn Fn(FirestoreResult<DocumentSnapshot>) + Send + Sync + 'static>;
pub type QueryListener = Arc<dyn Fn(FirestoreResult<QuerySnapshot>) + Send + Sync + 'static>;

/// The document store the helper is layered on.
///
/// Implementations own atomicity: `commit` applies every write or none of them and fails with
/// `aborted` when a precondition no longer matches the stored version.
#[async_trait]
pub trait Datastore: Send + Sync + 'static {
    async fn get_document(&self, key: &DocumentKey) -> FirestoreResult<DocumentSnapshot>;

    async fn run_query(&self, query: &QueryDefinition) -> FirestoreResult<QuerySnapshot>;

    async fn commit(
        &self,
        writes: Vec<WriteOperation>,
        preconditions: Vec<ReadPrecondition>,
    ) -> FirestoreResult<()>;

    /// Registers `listener` for `key`; it is called with the current state and again after every
    /// commit touching the document.
    async fn listen_document(
        &self,
        key: &DocumentKey,
        listener: DocumentListener,
    ) -> FirestoreResult<ListenerRegistration>;

    /// Registers `listener` for `query`; it is called with the current results and again after
    /// every commit touching the queried collection.
    async fn listen_query(
        &self,
        query: &QueryDefinition,
        listener: QueryListener,
    ) -> FirestoreResult<ListenerRegistration>;

    /// Releases the client; later calls fail with `unavailable`.
    async fn terminate(&self) -> FirestoreResult<()> {
        Ok(())
    }
}

pub use in_memory::InMemoryDatastore;
