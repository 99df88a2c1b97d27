use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use async_trait::async_trait;

use crate::firestore::api::{DocumentSnapshot, QueryDefinition, QuerySnapshot};
use crate::firestore::error::{aborted, failed_precondition, not_found, unavailable, FirestoreResult};
use crate::firestore::model::DocumentKey;
use crate::firestore::query_evaluator::apply_query_to_documents;
use crate::firestore::value::MapValue;
use crate::util::subscribe::ListenerRegistration;

use super::{Datastore, DocumentListener, QueryListener, ReadPrecondition, WriteOperation};

/// Process-local document store.
///
/// Every commit bumps a global version counter; reads expose the version so
/// transactions can detect concurrent writers. Listeners are notified
/// synchronously after each successful commit, outside of any lock.
#[derive(Clone, Default)]
pub struct InMemoryDatastore {
    inner: Arc<InMemoryInner>,
}

#[derive(Default)]
struct InMemoryInner {
    documents: Mutex<BTreeMap<DocumentKey, StoredDocument>>,
    listeners: Mutex<BTreeMap<u64, Listener>>,
    indexes: Mutex<Vec<CompositeIndex>>,
    next_listener_id: AtomicU64,
    last_version: AtomicU64,
    enforce_indexes: AtomicBool,
    terminated: AtomicBool,
}

#[derive(Clone, Debug)]
struct StoredDocument {
    data: MapValue,
    version: u64,
}

#[derive(Clone)]
enum Listener {
    Document {
        key: DocumentKey,
        callback: DocumentListener,
    },
    Query {
        query: QueryDefinition,
        callback: QueryListener,
    },
}

#[derive(Clone, Debug)]
struct CompositeIndex {
    collection_id: String,
    fields: BTreeSet<String>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl InMemoryDatastore {
    pub fn new() -> Self {
        Self::default()
    }

    /// When enabled, queries that combine an inequality or ordering with other fields fail with
    /// `failed-precondition` unless a matching index was declared.
    pub fn require_composite_indexes(self, enforce: bool) -> Self {
        self.inner.enforce_indexes.store(enforce, Ordering::SeqCst);
        self
    }

    /// Declares a composite index over `fields` for every collection named `collection_id`.
    pub fn declare_index<I, S>(&self, collection_id: &str, fields: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        lock(&self.inner.indexes).push(CompositeIndex {
            collection_id: collection_id.to_string(),
            fields: fields.into_iter().map(Into::into).collect(),
        });
    }

    /// Number of stored documents across all collections.
    pub fn len(&self) -> usize {
        lock(&self.inner.documents).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.inner.listeners).len()
    }

    fn ensure_active(&self) -> FirestoreResult<()> {
        if self.inner.terminated.load(Ordering::SeqCst) {
            return Err(unavailable("The client has already been terminated."));
        }
        Ok(())
    }

    fn snapshot_of(&self, key: &DocumentKey) -> DocumentSnapshot {
        let documents = lock(&self.inner.documents);
        match documents.get(key) {
            Some(stored) => {
                DocumentSnapshot::new(key.clone(), Some(stored.data.clone()), Some(stored.version))
            }
            None => DocumentSnapshot::missing(key.clone()),
        }
    }

    fn check_index(&self, query: &QueryDefinition) -> FirestoreResult<()> {
        if !self.inner.enforce_indexes.load(Ordering::SeqCst) {
            return Ok(());
        }
        let Some(required) = query.composite_index_fields() else {
            return Ok(());
        };
        let collection_id = query.collection_path().last_segment().unwrap_or_default();
        let declared = lock(&self.inner.indexes).iter().any(|index| {
            index.collection_id == collection_id && index.fields == required
        });
        if declared {
            return Ok(());
        }
        let fields = required.into_iter().collect::<Vec<_>>().join(", ");
        Err(failed_precondition(format!(
            "The query requires a composite index on collection '{collection_id}' covering [{fields}]"
        )))
    }

    fn evaluate(&self, query: &QueryDefinition) -> FirestoreResult<QuerySnapshot> {
        self.check_index(query)?;
        let candidates = {
            let documents = lock(&self.inner.documents);
            documents
                .iter()
                .filter(|(key, _)| query.matches_collection(key))
                .map(|(key, stored)| {
                    DocumentSnapshot::new(key.clone(), Some(stored.data.clone()), Some(stored.version))
                })
                .collect::<Vec<_>>()
        };
        Ok(QuerySnapshot::new(apply_query_to_documents(candidates, query)))
    }

    fn apply_write(
        documents: &mut BTreeMap<DocumentKey, StoredDocument>,
        write: WriteOperation,
        version: u64,
    ) -> FirestoreResult<()> {
        match write {
            WriteOperation::Set { key, data, merge } => {
                let data = match documents.remove(&key) {
                    Some(mut existing) if merge => {
                        existing.data.merge(data);
                        existing.data
                    }
                    _ => data,
                };
                documents.insert(key, StoredDocument { data, version });
            }
            WriteOperation::Update { key, data } => {
                let stored = documents
                    .get_mut(&key)
                    .ok_or_else(|| not_found(format!("No document to update: {key}")))?;
                let mut fields = stored.data.clone().into_fields();
                fields.extend(data.into_fields());
                stored.data = MapValue::new(fields);
                stored.version = version;
            }
            WriteOperation::Delete { key } => {
                documents.remove(&key);
            }
        }
        Ok(())
    }

    fn register(&self, listener: Listener) -> ListenerRegistration {
        let id = self.inner.next_listener_id.fetch_add(1, Ordering::SeqCst);
        lock(&self.inner.listeners).insert(id, listener);

        let weak: Weak<InMemoryInner> = Arc::downgrade(&self.inner);
        ListenerRegistration::new(Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                lock(&inner.listeners).remove(&id);
            }
        }))
    }

    fn notify(&self, changed: &BTreeSet<DocumentKey>) {
        let listeners: Vec<Listener> = lock(&self.inner.listeners).values().cloned().collect();
        for listener in listeners {
            match listener {
                Listener::Document { key, callback } => {
                    if changed.contains(&key) {
                        callback(Ok(self.snapshot_of(&key)));
                    }
                }
                Listener::Query { query, callback } => {
                    if changed.iter().any(|key| query.matches_collection(key)) {
                        callback(self.evaluate(&query));
                    }
                }
            }
        }
    }
}

#[async_trait]
impl Datastore for InMemoryDatastore {
    async fn get_document(&self, key: &DocumentKey) -> FirestoreResult<DocumentSnapshot> {
        self.ensure_active()?;
        Ok(self.snapshot_of(key))
    }

    async fn run_query(&self, query: &QueryDefinition) -> FirestoreResult<QuerySnapshot> {
        self.ensure_active()?;
        self.evaluate(query)
    }

    async fn commit(
        &self,
        writes: Vec<WriteOperation>,
        preconditions: Vec<ReadPrecondition>,
    ) -> FirestoreResult<()> {
        self.ensure_active()?;
        let changed: BTreeSet<DocumentKey> = writes.iter().map(|write| write.key().clone()).collect();
        {
            let mut documents = lock(&self.inner.documents);
            for precondition in &preconditions {
                let current = documents.get(&precondition.key).map(|stored| stored.version);
                if current != precondition.version {
                    return Err(aborted(format!(
                        "Transaction conflict: {} changed since it was read",
                        precondition.key
                    )));
                }
            }

            let version = self.inner.last_version.fetch_add(1, Ordering::SeqCst) + 1;
            let mut staged = documents.clone();
            for write in writes {
                Self::apply_write(&mut staged, write, version)?;
            }
            *documents = staged;
        }

        if !changed.is_empty() {
            self.notify(&changed);
        }
        Ok(())
    }

    async fn listen_document(
        &self,
        key: &DocumentKey,
        listener: DocumentListener,
    ) -> FirestoreResult<ListenerRegistration> {
        self.ensure_active()?;
        let registration = self.register(Listener::Document {
            key: key.clone(),
            callback: Arc::clone(&listener),
        });
        listener(Ok(self.snapshot_of(key)));
        Ok(registration)
    }

    async fn listen_query(
        &self,
        query: &QueryDefinition,
        listener: QueryListener,
    ) -> FirestoreResult<ListenerRegistration> {
        self.ensure_active()?;
        let initial = self.evaluate(query)?;
        let registration = self.register(Listener::Query {
            query: query.clone(),
            callback: Arc::clone(&listener),
        });
        listener(Ok(initial));
        Ok(registration)
    }

    async fn terminate(&self) -> FirestoreResult<()> {
        self.inner.terminated.store(true, Ordering::SeqCst);
        lock(&self.inner.listeners).clear();
        Ok(())
    }
}
