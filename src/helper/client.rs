use std::fmt;
use std::sync::Arc;

use crate::firestore::api::DocumentSnapshot;
use crate::firestore::model::{DocumentKey, ResourcePath};
use crate::firestore::remote::Datastore;
use crate::helper::config::HelperSettings;
use crate::helper::error::{
    configuration_error, connection_error, invalid_argument, HelperError, HelperResult,
};
use crate::helper::schema::CollectionSchema;
use crate::helper::timestamps::{Clock, SystemClock};
use crate::helper::{DocumentData, FetchedDocument};

/// The collection a [`FirestoreHelper`] currently operates on.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum CollectionBinding {
    #[default]
    Unbound,
    Bound {
        path: ResourcePath,
        schema: Option<CollectionSchema>,
    },
}

/// Facade over a [`Datastore`] bound to one collection at a time.
///
/// Every write stamps `createdAt` / `updatedAt` and runs inside a store transaction; reads and
/// subscriptions share the same error taxonomy ([`HelperError`]).
#[derive(Clone)]
pub struct FirestoreHelper {
    datastore: Arc<dyn Datastore>,
    binding: CollectionBinding,
    settings: HelperSettings,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for FirestoreHelper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FirestoreHelper")
            .field("binding", &self.binding)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl FirestoreHelper {
    /// Creates an unbound helper. Call [`bind`](Self::bind) before using collection operations.
    pub fn new(datastore: Arc<dyn Datastore>, settings: HelperSettings) -> HelperResult<Self> {
        settings.validate()?;
        Ok(Self {
            datastore,
            binding: CollectionBinding::Unbound,
            settings,
            clock: Arc::new(SystemClock),
        })
    }

    /// Creates a helper bound to `collection_path`, probing the store first when
    /// `settings.verify_connection` is set.
    pub async fn connect(
        datastore: Arc<dyn Datastore>,
        collection_path: &str,
        settings: HelperSettings,
    ) -> HelperResult<Self> {
        let mut helper = Self::new(datastore, settings)?;
        helper.bind(collection_path)?;
        if helper.settings.verify_connection {
            helper.check_connection().await?;
        }
        Ok(helper)
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Switches to `collection_path`. Results returned earlier are unaffected.
    pub fn bind(&mut self, collection_path: &str) -> HelperResult<()> {
        self.bind_collection(collection_path, None)
    }

    /// Like [`bind`](Self::bind), additionally validating query filters against `schema`.
    pub fn bind_with_schema(
        &mut self,
        collection_path: &str,
        schema: CollectionSchema,
    ) -> HelperResult<()> {
        self.bind_collection(collection_path, Some(schema))
    }

    fn bind_collection(
        &mut self,
        collection_path: &str,
        schema: Option<CollectionSchema>,
    ) -> HelperResult<()> {
        let path = ResourcePath::collection(collection_path)
            .map_err(|err| configuration_error(err.message()))?;
        log::debug!("binding helper to collection {path}");
        self.binding = CollectionBinding::Bound { path, schema };
        Ok(())
    }

    pub fn unbind(&mut self) {
        self.binding = CollectionBinding::Unbound;
    }

    pub fn binding(&self) -> &CollectionBinding {
        &self.binding
    }

    pub fn is_bound(&self) -> bool {
        matches!(self.binding, CollectionBinding::Bound { .. })
    }

    pub fn settings(&self) -> &HelperSettings {
        &self.settings
    }

    pub fn datastore(&self) -> &Arc<dyn Datastore> {
        &self.datastore
    }

    pub fn collection_path(&self) -> HelperResult<&ResourcePath> {
        match &self.binding {
            CollectionBinding::Bound { path, .. } => Ok(path),
            CollectionBinding::Unbound => Err(configuration_error(
                "No collection is bound; call bind() first",
            )),
        }
    }

    pub fn schema(&self) -> Option<&CollectionSchema> {
        match &self.binding {
            CollectionBinding::Bound { schema, .. } => schema.as_ref(),
            CollectionBinding::Unbound => None,
        }
    }

    /// Reads a probe document to confirm the store answers.
    pub async fn check_connection(&self) -> HelperResult<()> {
        let key = self.document_key(&self.settings.connection_probe_id)?;
        match self.datastore.get_document(&key).await {
            Ok(_) => Ok(()),
            Err(err) => {
                log::warn!("connection probe against {key} failed: {err}");
                Err(connection_error(format!(
                    "Failed to reach the document store: {}",
                    err.message()
                )))
            }
        }
    }

    /// Terminates the underlying store handle.
    pub async fn shutdown(self) -> HelperResult<()> {
        self.datastore.terminate().await.map_err(HelperError::from)
    }

    pub async fn get_document(&self, id: &str) -> HelperResult<DocumentSnapshot> {
        let key = self.document_key(id)?;
        Ok(self.datastore.get_document(&key).await?)
    }

    /// Reads document `id`; `data` is `None` when it does not exist.
    pub async fn get_document_data(&self, id: &str) -> HelperResult<FetchedDocument> {
        let snapshot = self.get_document(id).await?;
        Ok(FetchedDocument {
            id: snapshot.id().to_string(),
            data: snapshot.into_data(),
        })
    }

    pub(crate) fn document_key(&self, id: &str) -> HelperResult<DocumentKey> {
        let collection = self.collection_path()?;
        DocumentKey::in_collection(collection, id).map_err(|err| {
            invalid_argument(format!("Invalid document id '{id}': {}", err.message()))
        })
    }

    pub(crate) fn now_millis(&self) -> i64 {
        self.clock.now_millis()
    }
}

pub(crate) fn document_data(snapshot: DocumentSnapshot) -> Option<DocumentData> {
    let id = snapshot.id().to_string();
    snapshot.into_data().map(|data| DocumentData { id, data })
}
