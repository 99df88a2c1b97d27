use std::fmt;
use std::sync::Arc;

use async_channel::{Receiver, Sender};
use futures::stream::{self, Stream};

use crate::firestore::api::{DocumentSnapshot, QuerySnapshot};
use crate::firestore::error::FirestoreResult;
use crate::firestore::remote::{DocumentListener, QueryListener};
use crate::helper::client::{document_data, FirestoreHelper};
use crate::helper::error::{not_found, query_error, HelperError, HelperResult};
use crate::helper::query::QueryFilter;
use crate::helper::DocumentData;
use crate::util::subscribe::ListenerRegistration;

/// Handle for a live listener. Dropping it detaches the listener.
pub struct Subscription {
    registration: ListenerRegistration,
}

impl Subscription {
    fn new(registration: ListenerRegistration) -> Self {
        Self { registration }
    }

    pub fn is_active(&self) -> bool {
        self.registration.is_active()
    }

    pub fn unsubscribe(self) {
        self.registration.detach();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

/// Pull-style subscription: notifications queue up until [`Watch::next`] takes them.
pub struct Watch<T> {
    receiver: Receiver<HelperResult<T>>,
    subscription: Subscription,
}

impl<T> Watch<T> {
    /// Waits for the next notification. Returns `None` once the listener is gone and the queue
    /// is drained.
    pub async fn next(&mut self) -> Option<HelperResult<T>> {
        self.receiver.recv().await.ok()
    }

    /// Takes a queued notification without waiting.
    pub fn try_next(&mut self) -> Option<HelperResult<T>> {
        self.receiver.try_recv().ok()
    }

    pub fn unsubscribe(self) {
        self.subscription.unsubscribe();
    }

    /// Adapts the watch into a [`Stream`]; the listener stays attached while the stream lives.
    pub fn into_stream(self) -> impl Stream<Item = HelperResult<T>> {
        stream::unfold(self, |mut watch| async move {
            let item = watch.next().await?;
            Some((item, watch))
        })
    }
}

fn forward<T: Send + 'static>(
    sender: Sender<HelperResult<T>>,
) -> impl Fn(HelperResult<T>) + Send + Sync + 'static {
    move |result| {
        // A closed channel means the watch was dropped; the registration goes with it.
        let _ = sender.try_send(result);
    }
}

impl FirestoreHelper {
    /// Calls `on_change` with the current state of document `id` and again after every change.
    ///
    /// A missing or deleted document is reported as `NotFound`; the listener stays attached.
    pub async fn subscribe_document<F>(&self, id: &str, on_change: F) -> HelperResult<Subscription>
    where
        F: Fn(HelperResult<DocumentData>) + Send + Sync + 'static,
    {
        let key = self.document_key(id)?;
        let path = key.to_string();
        let listener: DocumentListener = Arc::new(move |result: FirestoreResult<DocumentSnapshot>| {
            match result {
                Ok(snapshot) => {
                    let id = snapshot.id().to_string();
                    match document_data(snapshot) {
                        Some(data) => on_change(Ok(data)),
                        None => on_change(Err(not_found(format!(
                            "Document with ID '{id}' not found"
                        )))),
                    }
                }
                Err(err) => {
                    log::warn!("document listener on {path} failed: {err}");
                    on_change(Err(HelperError::from(err)));
                }
            }
        });
        let registration = self.datastore().listen_document(&key, listener).await?;
        Ok(Subscription::new(registration))
    }

    /// Calls `on_change` with every document of the bound collection, now and after each change.
    pub async fn subscribe_collection<F>(&self, on_change: F) -> HelperResult<Subscription>
    where
        F: Fn(HelperResult<Vec<DocumentData>>) + Send + Sync + 'static,
    {
        self.subscribe_query(&[], on_change).await
    }

    /// Calls `on_change` with the documents matching `filters`, now and after each change.
    ///
    /// Fails up front with `IndexRequired` when the store needs a composite index for the query.
    pub async fn subscribe_query<F>(
        &self,
        filters: &[QueryFilter],
        on_change: F,
    ) -> HelperResult<Subscription>
    where
        F: Fn(HelperResult<Vec<DocumentData>>) + Send + Sync + 'static,
    {
        let query = self.build_query(filters)?;
        let path = query.collection_path().to_string();
        let listener: QueryListener = Arc::new(move |result: FirestoreResult<QuerySnapshot>| {
            match result {
                Ok(snapshot) => on_change(Ok(snapshot
                    .into_iter()
                    .filter_map(document_data)
                    .collect())),
                Err(err) => {
                    log::warn!("query listener on {path} failed: {err}");
                    on_change(Err(query_error(err)));
                }
            }
        });
        let registration = self
            .datastore()
            .listen_query(&query, listener)
            .await
            .map_err(query_error)?;
        Ok(Subscription::new(registration))
    }

    pub async fn watch_document(&self, id: &str) -> HelperResult<Watch<DocumentData>> {
        let (sender, receiver) = async_channel::unbounded();
        let subscription = self.subscribe_document(id, forward(sender)).await?;
        Ok(Watch {
            receiver,
            subscription,
        })
    }

    pub async fn watch_query(
        &self,
        filters: &[QueryFilter],
    ) -> HelperResult<Watch<Vec<DocumentData>>> {
        let (sender, receiver) = async_channel::unbounded();
        let subscription = self.subscribe_query(filters, forward(sender)).await?;
        Ok(Watch {
            receiver,
            subscription,
        })
    }
}
