use std::collections::BTreeSet;
use std::sync::Arc;

use crate::firestore::api::{run_transaction, DocumentSnapshot};
use crate::firestore::model::DocumentKey;
use crate::firestore::value::{FirestoreValue, MapValue};
use crate::helper::client::{document_data, FirestoreHelper};
use crate::helper::error::{
    already_exists, invalid_argument, not_found, unknown_error, HelperError, HelperResult,
};
use crate::helper::id::{allocate_with, generate_random_id};
use crate::helper::timestamps::{
    reject_id_field, stamp_for_create, stamp_for_update, validate_timestamp_fields, CREATED_AT,
    UPDATED_AT,
};
use crate::helper::{DocumentData, DocumentMap};

/// One entry of [`FirestoreHelper::batch_add`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NewDocument {
    /// Explicit id; a unique id is generated when `None`.
    pub id: Option<String>,
    pub data: DocumentMap,
    /// Merge into an existing document with the same explicit id instead of failing.
    pub override_existing: bool,
}

impl NewDocument {
    pub fn new(data: DocumentMap) -> Self {
        Self {
            id: None,
            data,
            override_existing: false,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn overriding(mut self) -> Self {
        self.override_existing = true;
        self
    }
}

/// One entry of [`FirestoreHelper::batch_edit`].
#[derive(Clone, Debug, PartialEq)]
pub struct DocumentUpdate {
    pub id: String,
    pub data: DocumentMap,
}

impl DocumentUpdate {
    pub fn new(id: impl Into<String>, data: DocumentMap) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }
}

#[derive(Clone)]
struct PlannedAdd {
    key: DocumentKey,
    explicit: bool,
    data: DocumentMap,
    override_existing: bool,
}

fn missing(key: &DocumentKey) -> HelperError {
    not_found(format!("Document with ID '{}' not found", key.id()))
}

fn created_at_of(snapshot: &DocumentSnapshot) -> Option<i64> {
    snapshot.get(CREATED_AT).and_then(FirestoreValue::as_integer)
}

fn updated_at_of(snapshot: &DocumentSnapshot) -> Option<i64> {
    snapshot.get(UPDATED_AT).and_then(FirestoreValue::as_integer)
}

fn ensure_unique_ids<'a>(ids: impl IntoIterator<Item = &'a str>) -> HelperResult<()> {
    let mut seen = BTreeSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(invalid_argument(format!(
                "Document ID '{id}' appears more than once in the batch"
            )));
        }
    }
    Ok(())
}

impl FirestoreHelper {
    /// Creates a document and returns its id with the stamped data.
    ///
    /// Without `id` a unique id is allocated. With an explicit `id` that already exists the call
    /// fails with `AlreadyExists`, unless `override_existing` is set: the data is then merged into
    /// the existing document and its `createdAt` is kept.
    pub async fn add_document(
        &self,
        data: DocumentMap,
        id: Option<&str>,
        override_existing: bool,
    ) -> HelperResult<DocumentData> {
        let collection = self.collection_path()?.clone();
        reject_id_field(&data)?;
        let explicit = id.is_some();
        let id = match id {
            Some(id) => id.to_string(),
            None => {
                let length = self.settings().id_length;
                allocate_with(self.datastore().as_ref(), &collection, || {
                    generate_random_id(length)
                })
                .await?
            }
        };
        let plan = PlannedAdd {
            key: self.document_key(&id)?,
            explicit,
            data,
            override_existing,
        };
        let mut added = self.commit_adds(vec![plan]).await?;
        added
            .pop()
            .ok_or_else(|| unknown_error("Add produced no document"))
    }

    /// Applies `data` as a partial update to an existing document and returns the full document.
    ///
    /// `updatedAt` is refreshed; `createdAt` is never changed.
    pub async fn edit_document(&self, id: &str, data: DocumentMap) -> HelperResult<DocumentData> {
        let key = self.document_key(id)?;
        let update = DocumentUpdate::new(id, data);
        self.commit_edits(vec![(key.clone(), update)]).await?;

        let snapshot = self.datastore().get_document(&key).await?;
        document_data(snapshot).ok_or_else(|| missing(&key))
    }

    /// Deletes an existing document; `NotFound` if it is absent.
    pub async fn remove_document(&self, id: &str) -> HelperResult<()> {
        let key = self.document_key(id)?;
        self.commit_removals(vec![key]).await
    }

    /// Adds every entry in one transaction; any violated precondition aborts the whole batch.
    pub async fn batch_add(&self, entries: Vec<NewDocument>) -> HelperResult<Vec<DocumentData>> {
        let collection = self.collection_path()?.clone();
        if entries.is_empty() {
            return Ok(Vec::new());
        }
        self.check_batch_size(entries.len())?;
        for entry in &entries {
            reject_id_field(&entry.data)?;
        }
        ensure_unique_ids(entries.iter().filter_map(|entry| entry.id.as_deref()))?;

        let mut taken: BTreeSet<String> =
            entries.iter().filter_map(|entry| entry.id.clone()).collect();
        let length = self.settings().id_length;
        let mut plans = Vec::with_capacity(entries.len());
        for entry in entries {
            let explicit = entry.id.is_some();
            let id = match entry.id {
                Some(id) => id,
                None => {
                    let id = allocate_with(self.datastore().as_ref(), &collection, || loop {
                        let candidate = generate_random_id(length);
                        if !taken.contains(&candidate) {
                            break candidate;
                        }
                    })
                    .await?;
                    taken.insert(id.clone());
                    id
                }
            };
            plans.push(PlannedAdd {
                key: self.document_key(&id)?,
                explicit,
                data: entry.data,
                override_existing: entry.override_existing,
            });
        }
        self.commit_adds(plans).await
    }

    /// Applies every update in one transaction; all documents must exist.
    pub async fn batch_edit(&self, updates: Vec<DocumentUpdate>) -> HelperResult<()> {
        self.collection_path()?;
        if updates.is_empty() {
            return Ok(());
        }
        self.check_batch_size(updates.len())?;
        ensure_unique_ids(updates.iter().map(|update| update.id.as_str()))?;
        let planned = updates
            .into_iter()
            .map(|update| Ok((self.document_key(&update.id)?, update)))
            .collect::<HelperResult<Vec<_>>>()?;
        self.commit_edits(planned).await
    }

    /// Deletes every listed document in one transaction; all of them must exist.
    pub async fn batch_remove<S: AsRef<str>>(&self, ids: &[S]) -> HelperResult<()> {
        self.collection_path()?;
        if ids.is_empty() {
            return Ok(());
        }
        self.check_batch_size(ids.len())?;
        ensure_unique_ids(ids.iter().map(|id| id.as_ref()))?;
        let keys = ids
            .iter()
            .map(|id| self.document_key(id.as_ref()))
            .collect::<HelperResult<Vec<_>>>()?;
        self.commit_removals(keys).await
    }

    fn check_batch_size(&self, len: usize) -> HelperResult<()> {
        let max = self.settings().max_batch_size;
        if len > max {
            return Err(invalid_argument(format!(
                "Batch of {len} documents exceeds the limit of {max}"
            )));
        }
        Ok(())
    }

    async fn commit_adds(&self, plans: Vec<PlannedAdd>) -> HelperResult<Vec<DocumentData>> {
        let options = self.settings().transaction_options();
        run_transaction(Arc::clone(self.datastore()), &options, |mut tx| {
            let plans = plans.clone();
            let now = self.now_millis();
            async move {
                let mut existing = Vec::with_capacity(plans.len());
                for plan in &plans {
                    existing.push(tx.get(&plan.key).await?);
                }

                let mut added = Vec::with_capacity(plans.len());
                let mut staged = Vec::with_capacity(plans.len());
                for (plan, snapshot) in plans.into_iter().zip(existing) {
                    if plan.explicit && snapshot.exists() && !plan.override_existing {
                        return Err(already_exists(format!(
                            "Document with ID '{}' already exists",
                            plan.key.id()
                        )));
                    }
                    let carried = if plan.override_existing {
                        created_at_of(&snapshot)
                    } else {
                        None
                    };
                    let stamped = stamp_for_create(plan.data, carried, now);
                    added.push(DocumentData {
                        id: plan.key.id().to_string(),
                        data: stamped.clone(),
                    });
                    staged.push((plan.key, MapValue::new(stamped), plan.override_existing));
                }

                for (key, data, merge) in staged {
                    tx.set(&key, data, merge);
                }
                Ok::<_, HelperError>((tx, added))
            }
        })
        .await
    }

    async fn commit_edits(&self, updates: Vec<(DocumentKey, DocumentUpdate)>) -> HelperResult<()> {
        let options = self.settings().transaction_options();
        run_transaction(Arc::clone(self.datastore()), &options, |mut tx| {
            let updates = updates.clone();
            let now = self.now_millis();
            async move {
                let mut existing = Vec::with_capacity(updates.len());
                for (key, _) in &updates {
                    existing.push(tx.get(key).await?);
                }

                let mut staged = Vec::with_capacity(updates.len());
                for ((key, update), snapshot) in updates.into_iter().zip(existing) {
                    if !snapshot.exists() {
                        return Err(missing(&key));
                    }
                    validate_timestamp_fields(&update.data)?;
                    reject_id_field(&update.data)?;
                    let stamped = stamp_for_update(update.data, updated_at_of(&snapshot), now);
                    staged.push((key, MapValue::new(stamped)));
                }

                for (key, data) in staged {
                    tx.update(&key, data);
                }
                Ok::<_, HelperError>((tx, ()))
            }
        })
        .await
    }

    async fn commit_removals(&self, keys: Vec<DocumentKey>) -> HelperResult<()> {
        let options = self.settings().transaction_options();
        run_transaction(Arc::clone(self.datastore()), &options, |mut tx| {
            let keys = keys.clone();
            async move {
                for key in &keys {
                    if !tx.get(key).await?.exists() {
                        return Err(missing(key));
                    }
                }
                for key in &keys {
                    tx.delete(key);
                }
                Ok::<_, HelperError>((tx, ()))
            }
        })
        .await
    }
}
