use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::firestore::api::DocumentSnapshot;
use crate::firestore::error::{invalid_argument, FirestoreError, FirestoreErrorCode, FirestoreResult};
use crate::firestore::model::DocumentKey;
use crate::firestore::remote::datastore::{Datastore, ReadPrecondition, WriteOperation};
use crate::firestore::value::MapValue;
use crate::platform::runtime::sleep;
use crate::util::backoff::{calculate_backoff_millis, BackoffConfig};

pub const DEFAULT_MAX_ATTEMPTS: usize = 5;

/// Retry behaviour for [`run_transaction`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TransactionOptions {
    /// Total number of attempts, including the first one.
    pub max_attempts: usize,
    pub backoff: BackoffConfig,
}

impl Default for TransactionOptions {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: BackoffConfig::default(),
        }
    }
}

/// Buffers reads and writes for one transaction attempt.
///
/// Every read records the version it observed; the commit sends those
/// versions as preconditions so the store rejects the attempt when another
/// writer got there first. All reads must happen before the first write.
pub struct Transaction {
    datastore: Arc<dyn Datastore>,
    reads: BTreeMap<DocumentKey, Option<u64>>,
    writes: Vec<WriteOperation>,
}

impl Transaction {
    pub(crate) fn new(datastore: Arc<dyn Datastore>) -> Self {
        Self {
            datastore,
            reads: BTreeMap::new(),
            writes: Vec::new(),
        }
    }

    /// Reads `key` as part of the transaction.
    pub async fn get(&mut self, key: &DocumentKey) -> FirestoreResult<DocumentSnapshot> {
        if !self.writes.is_empty() {
            return Err(invalid_argument(
                "Firestore transactions require all reads to be executed before all writes.",
            ));
        }
        let snapshot = self.datastore.get_document(key).await?;
        self.reads.entry(key.clone()).or_insert(snapshot.version());
        Ok(snapshot)
    }

    pub fn set(&mut self, key: &DocumentKey, data: MapValue, merge: bool) -> &mut Self {
        self.writes.push(WriteOperation::Set {
            key: key.clone(),
            data,
            merge,
        });
        self
    }

    pub fn update(&mut self, key: &DocumentKey, data: MapValue) -> &mut Self {
        self.writes.push(WriteOperation::Update {
            key: key.clone(),
            data,
        });
        self
    }

    pub fn delete(&mut self, key: &DocumentKey) -> &mut Self {
        self.writes.push(WriteOperation::Delete { key: key.clone() });
        self
    }

    async fn commit(self) -> FirestoreResult<()> {
        if self.writes.is_empty() {
            return Ok(());
        }
        let preconditions = self
            .reads
            .into_iter()
            .map(|(key, version)| ReadPrecondition { key, version })
            .collect();
        self.datastore.commit(self.writes, preconditions).await
    }
}

/// Runs `update_fn` inside a transaction and commits the writes it staged.
///
/// `update_fn` receives the transaction by value and hands it back together
/// with its result. When the commit fails with `aborted` (a document read by
/// the attempt changed before the commit) the whole attempt is re-run, up to
/// `options.max_attempts` times. Errors returned by `update_fn` are never
/// retried.
pub async fn run_transaction<T, E, F, Fut>(
    datastore: Arc<dyn Datastore>,
    options: &TransactionOptions,
    mut update_fn: F,
) -> Result<T, E>
where
    F: FnMut(Transaction) -> Fut,
    Fut: Future<Output = Result<(Transaction, T), E>>,
    E: From<FirestoreError>,
{
    let max_attempts = options.max_attempts.max(1);
    let mut attempt = 0usize;
    loop {
        attempt += 1;
        let transaction = Transaction::new(Arc::clone(&datastore));
        let (transaction, value) = update_fn(transaction).await?;
        match transaction.commit().await {
            Ok(()) => return Ok(value),
            Err(err) if err.code == FirestoreErrorCode::Aborted && attempt < max_attempts => {
                let delay = calculate_backoff_millis((attempt - 1) as u32, options.backoff);
                log::debug!("transaction attempt {attempt} aborted ({err}); retrying in {delay}ms");
                sleep(Duration::from_millis(delay)).await;
            }
            Err(err) => return Err(E::from(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::firestore::remote::datastore::InMemoryDatastore;
    use crate::firestore::value::FirestoreValue;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn key(path: &str) -> DocumentKey {
        DocumentKey::from_string(path).unwrap()
    }

    fn counter(value: i64) -> MapValue {
        MapValue::new(BTreeMap::from([(
            "count".to_string(),
            FirestoreValue::from_integer(value),
        )]))
    }

    fn fast_retries(max_attempts: usize) -> TransactionOptions {
        TransactionOptions {
            max_attempts,
            backoff: BackoffConfig {
                interval_millis: 0,
                ..BackoffConfig::default()
            },
        }
    }

    #[tokio::test]
    async fn commits_staged_writes() {
        let store = InMemoryDatastore::new();
        let datastore: Arc<dyn Datastore> = Arc::new(store.clone());
        let target = key("counters/main");

        let result: FirestoreResult<&str> =
            run_transaction(Arc::clone(&datastore), &TransactionOptions::default(), |mut tx| {
                let target = target.clone();
                async move {
                    let snapshot = tx.get(&target).await?;
                    assert!(!snapshot.exists());
                    tx.set(&target, counter(1), false);
                    Ok::<_, FirestoreError>((tx, "done"))
                }
            })
            .await;

        assert_eq!(result.unwrap(), "done");
        let stored = store.get_document(&target).await.unwrap();
        assert_eq!(stored.get("count"), Some(&FirestoreValue::from_integer(1)));
    }

    #[tokio::test]
    async fn reads_after_writes_are_rejected() {
        let datastore: Arc<dyn Datastore> = Arc::new(InMemoryDatastore::new());
        let target = key("counters/main");
        let err = run_transaction::<(), FirestoreError, _, _>(
            datastore,
            &TransactionOptions::default(),
            |mut tx| {
                let target = target.clone();
                async move {
                    tx.set(&target, counter(1), false);
                    tx.get(&target).await?;
                    Ok::<_, FirestoreError>((tx, ()))
                }
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.code_str(), "firestore/invalid-argument");
    }

    #[tokio::test]
    async fn retries_when_a_concurrent_writer_wins() {
        let store = InMemoryDatastore::new();
        let datastore: Arc<dyn Datastore> = Arc::new(store.clone());
        let target = key("counters/main");
        store
            .commit(vec![WriteOperation::Set { key: target.clone(), data: counter(1), merge: false }], vec![])
            .await
            .unwrap();

        let attempts = AtomicUsize::new(0);
        let result: FirestoreResult<i64> = run_transaction(Arc::clone(&datastore), &fast_retries(5), |mut tx| {
            let target = target.clone();
            let store = store.clone();
            let attempt = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                let snapshot = tx.get(&target).await?;
                let current = snapshot.get("count").and_then(FirestoreValue::as_integer).unwrap_or(0);
                if attempt == 0 {
                    store
                        .commit(
                            vec![WriteOperation::Set { key: target.clone(), data: counter(10), merge: false }],
                            vec![],
                        )
                        .await?;
                }
                tx.set(&target, counter(current + 1), false);
                Ok::<_, FirestoreError>((tx, current + 1))
            }
        })
        .await;

        assert_eq!(result.unwrap(), 11);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let store = InMemoryDatastore::new();
        let datastore: Arc<dyn Datastore> = Arc::new(store.clone());
        let target = key("counters/main");
        let attempts = AtomicUsize::new(0);

        let err = run_transaction::<(), FirestoreError, _, _>(datastore, &fast_retries(2), |mut tx| {
            let target = target.clone();
            let store = store.clone();
            attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                tx.get(&target).await?;
                store
                    .commit(vec![WriteOperation::Delete { key: target.clone() }], vec![])
                    .await?;
                store
                    .commit(vec![WriteOperation::Set { key: target.clone(), data: counter(0), merge: false }], vec![])
                    .await?;
                tx.set(&target, counter(5), false);
                Ok::<_, FirestoreError>((tx, ()))
            }
        })
        .await
        .unwrap_err();

        assert_eq!(err.code_str(), "firestore/aborted");
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }
}
