use rand::Rng;

use crate::firestore::model::{DocumentKey, ResourcePath};
use crate::firestore::remote::Datastore;
use crate::helper::error::HelperResult;

const ID_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Samples `length` characters uniformly from `a-z0-9`.
pub fn generate_random_id(length: usize) -> String {
    random_id_with_rng(length, &mut rand::thread_rng())
}

fn random_id_with_rng<R: Rng + ?Sized>(length: usize, rng: &mut R) -> String {
    (0..length)
        .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
        .collect()
}

/// Returns a random id with no document under `collection` at the time of the probe.
///
/// The probe and the later write are not atomic: two writers can still pick the same id between
/// them. With 36^30 candidates the window is accepted.
pub async fn generate_unique_id(
    datastore: &dyn Datastore,
    collection: &ResourcePath,
    length: usize,
) -> HelperResult<String> {
    allocate_with(datastore, collection, || generate_random_id(length)).await
}

/// Probes candidates from `next_candidate` until one is free. Store failures end the search.
pub(crate) async fn allocate_with<F>(
    datastore: &dyn Datastore,
    collection: &ResourcePath,
    mut next_candidate: F,
) -> HelperResult<String>
where
    F: FnMut() -> String,
{
    loop {
        let candidate = next_candidate();
        let key = DocumentKey::in_collection(collection, &candidate)?;
        let snapshot = datastore.get_document(&key).await?;
        if !snapshot.exists() {
            return Ok(candidate);
        }
        log::debug!("generated id {candidate} already exists in {collection}; drawing again");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::firestore::remote::{InMemoryDatastore, WriteOperation};
    use crate::firestore::value::MapValue;
    use crate::helper::error::HelperErrorCode;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::{BTreeMap, VecDeque};

    fn users() -> ResourcePath {
        ResourcePath::collection("users").unwrap()
    }

    #[test]
    fn random_ids_use_lowercase_alphanumerics() {
        let id = generate_random_id(30);
        assert_eq!(id.len(), 30);
        assert!(id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }

    #[test]
    fn seeded_rng_is_deterministic() {
        let first = random_id_with_rng(12, &mut StdRng::seed_from_u64(7));
        let second = random_id_with_rng(12, &mut StdRng::seed_from_u64(7));
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn skips_ids_that_are_taken() {
        let datastore = InMemoryDatastore::new();
        let taken = DocumentKey::in_collection(&users(), "taken").unwrap();
        datastore
            .commit(
                vec![WriteOperation::Set {
                    key: taken,
                    data: MapValue::new(BTreeMap::new()),
                    merge: false,
                }],
                vec![],
            )
            .await
            .unwrap();

        let mut candidates = VecDeque::from(["taken".to_string(), "free".to_string()]);
        let mut draws = 0;
        let id = allocate_with(&datastore, &users(), || {
            draws += 1;
            candidates.pop_front().unwrap_or_default()
        })
        .await
        .unwrap();

        assert_eq!(id, "free");
        assert_eq!(draws, 2);
    }

    #[tokio::test]
    async fn store_failures_are_fatal() {
        let datastore = InMemoryDatastore::new();
        datastore.terminate().await.unwrap();
        let err = generate_unique_id(&datastore, &users(), 30)
            .await
            .unwrap_err();
        assert_eq!(err.code, HelperErrorCode::Unknown);
    }
}
