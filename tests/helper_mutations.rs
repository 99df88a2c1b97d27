use std::sync::Arc;

use firestore_helper::firestore::remote::InMemoryDatastore;
use firestore_helper::firestore::value::FirestoreValue;
use firestore_helper::helper::{
    DocumentMap, DocumentUpdate, FirestoreHelper, HelperErrorCode, HelperSettings, ManualClock,
    NewDocument, CREATED_AT, UPDATED_AT,
};

struct Fixture {
    helper: FirestoreHelper,
    store: InMemoryDatastore,
    clock: Arc<ManualClock>,
}

async fn fixture() -> Fixture {
    let store = InMemoryDatastore::new();
    let clock = Arc::new(ManualClock::new(1_700_000_000_000));
    let helper = FirestoreHelper::connect(Arc::new(store.clone()), "users", HelperSettings::default())
        .await
        .expect("connect helper")
        .with_clock(clock.clone());
    Fixture {
        helper,
        store,
        clock,
    }
}

fn doc(entries: &[(&str, FirestoreValue)]) -> DocumentMap {
    entries
        .iter()
        .map(|(key, value)| (key.to_string(), value.clone()))
        .collect()
}

fn millis(data: &DocumentMap, field: &str) -> i64 {
    data.get(field)
        .and_then(FirestoreValue::as_integer)
        .expect("timestamp field")
}

#[tokio::test]
async fn generated_ids_are_thirty_lowercase_alphanumerics() {
    let Fixture { helper, .. } = fixture().await;
    let mut ids = Vec::new();
    for _ in 0..20 {
        let added = helper
            .add_document(doc(&[("name", "Ada".into())]), None, false)
            .await
            .unwrap();
        assert_eq!(added.id.len(), 30);
        assert!(added
            .id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
        ids.push(added.id);
    }
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 20);
}

#[tokio::test]
async fn fresh_documents_have_equal_timestamps() {
    let Fixture { helper, .. } = fixture().await;
    let added = helper
        .add_document(doc(&[("name", "Ada".into())]), None, false)
        .await
        .unwrap();
    let fetched = helper.get_document_data(&added.id).await.unwrap();
    let data = fetched.data.expect("document exists");
    assert_eq!(millis(&data, CREATED_AT), millis(&data, UPDATED_AT));
    assert_eq!(data.get("name"), Some(&FirestoreValue::from_string("Ada")));
}

#[tokio::test]
async fn edit_keeps_created_at_and_advances_updated_at() {
    let Fixture { helper, clock, .. } = fixture().await;
    helper
        .add_document(doc(&[("name", "Ada".into())]), Some("ada"), false)
        .await
        .unwrap();

    clock.advance(5_000);
    let edited = helper
        .edit_document(
            "ada",
            doc(&[
                ("role", "admin".into()),
                (CREATED_AT, FirestoreValue::from_integer(1)),
            ]),
        )
        .await
        .unwrap();

    assert_eq!(millis(&edited.data, CREATED_AT), 1_700_000_000_000);
    assert_eq!(millis(&edited.data, UPDATED_AT), 1_700_000_005_000);
    assert_eq!(edited.data.get("name"), Some(&FirestoreValue::from_string("Ada")));
    assert_eq!(edited.data.get("role"), Some(&FirestoreValue::from_string("admin")));
}

#[tokio::test]
async fn missing_documents_are_not_found_and_store_is_unchanged() {
    let Fixture { helper, store, .. } = fixture().await;
    helper
        .add_document(doc(&[("name", "Ada".into())]), Some("ada"), false)
        .await
        .unwrap();
    let before = helper.get_document("ada").await.unwrap();

    let err = helper
        .edit_document("ghost", doc(&[("name", "Boo".into())]))
        .await
        .unwrap_err();
    assert_eq!(err.code, HelperErrorCode::NotFound);

    let err = helper.remove_document("ghost").await.unwrap_err();
    assert_eq!(err.code, HelperErrorCode::NotFound);

    let err = helper
        .batch_edit(vec![DocumentUpdate::new("ghost", doc(&[("x", 1_i64.into())]))])
        .await
        .unwrap_err();
    assert_eq!(err.code, HelperErrorCode::NotFound);

    let err = helper.batch_remove(&["ada", "ghost"]).await.unwrap_err();
    assert_eq!(err.code, HelperErrorCode::NotFound);

    assert_eq!(store.len(), 1);
    assert_eq!(helper.get_document("ada").await.unwrap(), before);
}

#[tokio::test]
async fn add_with_taken_id_is_rejected_without_override() {
    let Fixture { helper, store, .. } = fixture().await;
    helper
        .add_document(doc(&[("name", "Ada".into())]), Some("ada"), false)
        .await
        .unwrap();

    let err = helper
        .add_document(doc(&[("name", "Imposter".into())]), Some("ada"), false)
        .await
        .unwrap_err();
    assert_eq!(err.code, HelperErrorCode::AlreadyExists);

    let current = helper.get_document_data("ada").await.unwrap().data.unwrap();
    assert_eq!(current.get("name"), Some(&FirestoreValue::from_string("Ada")));
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn override_merges_and_keeps_created_at() {
    let Fixture { helper, clock, .. } = fixture().await;
    helper
        .add_document(
            doc(&[("name", "Ada".into()), ("lang", "en".into())]),
            Some("ada"),
            false,
        )
        .await
        .unwrap();

    clock.advance(60_000);
    helper
        .add_document(doc(&[("name", "Ada Lovelace".into())]), Some("ada"), true)
        .await
        .unwrap();

    let data = helper.get_document_data("ada").await.unwrap().data.unwrap();
    assert_eq!(millis(&data, CREATED_AT), 1_700_000_000_000);
    assert_eq!(millis(&data, UPDATED_AT), 1_700_000_060_000);
    assert_eq!(data.get("name"), Some(&FirestoreValue::from_string("Ada Lovelace")));
    assert_eq!(data.get("lang"), Some(&FirestoreValue::from_string("en")));
}

#[tokio::test]
async fn batch_edit_is_all_or_nothing() {
    let Fixture { helper, clock, .. } = fixture().await;
    helper
        .add_document(doc(&[("score", 1_i64.into())]), Some("ada"), false)
        .await
        .unwrap();
    let before = helper.get_document("ada").await.unwrap();

    clock.advance(1_000);
    let err = helper
        .batch_edit(vec![
            DocumentUpdate::new("ada", doc(&[("score", 2_i64.into())])),
            DocumentUpdate::new("ghost", doc(&[("score", 3_i64.into())])),
        ])
        .await
        .unwrap_err();
    assert_eq!(err.code, HelperErrorCode::NotFound);
    assert_eq!(helper.get_document("ada").await.unwrap(), before);
}

#[tokio::test]
async fn payloads_with_an_id_field_are_rejected() {
    let Fixture { helper, store, .. } = fixture().await;
    helper
        .add_document(doc(&[("name", "Ada".into())]), Some("ada"), false)
        .await
        .unwrap();
    let before = helper.get_document("ada").await.unwrap();

    let err = helper
        .edit_document("ada", doc(&[("id", "other".into())]))
        .await
        .unwrap_err();
    assert_eq!(err.code, HelperErrorCode::InvalidArgument);

    let err = helper
        .add_document(doc(&[("id", "other".into())]), None, false)
        .await
        .unwrap_err();
    assert_eq!(err.code, HelperErrorCode::InvalidArgument);

    assert_eq!(helper.get_document("ada").await.unwrap(), before);
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn timestamp_validation_rejects_bad_values() {
    let Fixture { helper, .. } = fixture().await;
    helper
        .add_document(doc(&[("name", "Ada".into())]), Some("ada"), false)
        .await
        .unwrap();

    for bad in [
        FirestoreValue::from_integer(-1),
        FirestoreValue::from_double(12.5),
        FirestoreValue::from_string("now"),
        FirestoreValue::from_bool(true),
    ] {
        let err = helper
            .edit_document("ada", doc(&[(UPDATED_AT, bad)]))
            .await
            .unwrap_err();
        assert_eq!(err.code, HelperErrorCode::Validation);
    }
}

#[tokio::test]
async fn add_edit_remove_round_trip() {
    let Fixture { helper, store, .. } = fixture().await;
    let added = helper
        .add_document(doc(&[("name", "Ada".into())]), None, false)
        .await
        .unwrap();
    helper
        .edit_document(&added.id, doc(&[("name", "Grace".into())]))
        .await
        .unwrap();
    helper.remove_document(&added.id).await.unwrap();

    let fetched = helper.get_document_data(&added.id).await.unwrap();
    assert_eq!(fetched.id, added.id);
    assert!(fetched.data.is_none());
    assert!(store.is_empty());
}

#[tokio::test]
async fn batch_add_returns_entries_in_order() {
    let Fixture { helper, store, .. } = fixture().await;
    let added = helper
        .batch_add(vec![
            NewDocument::new(doc(&[("n", 1_i64.into())])).with_id("first"),
            NewDocument::new(doc(&[("n", 2_i64.into())])),
            NewDocument::new(doc(&[("n", 3_i64.into())])).with_id("third"),
        ])
        .await
        .unwrap();

    assert_eq!(added.len(), 3);
    assert_eq!(added[0].id, "first");
    assert_eq!(added[1].id.len(), 30);
    assert_eq!(added[2].id, "third");
    assert_eq!(added[1].data.get("n"), Some(&FirestoreValue::from_integer(2)));
    assert_eq!(store.len(), 3);
}

#[tokio::test]
async fn batch_add_aborts_when_one_entry_collides() {
    let Fixture { helper, store, .. } = fixture().await;
    helper
        .add_document(doc(&[("name", "Ada".into())]), Some("ada"), false)
        .await
        .unwrap();

    let err = helper
        .batch_add(vec![
            NewDocument::new(doc(&[("name", "Grace".into())])).with_id("grace"),
            NewDocument::new(doc(&[("name", "Imposter".into())])).with_id("ada"),
        ])
        .await
        .unwrap_err();
    assert_eq!(err.code, HelperErrorCode::AlreadyExists);
    assert_eq!(store.len(), 1);

    let added = helper
        .batch_add(vec![
            NewDocument::new(doc(&[("name", "Grace".into())])).with_id("grace"),
            NewDocument::new(doc(&[("title", "Countess".into())]))
                .with_id("ada")
                .overriding(),
        ])
        .await
        .unwrap();
    assert_eq!(added.len(), 2);
    let ada = helper.get_document_data("ada").await.unwrap().data.unwrap();
    assert_eq!(ada.get("name"), Some(&FirestoreValue::from_string("Ada")));
    assert_eq!(ada.get("title"), Some(&FirestoreValue::from_string("Countess")));
}

#[tokio::test]
async fn batch_remove_deletes_everything_listed() {
    let Fixture { helper, store, .. } = fixture().await;
    for id in ["a", "b", "c"] {
        helper
            .add_document(doc(&[("name", id.into())]), Some(id), false)
            .await
            .unwrap();
    }
    helper.batch_remove(&["a", "c"]).await.unwrap();
    assert_eq!(store.len(), 1);
    assert!(helper.get_document_data("b").await.unwrap().exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_edits_are_all_applied() {
    let Fixture { helper, .. } = fixture().await;
    helper
        .add_document(doc(&[]), Some("counter"), false)
        .await
        .unwrap();

    let handles: Vec<_> = (0..16)
        .map(|n| {
            let helper = helper.clone();
            tokio::spawn(async move {
                let field = format!("field{n}");
                helper
                    .edit_document(
                        "counter",
                        doc(&[(field.as_str(), FirestoreValue::from_integer(n))]),
                    )
                    .await
            })
        })
        .collect();
    for handle in handles {
        handle.await.expect("edit task").unwrap();
    }

    let data = helper.get_document_data("counter").await.unwrap().data.unwrap();
    for n in 0..16 {
        assert_eq!(
            data.get(&format!("field{n}")),
            Some(&FirestoreValue::from_integer(n))
        );
    }
}
