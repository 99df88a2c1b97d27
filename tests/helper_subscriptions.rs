use std::sync::{Arc, Mutex};

use firestore_helper::firestore::api::FilterOperator;
use firestore_helper::firestore::remote::InMemoryDatastore;
use firestore_helper::firestore::value::FirestoreValue;
use firestore_helper::helper::{
    DocumentMap, FirestoreHelper, HelperErrorCode, HelperResult, HelperSettings, QueryFilter,
};

async fn connect(store: &InMemoryDatastore) -> FirestoreHelper {
    FirestoreHelper::connect(Arc::new(store.clone()), "rooms", HelperSettings::default())
        .await
        .expect("connect helper")
}

fn named(name: &str) -> DocumentMap {
    DocumentMap::from([("name".to_string(), FirestoreValue::from_string(name))])
}

#[tokio::test]
async fn document_subscription_sees_initial_change_and_delete() {
    let store = InMemoryDatastore::new();
    let helper = connect(&store).await;
    helper
        .add_document(named("Lobby"), Some("lobby"), false)
        .await
        .unwrap();

    let events: Arc<Mutex<Vec<HelperResult<String>>>> = Arc::new(Mutex::new(Vec::new()));
    let captured = events.clone();
    let subscription = helper
        .subscribe_document("lobby", move |result| {
            let name = result.map(|doc| {
                doc.data
                    .get("name")
                    .and_then(FirestoreValue::as_str)
                    .unwrap_or_default()
                    .to_string()
            });
            captured.lock().unwrap().push(name);
        })
        .await
        .expect("subscribe to document");

    helper
        .edit_document("lobby", named("Main hall"))
        .await
        .unwrap();
    helper.remove_document("lobby").await.unwrap();

    {
        let events = events.lock().unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].as_ref().unwrap(), "Lobby");
        assert_eq!(events[1].as_ref().unwrap(), "Main hall");
        assert_eq!(
            events[2].as_ref().unwrap_err().code,
            HelperErrorCode::NotFound
        );
    }

    subscription.unsubscribe();
    helper
        .add_document(named("Lobby again"), Some("lobby"), false)
        .await
        .unwrap();
    assert_eq!(events.lock().unwrap().len(), 3);
    assert_eq!(store.listener_count(), 0);
}

#[tokio::test]
async fn query_subscription_tracks_matching_documents() {
    let store = InMemoryDatastore::new();
    let helper = connect(&store).await;

    let sizes: Arc<Mutex<Vec<usize>>> = Arc::new(Mutex::new(Vec::new()));
    let captured = sizes.clone();
    let _subscription = helper
        .subscribe_query(
            &[QueryFilter::new("open", FilterOperator::Equal, true.into())],
            move |result| {
                captured.lock().unwrap().push(result.unwrap().len());
            },
        )
        .await
        .unwrap();

    let mut open = named("Lobby");
    open.insert("open".to_string(), true.into());
    helper.add_document(open, Some("lobby"), false).await.unwrap();

    let mut closed = named("Vault");
    closed.insert("open".to_string(), false.into());
    helper.add_document(closed, Some("vault"), false).await.unwrap();

    helper.remove_document("lobby").await.unwrap();

    assert_eq!(*sizes.lock().unwrap(), vec![0, 1, 1, 0]);
}

#[tokio::test]
async fn collection_watch_delivers_every_change() {
    let store = InMemoryDatastore::new();
    let helper = connect(&store).await;
    let mut watch = helper.watch_query(&[]).await.unwrap();

    assert!(watch.next().await.unwrap().unwrap().is_empty());
    helper
        .add_document(named("Lobby"), Some("lobby"), false)
        .await
        .unwrap();
    helper
        .add_document(named("Vault"), Some("vault"), false)
        .await
        .unwrap();

    let after_first = watch.next().await.unwrap().unwrap();
    let after_second = watch.next().await.unwrap().unwrap();
    assert_eq!(after_first.len(), 1);
    assert_eq!(after_second.len(), 2);
    assert!(watch.try_next().is_none());

    watch.unsubscribe();
    assert_eq!(store.listener_count(), 0);
}

#[tokio::test]
async fn query_subscription_without_index_fails_to_register() {
    let store = InMemoryDatastore::new().require_composite_indexes(true);
    let helper = connect(&store).await;
    let filters = [
        QueryFilter::new("open", FilterOperator::Equal, true.into()),
        QueryFilter::new("capacity", FilterOperator::GreaterThan, 10_i64.into()),
    ];

    let err = helper
        .subscribe_query(&filters, |_| {})
        .await
        .unwrap_err();
    assert_eq!(err.code, HelperErrorCode::IndexRequired);
    assert_eq!(store.listener_count(), 0);

    store.declare_index("rooms", ["open", "capacity"]);
    let subscription = helper.subscribe_query(&filters, |_| {}).await.unwrap();
    assert!(subscription.is_active());
}

#[tokio::test]
async fn subscriptions_on_a_terminated_store_fail() {
    let store = InMemoryDatastore::new();
    let helper = connect(&store).await;
    helper.clone().shutdown().await.unwrap();

    let err = helper.subscribe_collection(|_| {}).await.unwrap_err();
    assert_eq!(err.code, HelperErrorCode::Unknown);

    let err = helper.check_connection().await.unwrap_err();
    assert_eq!(err.code, HelperErrorCode::Connection);
}

#[tokio::test]
async fn query_listener_errors_after_registration_are_delivered() {
    let store = InMemoryDatastore::new();
    let helper = connect(&store).await;
    let filters = [
        QueryFilter::new("open", FilterOperator::Equal, true.into()),
        QueryFilter::new("capacity", FilterOperator::GreaterThan, 10_i64.into()),
    ];
    let mut watch = helper.watch_query(&filters).await.unwrap();
    assert!(watch.next().await.unwrap().unwrap().is_empty());

    let store = store.require_composite_indexes(true);
    let mut hall = named("Hall");
    hall.insert("open".to_string(), true.into());
    hall.insert("capacity".to_string(), 40_i64.into());
    helper.add_document(hall, Some("hall"), false).await.unwrap();

    let err = watch.next().await.unwrap().unwrap_err();
    assert_eq!(err.code, HelperErrorCode::IndexRequired);
    assert_eq!(store.listener_count(), 1);

    store.declare_index("rooms", ["open", "capacity"]);
    helper
        .edit_document("hall", named("Great hall"))
        .await
        .unwrap();
    let rooms = watch.next().await.unwrap().unwrap();
    assert_eq!(rooms.len(), 1);
    assert_eq!(rooms[0].id, "hall");

    watch.unsubscribe();
    assert_eq!(store.listener_count(), 0);
}
