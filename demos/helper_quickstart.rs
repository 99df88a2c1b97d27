use std::error::Error;
use std::sync::Arc;

use firestore_helper::firestore::api::{FilterOperator, OrderDirection};
use firestore_helper::firestore::remote::InMemoryDatastore;
use firestore_helper::firestore::value::{document_from_json, FirestoreValue};
use firestore_helper::helper::{FindOptions, FirestoreHelper, HelperSettings, QueryFilter};
use serde_json::json;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error>> {
    let datastore = Arc::new(InMemoryDatastore::new());
    let helper = FirestoreHelper::connect(datastore, "cities", HelperSettings::default()).await?;

    let cities = [
        json!({ "name": "San Francisco", "state": "CA", "population": 860_000 }),
        json!({ "name": "Los Angeles", "state": "CA", "population": 3_900_000 }),
        json!({ "name": "Tokyo", "country": "Japan", "population": 9_000_000 }),
    ];
    for city in cities {
        helper.add_document(document_from_json(city)?, None, false).await?;
    }

    let mut watch = helper
        .watch_query(&[QueryFilter::new("state", FilterOperator::Equal, "CA".into())])
        .await?;
    if let Some(Ok(initial)) = watch.next().await {
        println!("{} Californian cities at start", initial.len());
    }

    let largest = helper
        .find(
            &[QueryFilter::new(
                "population",
                FilterOperator::GreaterThan,
                FirestoreValue::from_integer(1_000_000),
            )],
            &FindOptions::default()
                .order_by("population", OrderDirection::Descending)
                .limit(10),
        )
        .await?;

    println!("Cities above one million people:");
    for city in &largest {
        let name = city
            .data
            .get("name")
            .and_then(FirestoreValue::as_str)
            .unwrap_or("Unknown");
        println!("- {name} ({})", city.id);
    }

    if let Some(first) = largest.first() {
        helper.remove_document(&first.id).await?;
    }
    watch.unsubscribe();
    helper.shutdown().await?;
    Ok(())
}
