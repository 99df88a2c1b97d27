pub mod api;
pub mod error;
pub mod model;
pub(crate) mod query_evaluator;
pub mod remote;
pub mod value;

pub use api::{
    run_transaction, DocumentSnapshot, FieldFilter, FilterOperator, OrderBy, OrderDirection,
    QueryDefinition, QuerySnapshot, Transaction, TransactionOptions,
};
pub use error::{FirestoreError, FirestoreErrorCode, FirestoreResult};
pub use model::{DocumentKey, ResourcePath, Timestamp};
pub use remote::{Datastore, InMemoryDatastore};
pub use value::{FirestoreValue, MapValue, ValueKind, ValueType};
