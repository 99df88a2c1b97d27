pub mod datastore;

pub use datastore::{
    Datastore, DocumentListener, InMemoryDatastore, QueryListener, ReadPrecondition,
    WriteOperation,
};
