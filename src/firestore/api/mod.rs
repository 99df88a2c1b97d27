pub(crate) mod query;
mod snapshot;
pub mod transaction;

pub use query::{FieldFilter, FilterOperator, OrderBy, OrderDirection, QueryDefinition};
pub use snapshot::{DocumentSnapshot, QuerySnapshot};
pub use transaction::{run_transaction, Transaction, TransactionOptions};
