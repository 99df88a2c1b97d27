use std::str::FromStr;

use crate::firestore::api::{
    FieldFilter, FilterOperator, OrderBy, OrderDirection, QueryDefinition, QuerySnapshot,
};
use crate::firestore::value::{FirestoreValue, ValueType};
use crate::helper::client::{document_data, FirestoreHelper};
use crate::helper::error::{invalid_argument, not_found, query_error, HelperResult};
use crate::helper::schema::CollectionSchema;
use crate::helper::DocumentData;

/// Upper bound on the values an `in`, `not-in` or `array-contains-any` filter may list.
pub const MAX_DISJUNCTION_VALUES: usize = 30;

/// A single `(field, operator, value)` condition; a filter list is their conjunction.
#[derive(Clone, Debug, PartialEq)]
pub struct QueryFilter {
    pub field: String,
    pub operator: FilterOperator,
    pub value: FirestoreValue,
}

impl QueryFilter {
    pub fn new(field: impl Into<String>, operator: FilterOperator, value: FirestoreValue) -> Self {
        Self {
            field: field.into(),
            operator,
            value,
        }
    }

    /// Builds a filter from the operator's string form, e.g. `"array-contains"`.
    pub fn parse(field: impl Into<String>, operator: &str, value: FirestoreValue) -> HelperResult<Self> {
        let operator = FilterOperator::from_str(operator).map_err(|err| invalid_argument(err.message()))?;
        Ok(Self::new(field, operator, value))
    }

    /// Rejects filters the store could never evaluate.
    pub fn validate(&self, schema: Option<&CollectionSchema>) -> HelperResult<()> {
        if self.field.is_empty() {
            return Err(invalid_argument("Filter field must not be empty"));
        }

        if self.operator.takes_list() {
            let Some(values) = self.value.as_array() else {
                return Err(invalid_argument(format!(
                    "'{}' filter on '{}' requires an array value",
                    self.operator, self.field
                )));
            };
            if values.is_empty() || values.len() > MAX_DISJUNCTION_VALUES {
                return Err(invalid_argument(format!(
                    "'{}' filter on '{}' requires between 1 and {MAX_DISJUNCTION_VALUES} values",
                    self.operator, self.field
                )));
            }
        }

        if self.operator.is_ordering() {
            match self.value.value_type() {
                ValueType::Null | ValueType::Array | ValueType::Map => {
                    return Err(invalid_argument(format!(
                        "'{}' filter on '{}' cannot compare against a {} value",
                        self.operator,
                        self.field,
                        self.value.value_type()
                    )));
                }
                _ => {}
            }
        }

        if let Some(schema) = schema {
            schema.check_filter(&self.field, self.operator, &self.value)?;
        }
        Ok(())
    }

    fn to_field_filter(&self) -> FieldFilter {
        FieldFilter::new(self.field.clone(), self.operator, self.value.clone())
    }
}

/// Ordering and pagination applied on top of a filter list.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FindOptions {
    pub order_by: Option<String>,
    pub order_direction: OrderDirection,
    /// Defaults to `HelperSettings::default_query_limit`.
    pub limit: Option<u32>,
    /// Results start strictly after this document.
    pub start_after_id: Option<String>,
}

impl FindOptions {
    pub fn order_by(mut self, field: impl Into<String>, direction: OrderDirection) -> Self {
        self.order_by = Some(field.into());
        self.order_direction = direction;
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn start_after(mut self, id: impl Into<String>) -> Self {
        self.start_after_id = Some(id.into());
        self
    }
}

impl FirestoreHelper {
    /// Folds `filters`, in order, into one conjunctive query over the bound collection.
    pub fn build_query(&self, filters: &[QueryFilter]) -> HelperResult<QueryDefinition> {
        let collection = self.collection_path()?;
        let schema = self.schema();
        filters
            .iter()
            .try_fold(QueryDefinition::new(collection.clone()), |query, filter| {
                filter.validate(schema)?;
                Ok(query.with_filter(filter.to_field_filter()))
            })
    }

    /// Runs `query` with ordering, limit and cursor from `options`.
    pub async fn get_documents(
        &self,
        query: QueryDefinition,
        options: &FindOptions,
    ) -> HelperResult<QuerySnapshot> {
        let query = self.apply_options(query, options).await?;
        self.datastore().run_query(&query).await.map_err(query_error)
    }

    pub async fn get_documents_data(
        &self,
        query: QueryDefinition,
        options: &FindOptions,
    ) -> HelperResult<Vec<DocumentData>> {
        let snapshot = self.get_documents(query, options).await?;
        Ok(snapshot.into_iter().filter_map(document_data).collect())
    }

    /// Filters, then orders, limits and paginates the bound collection.
    pub async fn find(
        &self,
        filters: &[QueryFilter],
        options: &FindOptions,
    ) -> HelperResult<Vec<DocumentData>> {
        let query = self.build_query(filters)?;
        self.get_documents_data(query, options).await
    }

    async fn apply_options(
        &self,
        mut query: QueryDefinition,
        options: &FindOptions,
    ) -> HelperResult<QueryDefinition> {
        if let Some(field) = &options.order_by {
            if let Some(schema) = self.schema() {
                if schema.field_type(field).is_none() {
                    return Err(invalid_argument(format!(
                        "Cannot order by '{field}': it is not declared in the collection schema"
                    )));
                }
            }
            query = query.with_order_by(OrderBy::new(field.clone(), options.order_direction));
        }

        let limit = options.limit.unwrap_or(self.settings().default_query_limit);
        if limit == 0 {
            return Err(invalid_argument("Query limit must be greater than zero"));
        }
        query = query.with_limit(limit);

        if let Some(id) = &options.start_after_id {
            let cursor = self.get_document(id).await?;
            if !cursor.exists() {
                return Err(not_found(format!(
                    "Cursor document with ID '{id}' not found"
                )));
            }
            query = query.with_start_after(cursor);
        }
        Ok(query)
    }
}
