use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use crate::firestore::error::{invalid_argument, FirestoreError};
use crate::firestore::model::{DocumentKey, ResourcePath};
use crate::firestore::value::FirestoreValue;

use super::snapshot::DocumentSnapshot;

/// Comparison operators understood by the store's query engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FilterOperator {
    LessThan,
    LessThanOrEqual,
    Equal,
    NotEqual,
    GreaterThanOrEqual,
    GreaterThan,
    ArrayContains,
    ArrayContainsAny,
    In,
    NotIn,
}

impl FilterOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOperator::LessThan => "<",
            FilterOperator::LessThanOrEqual => "<=",
            FilterOperator::Equal => "==",
            FilterOperator::NotEqual => "!=",
            FilterOperator::GreaterThanOrEqual => ">=",
            FilterOperator::GreaterThan => ">",
            FilterOperator::ArrayContains => "array-contains",
            FilterOperator::ArrayContainsAny => "array-contains-any",
            FilterOperator::In => "in",
            FilterOperator::NotIn => "not-in",
        }
    }

    /// Range and negative operators; a query combining these with other fields needs a
    /// composite index.
    pub fn is_inequality(&self) -> bool {
        matches!(
            self,
            FilterOperator::LessThan
                | FilterOperator::LessThanOrEqual
                | FilterOperator::GreaterThan
                | FilterOperator::GreaterThanOrEqual
                | FilterOperator::NotEqual
                | FilterOperator::NotIn
        )
    }

    pub fn is_ordering(&self) -> bool {
        matches!(
            self,
            FilterOperator::LessThan
                | FilterOperator::LessThanOrEqual
                | FilterOperator::GreaterThan
                | FilterOperator::GreaterThanOrEqual
        )
    }

    /// Operators whose operand is a list of candidate values.
    pub fn takes_list(&self) -> bool {
        matches!(
            self,
            FilterOperator::In | FilterOperator::NotIn | FilterOperator::ArrayContainsAny
        )
    }
}

impl Display for FilterOperator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterOperator {
    type Err = FirestoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "<" => Ok(FilterOperator::LessThan),
            "<=" => Ok(FilterOperator::LessThanOrEqual),
            "==" => Ok(FilterOperator::Equal),
            "!=" => Ok(FilterOperator::NotEqual),
            ">=" => Ok(FilterOperator::GreaterThanOrEqual),
            ">" => Ok(FilterOperator::GreaterThan),
            "array-contains" => Ok(FilterOperator::ArrayContains),
            "array-contains-any" => Ok(FilterOperator::ArrayContainsAny),
            "in" => Ok(FilterOperator::In),
            "not-in" => Ok(FilterOperator::NotIn),
            other => Err(invalid_argument(format!("Unsupported filter operator '{other}'"))),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldFilter {
    field: String,
    operator: FilterOperator,
    value: FirestoreValue,
}

impl FieldFilter {
    pub fn new(field: impl Into<String>, operator: FilterOperator, value: FirestoreValue) -> Self {
        Self {
            field: field.into(),
            operator,
            value,
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn operator(&self) -> FilterOperator {
        self.operator
    }

    pub fn value(&self) -> &FirestoreValue {
        &self.value
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OrderDirection {
    #[default]
    Ascending,
    Descending,
}

#[derive(Clone, Debug, PartialEq)]
pub struct OrderBy {
    field: String,
    direction: OrderDirection,
}

impl OrderBy {
    pub fn new(field: impl Into<String>, direction: OrderDirection) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn direction(&self) -> OrderDirection {
        self.direction
    }
}

/// A conjunctive query over a single collection.
///
/// Filters are kept in the order they were added; results are ordered by the
/// `order_by` clauses and then by document id.
#[derive(Clone, Debug, PartialEq)]
pub struct QueryDefinition {
    collection_path: ResourcePath,
    filters: Vec<FieldFilter>,
    order_by: Vec<OrderBy>,
    limit: Option<u32>,
    start_after: Option<DocumentSnapshot>,
}

impl QueryDefinition {
    pub fn new(collection_path: ResourcePath) -> Self {
        Self {
            collection_path,
            filters: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            start_after: None,
        }
    }

    pub fn with_filter(mut self, filter: FieldFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn with_order_by(mut self, order_by: OrderBy) -> Self {
        self.order_by.push(order_by);
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Starts the result set strictly after `cursor`.
    pub fn with_start_after(mut self, cursor: DocumentSnapshot) -> Self {
        self.start_after = Some(cursor);
        self
    }

    pub fn collection_path(&self) -> &ResourcePath {
        &self.collection_path
    }

    pub fn filters(&self) -> &[FieldFilter] {
        &self.filters
    }

    pub fn order_by(&self) -> &[OrderBy] {
        &self.order_by
    }

    pub fn limit(&self) -> Option<u32> {
        self.limit
    }

    pub fn start_after(&self) -> Option<&DocumentSnapshot> {
        self.start_after.as_ref()
    }

    pub fn matches_collection(&self, key: &DocumentKey) -> bool {
        key.collection_path() == self.collection_path
    }

    /// Returns the field set a composite index must cover to serve this query, or `None` when
    /// single-field indexes are enough.
    ///
    /// Equality-only queries are served by merging single-field indexes; a composite index is
    /// needed once an inequality or an ordering is combined with any other field.
    pub fn composite_index_fields(&self) -> Option<BTreeSet<String>> {
        let mut fields = BTreeSet::new();
        let mut ranged = false;
        for filter in &self.filters {
            fields.insert(filter.field().to_string());
            ranged |= filter.operator().is_inequality();
        }
        for order in &self.order_by {
            fields.insert(order.field().to_string());
            ranged = true;
        }
        if ranged && fields.len() > 1 {
            Some(fields)
        } else {
            None
        }
    }
}
