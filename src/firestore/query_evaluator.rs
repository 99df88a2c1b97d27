use std::cmp::Ordering;

use crate::firestore::api::{
    DocumentSnapshot, FieldFilter, FilterOperator, OrderBy, OrderDirection, QueryDefinition,
};
use crate::firestore::value::{FirestoreValue, ValueKind};

/// Applies `definition` to a set of candidate documents and returns the filtered, ordered,
/// cursor-bounded and limited result set.
pub(crate) fn apply_query_to_documents(
    documents: Vec<DocumentSnapshot>,
    definition: &QueryDefinition,
) -> Vec<DocumentSnapshot> {
    let mut filtered: Vec<DocumentSnapshot> = documents
        .into_iter()
        .filter(|snapshot| snapshot.exists())
        .filter(|snapshot| definition.matches_collection(snapshot.key()))
        .filter(|snapshot| document_satisfies_filters(snapshot, definition.filters()))
        .filter(|snapshot| has_order_by_fields(snapshot, definition.order_by()))
        .collect();

    filtered.sort_by(|left, right| compare_snapshots(left, right, definition.order_by()));

    if let Some(cursor) = definition.start_after() {
        filtered.retain(|snapshot| {
            compare_snapshots(snapshot, cursor, definition.order_by()) == Ordering::Greater
        });
    }

    if let Some(limit) = definition.limit() {
        filtered.truncate(limit as usize);
    }

    filtered
}

fn document_satisfies_filters(snapshot: &DocumentSnapshot, filters: &[FieldFilter]) -> bool {
    filters.iter().all(|filter| match snapshot.get(filter.field()) {
        Some(value) => evaluate_filter(filter, value),
        None => false,
    })
}

fn has_order_by_fields(snapshot: &DocumentSnapshot, order_by: &[OrderBy]) -> bool {
    order_by
        .iter()
        .all(|order| snapshot.get(order.field()).is_some())
}

fn evaluate_filter(filter: &FieldFilter, value: &FirestoreValue) -> bool {
    let operand = filter.value();
    match filter.operator() {
        FilterOperator::Equal => values_equal(value, operand),
        FilterOperator::NotEqual => !value.is_null() && !values_equal(value, operand),
        FilterOperator::LessThan => compare_values(value, operand) == Some(Ordering::Less),
        FilterOperator::LessThanOrEqual => matches!(
            compare_values(value, operand),
            Some(Ordering::Less | Ordering::Equal)
        ),
        FilterOperator::GreaterThan => compare_values(value, operand) == Some(Ordering::Greater),
        FilterOperator::GreaterThanOrEqual => matches!(
            compare_values(value, operand),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        FilterOperator::ArrayContains => match value.as_array() {
            Some(array) => array
                .values()
                .iter()
                .any(|candidate| values_equal(candidate, operand)),
            None => false,
        },
        FilterOperator::ArrayContainsAny => match (value.as_array(), operand.as_array()) {
            (Some(array), Some(needles)) => needles.values().iter().any(|needle| {
                array
                    .values()
                    .iter()
                    .any(|candidate| values_equal(candidate, needle))
            }),
            _ => false,
        },
        FilterOperator::In => match operand.as_array() {
            Some(candidates) => candidates
                .values()
                .iter()
                .any(|candidate| values_equal(value, candidate)),
            None => false,
        },
        FilterOperator::NotIn => match operand.as_array() {
            Some(candidates) => {
                !value.is_null()
                    && candidates
                        .values()
                        .iter()
                        .all(|candidate| !values_equal(value, candidate))
            }
            None => false,
        },
    }
}

fn values_equal(left: &FirestoreValue, right: &FirestoreValue) -> bool {
    match (left.kind(), right.kind()) {
        (ValueKind::Integer(_) | ValueKind::Double(_), ValueKind::Integer(_) | ValueKind::Double(_)) => {
            compare_values(left, right) == Some(Ordering::Equal)
        }
        _ => left == right,
    }
}

fn compare_snapshots(left: &DocumentSnapshot, right: &DocumentSnapshot, order_by: &[OrderBy]) -> Ordering {
    for order in order_by {
        let null = FirestoreValue::null();
        let left_value = left.get(order.field()).unwrap_or(&null);
        let right_value = right.get(order.field()).unwrap_or(&null);

        let mut ordering = compare_values(left_value, right_value).unwrap_or_else(|| {
            type_order(left_value).cmp(&type_order(right_value))
        });
        if order.direction() == OrderDirection::Descending {
            ordering = ordering.reverse();
        }
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    left.key().cmp(right.key())
}

/// Compares two values of the same type; `None` when the types are not comparable.
pub(crate) fn compare_values(left: &FirestoreValue, right: &FirestoreValue) -> Option<Ordering> {
    match (left.kind(), right.kind()) {
        (ValueKind::Null, ValueKind::Null) => Some(Ordering::Equal),
        (ValueKind::Boolean(a), ValueKind::Boolean(b)) => Some(a.cmp(b)),
        (ValueKind::Integer(a), ValueKind::Integer(b)) => Some(a.cmp(b)),
        (ValueKind::Double(a), ValueKind::Double(b)) => a.partial_cmp(b),
        (ValueKind::Integer(a), ValueKind::Double(b)) => (*a as f64).partial_cmp(b),
        (ValueKind::Double(a), ValueKind::Integer(b)) => a.partial_cmp(&(*b as f64)),
        (ValueKind::Timestamp(a), ValueKind::Timestamp(b)) => Some(a.cmp(b)),
        (ValueKind::String(a), ValueKind::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

// Cross-type ordering used when sorting mixed fields.
fn type_order(value: &FirestoreValue) -> u8 {
    match value.kind() {
        ValueKind::Null => 0,
        ValueKind::Boolean(_) => 1,
        ValueKind::Integer(_) | ValueKind::Double(_) => 2,
        ValueKind::Timestamp(_) => 3,
        ValueKind::String(_) => 4,
        ValueKind::Array(_) => 5,
        ValueKind::Map(_) => 6,
    }
}
