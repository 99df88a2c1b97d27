use std::collections::BTreeMap;

use crate::firestore::api::FilterOperator;
use crate::firestore::value::{FirestoreValue, ValueType};
use crate::helper::error::{invalid_argument, HelperResult};
use crate::helper::timestamps::{CREATED_AT, UPDATED_AT};

/// Declared field types for a collection, used to reject filters that can never match.
///
/// The stamped timestamp fields are always declared as numbers.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CollectionSchema {
    fields: BTreeMap<String, ValueType>,
}

impl CollectionSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, field: impl Into<String>, value_type: ValueType) -> Self {
        self.fields.insert(field.into(), value_type);
        self
    }

    pub fn field_type(&self, field: &str) -> Option<ValueType> {
        if field == CREATED_AT || field == UPDATED_AT {
            return Some(ValueType::Number);
        }
        self.fields.get(field).copied()
    }

    /// Checks that `field` is declared and that `value` fits its type for `operator`.
    pub fn check_filter(
        &self,
        field: &str,
        operator: FilterOperator,
        value: &FirestoreValue,
    ) -> HelperResult<()> {
        let Some(declared) = self.field_type(field) else {
            return Err(invalid_argument(format!(
                "Field '{field}' is not declared in the collection schema"
            )));
        };

        match operator {
            FilterOperator::ArrayContains | FilterOperator::ArrayContainsAny => {
                if declared != ValueType::Array {
                    return Err(invalid_argument(format!(
                        "'{operator}' requires an array field, but '{field}' is {declared}"
                    )));
                }
                Ok(())
            }
            FilterOperator::In | FilterOperator::NotIn => {
                let elements = value.as_array().map(|array| array.values()).unwrap_or_default();
                for element in elements {
                    expect_type(field, declared, element)?;
                }
                Ok(())
            }
            FilterOperator::Equal | FilterOperator::NotEqual if value.is_null() => Ok(()),
            _ => expect_type(field, declared, value),
        }
    }
}

fn expect_type(field: &str, declared: ValueType, value: &FirestoreValue) -> HelperResult<()> {
    let actual = value.value_type();
    if actual != declared {
        return Err(invalid_argument(format!(
            "Field '{field}' is declared as {declared}, but the filter value is {actual}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helper::error::HelperErrorCode;

    fn schema() -> CollectionSchema {
        CollectionSchema::new()
            .with_field("name", ValueType::String)
            .with_field("age", ValueType::Number)
            .with_field("tags", ValueType::Array)
    }

    #[test]
    fn timestamps_are_implicit_numbers() {
        assert_eq!(schema().field_type(CREATED_AT), Some(ValueType::Number));
        assert_eq!(schema().field_type("unknown"), None);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = schema()
            .check_filter("nickname", FilterOperator::Equal, &"x".into())
            .unwrap_err();
        assert_eq!(err.code, HelperErrorCode::InvalidArgument);
    }

    #[test]
    fn values_must_match_declared_type() {
        let schema = schema();
        assert!(schema
            .check_filter("age", FilterOperator::GreaterThan, &FirestoreValue::from_double(2.5))
            .is_ok());
        assert!(schema
            .check_filter("age", FilterOperator::GreaterThan, &"old".into())
            .is_err());
        assert!(schema
            .check_filter("name", FilterOperator::Equal, &FirestoreValue::null())
            .is_ok());
    }

    #[test]
    fn array_operators_need_array_fields() {
        let schema = schema();
        assert!(schema
            .check_filter("tags", FilterOperator::ArrayContains, &"rust".into())
            .is_ok());
        assert!(schema
            .check_filter("name", FilterOperator::ArrayContains, &"rust".into())
            .is_err());
    }

    #[test]
    fn list_elements_are_checked() {
        let schema = schema();
        let names = FirestoreValue::from_array(vec!["ada".into(), "grace".into()]);
        assert!(schema.check_filter("name", FilterOperator::In, &names).is_ok());
        let mixed = FirestoreValue::from_array(vec!["ada".into(), FirestoreValue::from_integer(1)]);
        assert!(schema.check_filter("name", FilterOperator::NotIn, &mixed).is_err());
    }
}
