//! Property-based test generators using proptest.
//!
//! Provides strategies for generating random core-type test data.

use common::Row;
use proptest::prelude::*;
use types::{SqlType, Value};

/// Strategy for generating random `Value` instances.
///
/// Generates a mix of Int, Text, Bool, and Null values.
pub fn arb_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i64>().prop_map(Value::Int),
        "[a-z]{1,20}".prop_map(Value::Text),
        any::<bool>().prop_map(Value::Bool),
        Just(Value::Null),
    ]
}

/// Strategy for generating random `Row` instances with 1-10 columns.
pub fn arb_row() -> impl Strategy<Value = Row> {
    prop::collection::vec(arb_value(), 1..10).prop_map(Row::new)
}

/// Strategy for generating random `Row` instances with a fixed column count.
pub fn arb_row_with_len(len: usize) -> impl Strategy<Value = Row> {
    prop::collection::vec(arb_value(), len).prop_map(Row::new)
}

/// Strategy for generating random `SqlType` instances.
pub fn arb_sql_type() -> impl Strategy<Value = SqlType> {
    prop_oneof![Just(SqlType::Int), Just(SqlType::Text), Just(SqlType::Date), Just(SqlType::Datetime)]
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn prop_arb_row_non_empty(row in arb_row()) {
            assert!(!row.values.is_empty());
            assert!(row.values.len() <= 10);
        }

        #[test]
        fn prop_arb_row_with_len_matches(row in arb_row_with_len(5)) {
            assert_eq!(row.values.len(), 5);
        }

        #[test]
        fn prop_value_equality_is_reflexive(value in arb_value()) {
            assert_eq!(value, value);
        }

        #[test]
        fn prop_row_roundtrip_clone(row in arb_row()) {
            let cloned = row.clone();
            assert_eq!(row.values, cloned.values);
        }
    }
}
