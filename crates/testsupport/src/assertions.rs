//! Custom assertion helpers for testing against `QueryResult`.

use common::Row;
use database::QueryResult;
use types::Value;

/// Assert that a request completed without error, and return it for chaining.
pub fn assert_ok(result: QueryResult) -> QueryResult {
    assert!(result.error.is_none(), "expected `{}` to succeed, got error: {:?}", result.sql, result.error);
    result
}

/// Assert that a request failed, and that the error message contains `needle`.
pub fn assert_error_contains(result: &QueryResult, needle: &str) {
    let message = result.error.as_deref().unwrap_or_else(|| panic!("expected `{}` to fail, but it succeeded", result.sql));
    assert!(message.contains(needle), "expected error containing '{needle}', got: {message}");
}

/// Assert that a result's rows, read as the first column of each row, match
/// `expected` exactly (order-sensitive).
pub fn assert_first_column(result: &QueryResult, expected: &[Value]) {
    let actual: Vec<Value> = result.rows.iter().map(|r| r.values[0].clone()).collect();
    assert_eq!(&actual, expected, "first-column mismatch for `{}`", result.sql);
}

/// Assert that two rows are equal.
pub fn assert_rows_equal(actual: &Row, expected: &Row) {
    assert_eq!(actual.values, expected.values, "row mismatch: expected {:?}, got {:?}", expected.values, actual.values);
}
