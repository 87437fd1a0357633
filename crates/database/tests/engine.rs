//! End-to-end tests exercising the `Engine` façade the way a caller would:
//! one SQL statement per call, across transaction boundaries.

use database::{Engine, QueryRequest, TransactionStatus};
use std::collections::HashSet;
use testsupport::fixtures::{open_engine, seed_employee_contract, seed_users};
use types::Value;

fn run(engine: &mut Engine, sql: &str) -> database::QueryResult {
    let result = engine.execute(QueryRequest::new(sql));
    assert_eq!(result.error, None, "unexpected error running `{sql}`: {:?}", result.error);
    result
}

#[test]
fn distinct_age_ordered_descending_limited_to_three() {
    let (mut engine, _dir) = open_engine();
    seed_users(&mut engine);

    let result = run(&mut engine, "SELECT DISTINCT age FROM users ORDER BY age DESC LIMIT 3");
    let ages: Vec<Value> = result.rows.into_iter().map(|r| r.values[0].clone()).collect();
    assert_eq!(ages, vec![Value::Int(40), Value::Int(30), Value::Int(25)]);
}

#[test]
fn grouped_aggregate_with_a_filter_ranks_ny_first() {
    let (mut engine, _dir) = open_engine();
    seed_users(&mut engine);

    let result = run(
        &mut engine,
        "SELECT city, COUNT(*) FROM users WHERE salary > 40000 GROUP BY city ORDER BY COUNT(*) DESC",
    );
    assert_eq!(result.rows[0].values, vec![Value::Text("NY".into()), Value::Int(4)]);

    let groups: HashSet<(String, i64)> = result
        .rows
        .into_iter()
        .map(|r| match (&r.values[0], &r.values[1]) {
            (Value::Text(city), Value::Int(count)) => (city.clone(), *count),
            other => panic!("unexpected row shape: {other:?}"),
        })
        .collect();
    assert_eq!(
        groups,
        HashSet::from([("NY".to_string(), 4), ("SF".to_string(), 2), ("LA".to_string(), 2)])
    );
}

#[test]
fn non_equi_join_cross_product_filtered_to_one_employee() {
    let (mut engine, _dir) = open_engine();
    seed_employee_contract(&mut engine);

    let result = run(
        &mut engine,
        "SELECT e.name, c.id FROM employee AS e JOIN contract AS c ON 1=1 WHERE e.city='BOS'",
    );
    let pairs: HashSet<(String, i64)> = result
        .rows
        .into_iter()
        .map(|r| match (&r.values[0], &r.values[1]) {
            (Value::Text(name), Value::Int(id)) => (name.clone(), *id),
            other => panic!("unexpected row shape: {other:?}"),
        })
        .collect();
    assert_eq!(
        pairs,
        HashSet::from([
            ("Eve".to_string(), 1),
            ("Eve".to_string(), 2),
            ("Eve".to_string(), 3),
            ("Eve".to_string(), 4),
            ("Eve".to_string(), 5),
        ])
    );
}

#[test]
fn uncommitted_insert_is_invisible_outside_its_transaction() {
    let (mut engine, _dir) = open_engine();
    run(&mut engine, "CREATE TABLE t (val INT)");
    run(&mut engine, "INSERT INTO t (val) VALUES (1)");

    let begin = engine.execute(QueryRequest::new("BEGIN"));
    let txn_id = begin.transaction_id;
    let insert = engine.execute(QueryRequest::within_transaction("INSERT INTO t (val) VALUES (2)", txn_id));
    assert_eq!(insert.error, None);

    let outside = run(&mut engine, "SELECT val FROM t");
    let seen: Vec<Value> = outside.rows.into_iter().map(|r| r.values[0].clone()).collect();
    assert_eq!(seen, vec![Value::Int(1)]);

    let commit = engine.execute(QueryRequest::within_transaction("COMMIT", txn_id));
    assert_eq!(commit.error, None);
    assert_eq!(commit.transaction_status, TransactionStatus::Closed);

    let after = run(&mut engine, "SELECT val FROM t");
    let seen: HashSet<Value> = after.rows.into_iter().map(|r| r.values[0].clone()).collect();
    assert_eq!(seen, HashSet::from([Value::Int(1), Value::Int(2)]));
}
