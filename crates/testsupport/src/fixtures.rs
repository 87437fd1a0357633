//! Common test fixtures: row builders and canonical seeded databases.

use common::Row;
use database::{Engine, QueryRequest};
use types::Value;

/// Build a row with integer values.
pub fn int_row(values: &[i64]) -> Row {
    Row::new(values.iter().map(|&v| Value::Int(v)).collect())
}

/// Build a row with text values.
pub fn text_row(values: &[&str]) -> Row {
    Row::new(values.iter().map(|&v| Value::Text(v.to_string())).collect())
}

/// Build a row with boolean values.
pub fn bool_row(values: &[bool]) -> Row {
    Row::new(values.iter().map(|&v| Value::Bool(v)).collect())
}

/// Build a row with mixed value types.
pub fn mixed_row(values: Vec<Value>) -> Row {
    Row::new(values)
}

/// Build a row of NULLs.
pub fn null_row(count: usize) -> Row {
    Row::new(vec![Value::Null; count])
}

/// Open a fresh `Engine` backed by a temporary file, returning the `TempDir`
/// alongside it so the directory stays alive for the caller's scope.
pub fn open_engine() -> (Engine, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let engine = Engine::open_path(dir.path().join("test.db")).expect("open engine");
    (engine, dir)
}

fn run(engine: &mut Engine, sql: &str) {
    let result = engine.execute(QueryRequest::new(sql));
    assert_eq!(result.error, None, "unexpected error running `{sql}`: {:?}", result.error);
}

/// The canonical `users` fixture: 9 rows with duplicates on age and city so
/// DISTINCT, GROUP BY, and ORDER BY ties all have something to exercise.
pub fn seed_users(engine: &mut Engine) {
    run(engine, "CREATE TABLE users (id INT, name TEXT, age INT, city TEXT, salary INT)");
    let rows = [
        (1, "Alice", 40, "NY", 50000),
        (2, "Bob", 30, "NY", 55000),
        (3, "Carol", 25, "NY", 60000),
        (4, "Dave", 25, "NY", 65000),
        (5, "Eve", 22, "SF", 70000),
        (6, "Frank", 22, "SF", 75000),
        (7, "Grace", 20, "LA", 48000),
        (8, "Heidi", 20, "LA", 52000),
        (9, "Ivan", 18, "LA", 30000),
    ];
    for (id, name, age, city, salary) in rows {
        run(
            engine,
            &format!(
                "INSERT INTO users (id, name, age, city, salary) VALUES ({id}, '{name}', {age}, '{city}', {salary})"
            ),
        );
    }
}

/// The canonical `employee`/`contract` fixture pair for join scenarios: one
/// employee (Eve) lives in BOS, the other two don't, and `contract` has five
/// untargeted rows so a non-equi join has something to cross.
pub fn seed_employee_contract(engine: &mut Engine) {
    run(engine, "CREATE TABLE employee (id INT, name TEXT, city TEXT)");
    run(engine, "CREATE TABLE contract (id INT, title TEXT)");
    for (id, name, city) in [(1, "Eve", "BOS"), (2, "Frank", "NYC"), (3, "Grace", "SEA")] {
        run(engine, &format!("INSERT INTO employee (id, name, city) VALUES ({id}, '{name}', '{city}')"));
    }
    for (id, title) in [(1, "Alpha"), (2, "Beta"), (3, "Gamma"), (4, "Delta"), (5, "Epsilon")] {
        run(engine, &format!("INSERT INTO contract (id, title) VALUES ({id}, '{title}')"));
    }
}
