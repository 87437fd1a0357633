//! SQL script execution for snapshot testing.
//!
//! Runs a multi-statement SQL script through an [`Engine`] and renders each
//! statement's outcome the way the REPL does, suitable for `insta::assert_snapshot!`.

use common::pretty::{render_record_batch, TableStyleKind};
use common::RecordBatch;
use database::{Engine, QueryRequest};

/// Execute every `;`-separated statement in `sql` against a fresh, isolated
/// engine and return the concatenated, pretty-printed output.
pub fn run_sql_script(sql: &str) -> String {
    let (mut engine, _dir) = crate::fixtures::open_engine();
    run_sql_script_with_engine(&mut engine, sql)
}

/// Execute every `;`-separated statement in `sql` against an existing engine,
/// so callers can snapshot a script that builds on already-seeded state.
pub fn run_sql_script_with_engine(engine: &mut Engine, sql: &str) -> String {
    let mut output = String::new();
    for statement in sql.split(';') {
        let statement = statement.trim();
        if statement.is_empty() {
            continue;
        }
        if !output.is_empty() {
            output.push('\n');
        }
        output.push_str(&render_one(engine, statement));
    }
    output
}

fn render_one(engine: &mut Engine, sql: &str) -> String {
    let result = engine.execute(QueryRequest::new(sql));
    if let Some(error) = &result.error {
        return format!("Error: {error}");
    }

    let is_status_message = result.columns.len() == 1 && result.columns[0] == "status";
    if is_status_message {
        if let Some(types::Value::Text(message)) = result.rows.first().map(|r| &r.values[0]) {
            return message.clone();
        }
    }

    let batch = RecordBatch { columns: result.columns, rows: result.rows };
    render_record_batch(&batch, TableStyleKind::Modern)
}
