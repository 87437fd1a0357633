//! Evaluation of a bound [`ResolvedExpr`] against a materialized row.

use common::{DbError, DbResult, Row};
use planner::ResolvedExpr;
use types::Value;

/// Evaluate `expr` against `row`, resolving `Column` ordinals positionally.
pub fn eval_resolved_expr(expr: &ResolvedExpr, row: &Row) -> DbResult<Value> {
    match expr {
        ResolvedExpr::Literal(v) => Ok(v.clone()),
        ResolvedExpr::Column(idx) => row
            .values
            .get(*idx as usize)
            .cloned()
            .ok_or_else(|| DbError::RuntimeError(format!("column ordinal {idx} out of range for row"))),
        ResolvedExpr::Unary { op, expr } => expr::eval_unary(*op, eval_resolved_expr(expr, row)?),
        ResolvedExpr::Binary { left, op, right } => {
            let l = eval_resolved_expr(left, row)?;
            let r = eval_resolved_expr(right, row)?;
            expr::eval_binary(*op, l, r)
        }
    }
}

/// Evaluate a boolean predicate, treating `NULL` as false (standard SQL
/// three-valued `WHERE`/`ON` semantics).
pub fn eval_predicate(expr: &ResolvedExpr, row: &Row) -> DbResult<bool> {
    match eval_resolved_expr(expr, row)? {
        Value::Bool(b) => Ok(b),
        Value::Null => Ok(false),
        other => Err(DbError::RuntimeError(format!(
            "predicate must evaluate to boolean, got {other:?}"
        ))),
    }
}
