
use common::{DbError, DbResult};
use std::cmp::Ordering;
use types::Value;

/// Binary comparison, logical, and arithmetic operators, with the precedence
/// table a Pratt parser climbs: `OR` (10) < `AND` (20) < comparisons (30) <
/// `+`/`-` (40) < `*`/`/`/`%` (50).
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum BinaryOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl BinaryOp {
    /// Binding power used by the parser's precedence climb. Higher binds tighter.
    pub fn precedence(self) -> u8 {
        match self {
            BinaryOp::Or => 10,
            BinaryOp::And => 20,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => 30,
            BinaryOp::Add | BinaryOp::Sub => 40,
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => 50,
        }
    }
}

/// Unary operators: logical NOT and arithmetic negation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum UnaryOp {
    Not,
    Neg,
}

/// Expression abstract syntax tree produced by the parser and consumed by the
/// planner, which binds `Column` references to ordinals (see `planner::ResolvedExpr`).
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Expr {
    Literal(Value),
    /// Column reference with optional table/alias qualifier.
    ///
    /// Examples:
    /// - `Column { table: None, name: "id" }` - unqualified column
    /// - `Column { table: Some("users"), name: "id" }` - qualified column
    /// - `Column { table: Some("u"), name: "id" }` - alias-qualified column
    Column {
        table: Option<String>,
        name: String,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },
}

/// Apply a unary operator to an already-evaluated value.
pub fn eval_unary(op: UnaryOp, v: Value) -> DbResult<Value> {
    match op {
        UnaryOp::Not => {
            if v.is_null() {
                return Ok(Value::Null);
            }
            let b = v
                .as_bool()
                .ok_or_else(|| DbError::RuntimeError(format!("NOT expects bool, got {v:?}")))?;
            Ok(Value::Bool(!b))
        }
        UnaryOp::Neg => match v {
            Value::Int(i) => Ok(Value::Int(-i)),
            Value::Null => Ok(Value::Null),
            other => Err(DbError::RuntimeError(format!("unary - expects int, got {other:?}"))),
        },
    }
}

/// Apply a binary operator to two already-evaluated values.
///
/// Comparisons and arithmetic propagate `NULL` (result is `NULL` if either side
/// is `NULL`), matching standard SQL three-valued logic; `AND`/`OR` short-circuit
/// on values alone since both operands are already evaluated here.
pub fn eval_binary(op: BinaryOp, l: Value, r: Value) -> DbResult<Value> {
    use BinaryOp::*;

    if matches!(op, And | Or) {
        return eval_logical(op, l, r);
    }

    if l.is_null() || r.is_null() {
        return Ok(Value::Null);
    }

    match op {
        Add | Sub | Mul | Div | Mod => eval_arithmetic(op, l, r),
        _ => eval_comparison(op, l, r),
    }
}

fn eval_logical(op: BinaryOp, l: Value, r: Value) -> DbResult<Value> {
    // Three-valued AND/OR: NULL behaves as "unknown" except where short-circuited
    // by a determining operand (false for AND, true for OR).
    let lb = match &l {
        Value::Bool(b) => Some(*b),
        Value::Null => None,
        other => return Err(DbError::RuntimeError(format!("AND/OR expects bool, got {other:?}"))),
    };
    let rb = match &r {
        Value::Bool(b) => Some(*b),
        Value::Null => None,
        other => return Err(DbError::RuntimeError(format!("AND/OR expects bool, got {other:?}"))),
    };

    let result = match op {
        BinaryOp::And => match (lb, rb) {
            (Some(false), _) | (_, Some(false)) => Some(false),
            (Some(true), Some(true)) => Some(true),
            _ => None,
        },
        BinaryOp::Or => match (lb, rb) {
            (Some(true), _) | (_, Some(true)) => Some(true),
            (Some(false), Some(false)) => Some(false),
            _ => None,
        },
        _ => unreachable!(),
    };

    Ok(match result {
        Some(b) => Value::Bool(b),
        None => Value::Null,
    })
}

fn eval_arithmetic(op: BinaryOp, l: Value, r: Value) -> DbResult<Value> {
    let (Value::Int(a), Value::Int(b)) = (&l, &r) else {
        return Err(DbError::RuntimeError(format!(
            "arithmetic expects int operands, got {l:?} and {r:?}"
        )));
    };

    Ok(Value::Int(match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => {
            if *b == 0 {
                return Err(DbError::RuntimeError("division by zero".into()));
            }
            a / b
        }
        BinaryOp::Mod => {
            if *b == 0 {
                return Err(DbError::RuntimeError("modulo by zero".into()));
            }
            a % b
        }
        _ => unreachable!(),
    }))
}

fn eval_comparison(op: BinaryOp, l: Value, r: Value) -> DbResult<Value> {
    use BinaryOp::*;

    let ord = l
        .cmp_same_type(&r)
        .ok_or_else(|| DbError::RuntimeError(format!("incompatible types for {op:?}: {l:?}, {r:?}")))?;

    let result = match op {
        Eq => ord == Ordering::Equal,
        Ne => ord != Ordering::Equal,
        Lt => ord == Ordering::Less,
        Le => ord != Ordering::Greater,
        Gt => ord == Ordering::Greater,
        Ge => ord != Ordering::Less,
        _ => unreachable!(),
    };

    Ok(Value::Bool(result))
}
