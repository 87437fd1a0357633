//! Aggregate operator: groups rows by a key and folds each group through a
//! per-column accumulator.

use crate::eval::eval_resolved_expr;
use crate::{ExecutedRow, ExecutionContext, Executor};
use common::{DbError, DbResult, Row};
use hashbrown::HashMap;
use parser::AggregateFunc;
use planner::{AggregateSpec, ResolvedExpr, Schema};
use std::cmp::Ordering;
use types::Value;

/// Running state for one aggregate output within one group.
///
/// `AVG` composes a sum and a count rather than inheriting from either, and
/// `DISTINCT` is a generalization of the `COUNT(DISTINCT ...)` grammar:
/// whichever function carries it tracks a seen-set of its argument's values
/// and folds each value into the accumulator at most once per group.
enum Accumulator {
    Count { count: i64, is_star: bool, seen: Option<hashbrown::HashSet<Value>> },
    Sum { sum: i64, seen: Option<hashbrown::HashSet<Value>> },
    Min { current: Option<Value> },
    Max { current: Option<Value> },
    Avg { sum: i64, count: i64, seen: Option<hashbrown::HashSet<Value>> },
}

impl Accumulator {
    fn new(spec: &AggregateSpec) -> Self {
        let seen = spec.distinct.then(hashbrown::HashSet::new);
        match spec.func {
            AggregateFunc::Count => Accumulator::Count { count: 0, is_star: spec.arg.is_none(), seen },
            AggregateFunc::Sum => Accumulator::Sum { sum: 0, seen },
            AggregateFunc::Min => Accumulator::Min { current: None },
            AggregateFunc::Max => Accumulator::Max { current: None },
            AggregateFunc::Avg => Accumulator::Avg { sum: 0, count: 0, seen },
        }
    }

    fn update(&mut self, value: Option<Value>) -> DbResult<()> {
        match self {
            Accumulator::Count { count, is_star, seen } => {
                if *is_star {
                    *count += 1;
                    return Ok(());
                }
                let v = value.expect("COUNT(expr) always carries an argument");
                if v.is_null() {
                    return Ok(());
                }
                if let Some(seen) = seen {
                    if !seen.insert(v) {
                        return Ok(());
                    }
                }
                *count += 1;
                Ok(())
            }
            Accumulator::Sum { sum, seen } => {
                let v = value.expect("SUM always carries an argument");
                if v.is_null() {
                    return Ok(());
                }
                let Value::Int(n) = v else {
                    return Err(DbError::RuntimeError(format!("SUM expects an integer, got {v:?}")));
                };
                if let Some(seen) = seen {
                    if !seen.insert(Value::Int(n)) {
                        return Ok(());
                    }
                }
                *sum += n;
                Ok(())
            }
            Accumulator::Min { current } => {
                let v = value.expect("MIN always carries an argument");
                if v.is_null() {
                    return Ok(());
                }
                match current {
                    None => *current = Some(v),
                    Some(cur) if v.cmp_same_type(cur) == Some(Ordering::Less) => *current = Some(v),
                    Some(_) => {}
                }
                Ok(())
            }
            Accumulator::Max { current } => {
                let v = value.expect("MAX always carries an argument");
                if v.is_null() {
                    return Ok(());
                }
                match current {
                    None => *current = Some(v),
                    Some(cur) if v.cmp_same_type(cur) == Some(Ordering::Greater) => *current = Some(v),
                    Some(_) => {}
                }
                Ok(())
            }
            Accumulator::Avg { sum, count, seen } => {
                let v = value.expect("AVG always carries an argument");
                if v.is_null() {
                    return Ok(());
                }
                let Value::Int(n) = v else {
                    return Err(DbError::RuntimeError(format!("AVG expects an integer, got {v:?}")));
                };
                if let Some(seen) = seen {
                    if !seen.insert(Value::Int(n)) {
                        return Ok(());
                    }
                }
                *sum += n;
                *count += 1;
                Ok(())
            }
        }
    }

    fn finalize(self) -> Value {
        match self {
            Accumulator::Count { count, .. } => Value::Int(count),
            Accumulator::Sum { sum, .. } => Value::Int(sum),
            Accumulator::Min { current } => current.unwrap_or(Value::Null),
            Accumulator::Max { current } => current.unwrap_or(Value::Null),
            Accumulator::Avg { sum, count, .. } => {
                if count == 0 {
                    Value::Null
                } else {
                    Value::Int(sum / count)
                }
            }
        }
    }
}

pub struct AggregateExec {
    input: Box<dyn Executor>,
    group_by: Vec<ResolvedExpr>,
    aggregates: Vec<AggregateSpec>,
    schema: Schema,
    output: std::vec::IntoIter<Row>,
}

impl AggregateExec {
    pub fn new(
        input: Box<dyn Executor>,
        group_by: Vec<ResolvedExpr>,
        aggregates: Vec<AggregateSpec>,
        schema: Schema,
    ) -> Self {
        Self { input, group_by, aggregates, schema, output: Vec::new().into_iter() }
    }
}

impl Executor for AggregateExec {
    fn open(&mut self, ctx: &mut ExecutionContext) -> DbResult<()> {
        self.input.open(ctx)?;

        // Groups in first-encounter order: a plain Vec indexed by a
        // name->index map, rather than a hash map alone, so output order is
        // deterministic across runs with the same input order.
        let mut order: Vec<Vec<Value>> = Vec::new();
        let mut index_of: HashMap<Vec<Value>, usize> = HashMap::new();
        let mut states: Vec<Vec<Accumulator>> = Vec::new();

        while let Some(row) = self.input.next(ctx)? {
            let key = self
                .group_by
                .iter()
                .map(|e| eval_resolved_expr(e, &row.row))
                .collect::<DbResult<Vec<_>>>()?;

            let group_idx = *index_of.entry(key.clone()).or_insert_with(|| {
                order.push(key.clone());
                states.push(self.aggregates.iter().map(Accumulator::new).collect());
                order.len() - 1
            });

            for (spec, acc) in self.aggregates.iter().zip(states[group_idx].iter_mut()) {
                let value = match &spec.arg {
                    Some(expr) => Some(eval_resolved_expr(expr, &row.row)?),
                    None => None,
                };
                acc.update(value)?;
            }
        }
        self.input.close(ctx)?;

        let mut rows = Vec::with_capacity(order.len());
        for (key, accs) in order.into_iter().zip(states.into_iter()) {
            let mut values = key;
            values.extend(accs.into_iter().map(Accumulator::finalize));
            rows.push(Row::new(values));
        }
        self.output = rows.into_iter();
        Ok(())
    }

    fn next(&mut self, _ctx: &mut ExecutionContext) -> DbResult<Option<ExecutedRow>> {
        Ok(self.output.next().map(ExecutedRow::synthesized))
    }

    fn close(&mut self, _ctx: &mut ExecutionContext) -> DbResult<()> {
        self.output = Vec::new().into_iter();
        Ok(())
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }
}
