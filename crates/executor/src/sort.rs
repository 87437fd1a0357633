//! Sorter: materializes its child and orders rows by a multi-key comparator.

use crate::eval::eval_resolved_expr;
use crate::{ExecutedRow, ExecutionContext, Executor};
use common::DbResult;
use planner::{ResolvedExpr, Schema};
use std::cmp::Ordering;
use types::Value;

pub struct SortExec {
    input: Box<dyn Executor>,
    keys: Vec<(ResolvedExpr, bool)>,
    schema: Schema,
    rows: std::vec::IntoIter<ExecutedRow>,
}

impl SortExec {
    pub fn new(input: Box<dyn Executor>, keys: Vec<(ResolvedExpr, bool)>, schema: Schema) -> Self {
        Self { input, keys, schema, rows: Vec::new().into_iter() }
    }
}

/// NULLs sort as less than any non-null value for a given key; non-null
/// values of the same type compare normally.
fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a.cmp_same_type(b).unwrap_or(Ordering::Equal),
    }
}

impl Executor for SortExec {
    fn open(&mut self, ctx: &mut ExecutionContext) -> DbResult<()> {
        self.input.open(ctx)?;

        let mut rows = Vec::new();
        while let Some(row) = self.input.next(ctx)? {
            rows.push(row);
        }
        self.input.close(ctx)?;

        let mut keyed = Vec::with_capacity(rows.len());
        for row in rows {
            let key = self
                .keys
                .iter()
                .map(|(expr, _)| eval_resolved_expr(expr, &row.row))
                .collect::<DbResult<Vec<_>>>()?;
            keyed.push((key, row));
        }

        let descending_flags: Vec<bool> = self.keys.iter().map(|(_, desc)| *desc).collect();
        keyed.sort_by(|(ka, _), (kb, _)| {
            for (i, desc) in descending_flags.iter().enumerate() {
                let ord = compare_values(&ka[i], &kb[i]);
                if ord != Ordering::Equal {
                    return if *desc { ord.reverse() } else { ord };
                }
            }
            Ordering::Equal
        });

        self.rows = keyed.into_iter().map(|(_, row)| row).collect::<Vec<_>>().into_iter();
        Ok(())
    }

    fn next(&mut self, _ctx: &mut ExecutionContext) -> DbResult<Option<ExecutedRow>> {
        Ok(self.rows.next())
    }

    fn close(&mut self, _ctx: &mut ExecutionContext) -> DbResult<()> {
        self.rows = Vec::new().into_iter();
        Ok(())
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }
}

#[cfg(test)]
mod tests {
    use crate::tests::helpers::{table_schema, TestDb};
    use crate::Executor;
    use planner::ResolvedExpr;
    use pretty_assertions::assert_eq;
    use types::{SqlType, Value};

    #[test]
    fn sorts_descending_by_a_single_key() {
        let mut db = TestDb::new();
        db.create_table("t", &[("age", SqlType::Int)]);
        db.insert_values("t", vec![vec![Value::Int(30)], vec![Value::Int(10)], vec![Value::Int(20)]]);

        let table = db.table("t");
        let schema = table_schema(&table, "t");
        let scan = Box::new(super::super::scan::ScanExec::new(table, schema.clone()));
        let mut sort = super::SortExec::new(scan, vec![(ResolvedExpr::Column(0), true)], schema);
        let mut ctx = db.ctx();

        sort.open(&mut ctx).unwrap();
        let mut seen = Vec::new();
        while let Some(row) = sort.next(&mut ctx).unwrap() {
            seen.push(row.row.values[0].clone());
        }
        sort.close(&mut ctx).unwrap();

        assert_eq!(seen, vec![Value::Int(30), Value::Int(20), Value::Int(10)]);
    }

    #[test]
    fn nulls_sort_before_non_null_values() {
        let mut db = TestDb::new();
        db.create_table("t", &[("age", SqlType::Int)]);
        db.insert_values("t", vec![vec![Value::Int(5)], vec![Value::Null], vec![Value::Int(1)]]);

        let table = db.table("t");
        let schema = table_schema(&table, "t");
        let scan = Box::new(super::super::scan::ScanExec::new(table, schema.clone()));
        let mut sort = super::SortExec::new(scan, vec![(ResolvedExpr::Column(0), false)], schema);
        let mut ctx = db.ctx();

        sort.open(&mut ctx).unwrap();
        let mut seen = Vec::new();
        while let Some(row) = sort.next(&mut ctx).unwrap() {
            seen.push(row.row.values[0].clone());
        }
        sort.close(&mut ctx).unwrap();

        assert_eq!(seen, vec![Value::Null, Value::Int(1), Value::Int(5)]);
    }
}
