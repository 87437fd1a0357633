//! Filter operator: passes through rows matching a predicate.

use crate::eval::eval_predicate;
use crate::{ExecutedRow, ExecutionContext, Executor};
use common::DbResult;
use planner::{ResolvedExpr, Schema};

pub struct FilterExec {
    input: Box<dyn Executor>,
    predicate: ResolvedExpr,
    schema: Schema,
}

impl FilterExec {
    pub fn new(input: Box<dyn Executor>, predicate: ResolvedExpr, schema: Schema) -> Self {
        Self { input, predicate, schema }
    }
}

impl Executor for FilterExec {
    fn open(&mut self, ctx: &mut ExecutionContext) -> DbResult<()> {
        self.input.open(ctx)
    }

    fn next(&mut self, ctx: &mut ExecutionContext) -> DbResult<Option<ExecutedRow>> {
        while let Some(row) = self.input.next(ctx)? {
            if eval_predicate(&self.predicate, &row.row)? {
                return Ok(Some(row));
            }
        }
        Ok(None)
    }

    fn close(&mut self, ctx: &mut ExecutionContext) -> DbResult<()> {
        self.input.close(ctx)
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }
}

#[cfg(test)]
mod tests {
    use crate::tests::helpers::{table_schema, TestDb};
    use crate::Executor;
    use expr::BinaryOp;
    use planner::ResolvedExpr;
    use pretty_assertions::assert_eq;
    use types::{SqlType, Value};

    #[test]
    fn filter_passes_only_matching_rows() {
        let mut db = TestDb::new();
        db.create_table("t", &[("id", SqlType::Int), ("age", SqlType::Int)]);
        db.insert_values(
            "t",
            vec![
                vec![Value::Int(1), Value::Int(10)],
                vec![Value::Int(2), Value::Int(20)],
                vec![Value::Int(3), Value::Int(30)],
            ],
        );

        let table = db.table("t");
        let schema = table_schema(&table, "t");
        let scan = Box::new(super::super::scan::ScanExec::new(table, schema.clone()));
        let predicate = ResolvedExpr::Binary {
            left: Box::new(ResolvedExpr::Column(1)),
            op: BinaryOp::Gt,
            right: Box::new(ResolvedExpr::Literal(Value::Int(15))),
        };
        let mut filter = super::FilterExec::new(scan, predicate, schema);
        let mut ctx = db.ctx();

        filter.open(&mut ctx).unwrap();
        let mut ids = Vec::new();
        while let Some(row) = filter.next(&mut ctx).unwrap() {
            ids.push(row.row.values[0].clone());
        }
        filter.close(&mut ctx).unwrap();

        assert_eq!(ids, vec![Value::Int(2), Value::Int(3)]);
    }

    #[test]
    fn null_predicate_is_treated_as_false() {
        let mut db = TestDb::new();
        db.create_table("t", &[("id", SqlType::Int)]);
        db.insert_values("t", vec![vec![Value::Int(1)]]);

        let table = db.table("t");
        let schema = table_schema(&table, "t");
        let scan = Box::new(super::super::scan::ScanExec::new(table, schema.clone()));
        let mut filter = super::FilterExec::new(scan, ResolvedExpr::Literal(Value::Null), schema);
        let mut ctx = db.ctx();

        filter.open(&mut ctx).unwrap();
        assert_eq!(filter.next(&mut ctx).unwrap(), None);
        filter.close(&mut ctx).unwrap();
    }
}
