//! Distinct operator: suppresses rows whose full value tuple has already
//! been emitted this scan.

use crate::{ExecutedRow, ExecutionContext, Executor};
use common::DbResult;
use hashbrown::HashSet;
use planner::Schema;
use types::Value;

pub struct DistinctExec {
    input: Box<dyn Executor>,
    schema: Schema,
    seen: HashSet<Vec<Value>>,
}

impl DistinctExec {
    pub fn new(input: Box<dyn Executor>, schema: Schema) -> Self {
        Self { input, schema, seen: HashSet::new() }
    }
}

impl Executor for DistinctExec {
    fn open(&mut self, ctx: &mut ExecutionContext) -> DbResult<()> {
        self.seen.clear();
        self.input.open(ctx)
    }

    fn next(&mut self, ctx: &mut ExecutionContext) -> DbResult<Option<ExecutedRow>> {
        while let Some(row) = self.input.next(ctx)? {
            if self.seen.insert(row.row.values.clone()) {
                return Ok(Some(row));
            }
        }
        Ok(None)
    }

    fn close(&mut self, ctx: &mut ExecutionContext) -> DbResult<()> {
        self.seen.clear();
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
    use pretty_assertions::assert_eq;
    use types::{SqlType, Value};

    #[test]
    fn distinct_drops_repeated_row_tuples() {
        let mut db = TestDb::new();
        db.create_table("t", &[("city", SqlType::Text)]);
        db.insert_values(
            "t",
            vec![
                vec![Value::Text("NY".into())],
                vec![Value::Text("NY".into())],
                vec![Value::Text("SF".into())],
            ],
        );

        let table = db.table("t");
        let schema = table_schema(&table, "t");
        let scan = Box::new(super::super::scan::ScanExec::new(table, schema.clone()));
        let mut distinct = super::DistinctExec::new(scan, schema);
        let mut ctx = db.ctx();

        distinct.open(&mut ctx).unwrap();
        let mut seen = Vec::new();
        while let Some(row) = distinct.next(&mut ctx).unwrap() {
            seen.push(row.row.values[0].clone());
        }
        distinct.close(&mut ctx).unwrap();

        assert_eq!(seen, vec![Value::Text("NY".into()), Value::Text("SF".into())]);
    }
}
