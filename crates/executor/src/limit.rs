//! Limit operator: caps the number of rows pulled from its child.

use crate::{ExecutedRow, ExecutionContext, Executor};
use common::DbResult;
use planner::Schema;

pub struct LimitExec {
    input: Box<dyn Executor>,
    limit: i64,
    schema: Schema,
    remaining: i64,
}

impl LimitExec {
    pub fn new(input: Box<dyn Executor>, limit: i64, schema: Schema) -> Self {
        Self { input, limit, schema, remaining: 0 }
    }
}

impl Executor for LimitExec {
    fn open(&mut self, ctx: &mut ExecutionContext) -> DbResult<()> {
        self.remaining = self.limit.max(0);
        self.input.open(ctx)
    }

    fn next(&mut self, ctx: &mut ExecutionContext) -> DbResult<Option<ExecutedRow>> {
        if self.remaining == 0 {
            return Ok(None);
        }
        let row = self.input.next(ctx)?;
        if row.is_some() {
            self.remaining -= 1;
        }
        Ok(row)
    }

    fn close(&mut self, ctx: &mut ExecutionContext) -> DbResult<()> {
        self.input.close(ctx)
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }
}
