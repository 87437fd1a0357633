//! Projection operator: computes the select list against each input row.

use crate::eval::eval_resolved_expr;
use crate::{ExecutedRow, ExecutionContext, Executor};
use common::{DbResult, Row};
use planner::{ProjectItem, Schema};

pub struct ProjectionExec {
    input: Box<dyn Executor>,
    items: Vec<ProjectItem>,
    schema: Schema,
}

impl ProjectionExec {
    pub fn new(input: Box<dyn Executor>, items: Vec<ProjectItem>, schema: Schema) -> Self {
        Self { input, items, schema }
    }
}

impl Executor for ProjectionExec {
    fn open(&mut self, ctx: &mut ExecutionContext) -> DbResult<()> {
        self.input.open(ctx)
    }

    fn next(&mut self, ctx: &mut ExecutionContext) -> DbResult<Option<ExecutedRow>> {
        let Some(row) = self.input.next(ctx)? else {
            return Ok(None);
        };
        let values = self
            .items
            .iter()
            .map(|item| eval_resolved_expr(&item.expr, &row.row))
            .collect::<DbResult<Vec<_>>>()?;
        Ok(Some(ExecutedRow {
            row: Row::new(values),
            origin: row.origin,
        }))
    }

    fn close(&mut self, ctx: &mut ExecutionContext) -> DbResult<()> {
        self.input.close(ctx)
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }
}
