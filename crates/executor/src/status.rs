//! Status operator: emits a single synthesized row carrying a human-readable
//! message, used for DDL, transaction-control, and DML result summaries.

use crate::{ExecutedRow, ExecutionContext, Executor};
use common::{DbResult, Row};
use planner::Schema;
use types::Value;

pub struct StatusExec {
    message: Option<String>,
    schema: Schema,
}

impl StatusExec {
    pub fn new(message: String, schema: Schema) -> Self {
        Self { message: Some(message), schema }
    }
}

impl Executor for StatusExec {
    fn open(&mut self, _ctx: &mut ExecutionContext) -> DbResult<()> {
        Ok(())
    }

    fn next(&mut self, _ctx: &mut ExecutionContext) -> DbResult<Option<ExecutedRow>> {
        Ok(self
            .message
            .take()
            .map(|m| ExecutedRow::synthesized(Row::new(vec![Value::Text(m)]))))
    }

    fn close(&mut self, _ctx: &mut ExecutionContext) -> DbResult<()> {
        Ok(())
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }
}

#[cfg(test)]
mod tests {
    use crate::tests::helpers::TestDb;
    use crate::Executor;
    use pretty_assertions::assert_eq;
    use types::Value;

    #[test]
    fn status_yields_one_message_row_then_ends() {
        let mut db = TestDb::new();
        let schema = vec![planner::ColumnIdentifier {
            name: "status".into(),
            qualifier: None,
            is_aggregate: false,
        }];
        let mut status = super::StatusExec::new("ok".into(), schema);
        let mut ctx = db.ctx();

        status.open(&mut ctx).unwrap();
        let row = status.next(&mut ctx).unwrap().unwrap();
        assert_eq!(row.row.values, vec![Value::Text("ok".into())]);
        assert_eq!(status.next(&mut ctx).unwrap(), None);
        status.close(&mut ctx).unwrap();
    }
}
