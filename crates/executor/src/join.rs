//! Nested-loop join: materializes the right side once, rescanning it per
//! left-side row.

use crate::eval::eval_predicate;
use crate::{ExecutedRow, ExecutionContext, Executor};
use common::{DbResult, Row};
use planner::{ResolvedExpr, Schema};

pub struct NestedLoopJoinExec {
    left: Box<dyn Executor>,
    right: Box<dyn Executor>,
    predicate: ResolvedExpr,
    schema: Schema,
    right_rows: Vec<Row>,
    current_left: Option<Row>,
    right_cursor: usize,
}

impl NestedLoopJoinExec {
    pub fn new(left: Box<dyn Executor>, right: Box<dyn Executor>, predicate: ResolvedExpr, schema: Schema) -> Self {
        Self {
            left,
            right,
            predicate,
            schema,
            right_rows: Vec::new(),
            current_left: None,
            right_cursor: 0,
        }
    }
}

impl Executor for NestedLoopJoinExec {
    fn open(&mut self, ctx: &mut ExecutionContext) -> DbResult<()> {
        self.left.open(ctx)?;
        self.right.open(ctx)?;

        self.right_rows.clear();
        while let Some(row) = self.right.next(ctx)? {
            self.right_rows.push(row.row);
        }
        self.right.close(ctx)?;

        self.current_left = None;
        self.right_cursor = 0;
        Ok(())
    }

    fn next(&mut self, ctx: &mut ExecutionContext) -> DbResult<Option<ExecutedRow>> {
        loop {
            if self.current_left.is_none() {
                match self.left.next(ctx)? {
                    Some(row) => {
                        self.current_left = Some(row.row);
                        self.right_cursor = 0;
                    }
                    None => return Ok(None),
                }
            }

            let left_row = self.current_left.as_ref().expect("just populated above");
            while self.right_cursor < self.right_rows.len() {
                let right_row = &self.right_rows[self.right_cursor];
                self.right_cursor += 1;

                let mut combined = left_row.values.clone();
                combined.extend(right_row.values.iter().cloned());
                let combined = Row::new(combined);

                if eval_predicate(&self.predicate, &combined)? {
                    return Ok(Some(ExecutedRow { row: combined, origin: None }));
                }
            }

            self.current_left = None;
        }
    }

    fn close(&mut self, ctx: &mut ExecutionContext) -> DbResult<()> {
        self.left.close(ctx)
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
    fn inner_join_combines_matching_rows() {
        let mut db = TestDb::new();
        db.create_table("users", &[("id", SqlType::Int), ("dept_id", SqlType::Int)]);
        db.create_table("department", &[("id", SqlType::Int), ("name", SqlType::Text)]);
        db.insert_values("users", vec![vec![Value::Int(1), Value::Int(10)], vec![Value::Int(2), Value::Int(20)]]);
        db.insert_values(
            "department",
            vec![vec![Value::Int(10), Value::Text("eng".into())], vec![Value::Int(20), Value::Text("sales".into())]],
        );

        let users = db.table("users");
        let department = db.table("department");
        let users_schema = table_schema(&users, "users");
        let dept_schema = table_schema(&department, "department");
        let mut combined_schema = users_schema.clone();
        combined_schema.extend(dept_schema.clone());

        let left = Box::new(super::super::scan::ScanExec::new(users, users_schema));
        let right = Box::new(super::super::scan::ScanExec::new(department, dept_schema));
        let predicate = ResolvedExpr::Binary {
            left: Box::new(ResolvedExpr::Column(1)),
            op: BinaryOp::Eq,
            right: Box::new(ResolvedExpr::Column(2)),
        };
        let mut join = super::NestedLoopJoinExec::new(left, right, predicate, combined_schema);
        let mut ctx = db.ctx();

        join.open(&mut ctx).unwrap();
        let mut names = Vec::new();
        while let Some(row) = join.next(&mut ctx).unwrap() {
            names.push(row.row.values[3].clone());
            assert_eq!(row.origin, None);
        }
        join.close(&mut ctx).unwrap();

        assert_eq!(names, vec![Value::Text("eng".into()), Value::Text("sales".into())]);
    }
}
