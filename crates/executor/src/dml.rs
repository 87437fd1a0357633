//! DML operators: Insert and Delete.

use crate::eval::{eval_predicate, eval_resolved_expr};
use crate::{ExecutedRow, ExecutionContext, Executor};
use catalog::Table;
use common::{DbError, DbResult, Row};
use planner::{InsertPlanSource, ResolvedExpr, Schema};
use storage::{decode_rows, encode_rows, HEADER_SIZE, PAGE_SIZE};
use types::Value;

enum InsertSource {
    Values(Vec<Vec<ResolvedExpr>>),
    Select(Box<dyn Executor>),
}

/// Appends rows built from either a `VALUES` list or a nested `SELECT` into
/// a table, mapping each source row onto the table's column order and
/// coercing every value to its column's declared type.
pub struct InsertExec {
    table_name: String,
    target_columns: Vec<usize>,
    arity: usize,
    source: InsertSource,
    schema: Schema,
    message: Option<String>,
}

impl InsertExec {
    pub fn new(table: &Table, columns: &Option<Vec<String>>, source: InsertPlanSource, schema: Schema) -> DbResult<Self> {
        let target_columns = match columns {
            Some(names) => names
                .iter()
                .map(|n| {
                    table.column_index(n).ok_or_else(|| {
                        DbError::ValidationError(format!("unknown column '{n}' in table '{}'", table.name))
                    })
                })
                .collect::<DbResult<Vec<_>>>()?,
            None => (0..table.arity()).collect(),
        };
        let source = match source {
            InsertPlanSource::Values(rows) => InsertSource::Values(rows),
            InsertPlanSource::Select(plan) => InsertSource::Select(crate::builder::build(*plan)?),
        };
        Ok(Self {
            table_name: table.name.clone(),
            target_columns,
            arity: table.arity(),
            source,
            schema,
            message: None,
        })
    }

    fn map_row(&self, table: &Table, values: Vec<Value>) -> DbResult<Row> {
        if values.len() != self.target_columns.len() {
            return Err(DbError::ValidationError(format!(
                "expected {} values, found {}",
                self.target_columns.len(),
                values.len()
            )));
        }
        let mut out = vec![Value::Null; self.arity];
        for (value, &col) in values.into_iter().zip(self.target_columns.iter()) {
            let coerced = value.coerce_to(table.column_types[col]).ok_or_else(|| {
                DbError::ValidationError(format!(
                    "cannot store value in column '{}' of type {:?}",
                    table.column_names[col], table.column_types[col]
                ))
            })?;
            out[col] = coerced;
        }
        Ok(Row::new(out))
    }
}

impl Executor for InsertExec {
    fn open(&mut self, ctx: &mut ExecutionContext) -> DbResult<()> {
        let table = ctx.txn.resolve_table(ctx.catalog, &self.table_name)?;

        let rows = match &mut self.source {
            InsertSource::Values(rows) => {
                let empty = Row::new(Vec::new());
                let mut built = Vec::with_capacity(rows.len());
                for row in rows.iter() {
                    let values = row
                        .iter()
                        .map(|expr| eval_resolved_expr(expr, &empty))
                        .collect::<DbResult<Vec<_>>>()?;
                    built.push(self.map_row(&table, values)?);
                }
                built
            }
            InsertSource::Select(child) => {
                child.open(ctx)?;
                let mut built = Vec::new();
                let result = (|| {
                    while let Some(row) = child.next(ctx)? {
                        built.push(row.row.values);
                    }
                    Ok(())
                })();
                child.close(ctx)?;
                result?;
                let mut mapped = Vec::with_capacity(built.len());
                for values in built {
                    mapped.push(self.map_row(&table, values)?);
                }
                mapped
            }
        };

        let count = rows.len();
        append_rows(ctx, &self.table_name, rows)?;
        self.message = Some(format!("{count} row(s) inserted"));
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

/// Appends `rows` to `table_name`'s page list. Tries to pack them onto the
/// table's last existing page first (copy-on-write only if at least one row
/// actually fits, avoiding an empty COW when the page is already full), then
/// allocates as many fresh pages as the remainder needs.
fn append_rows(ctx: &mut ExecutionContext, table_name: &str, mut rows: Vec<Row>) -> DbResult<()> {
    let table = ctx.txn.resolve_table(ctx.catalog, table_name)?;

    if let Some(last_ordinal) = table.page_ids.len().checked_sub(1) {
        let last_page_id = table.page_ids[last_ordinal];
        let existing = decode_rows(&ctx.pool.get_page(last_page_id)?.payload)?;

        let taken = fitting_prefix_len(&existing, &rows)?;
        if taken > 0 {
            let (page_id, mut page_rows) = ctx.txn.page_for_write(ctx.catalog, ctx.pool, table_name, last_ordinal)?;
            page_rows.extend(rows.drain(..taken));
            ctx.txn.write_page(ctx.pool, page_id, &page_rows)?;
        }
    }

    while !rows.is_empty() {
        let taken = fitting_prefix_len(&[], &rows)?;
        if taken == 0 {
            return Err(DbError::PageOverflow("row too large to fit in a single page".into()));
        }
        let page_id = ctx.txn.allocate_page(ctx.catalog, ctx.pool, table_name)?;
        let page_rows: Vec<Row> = rows.drain(..taken).collect();
        ctx.txn.write_page(ctx.pool, page_id, &page_rows)?;
    }

    Ok(())
}

/// How many of `candidates`, taken in order and appended after `base`, still
/// encode within one page.
fn fitting_prefix_len(base: &[Row], candidates: &[Row]) -> DbResult<usize> {
    let mut buf = base.to_vec();
    let mut taken = 0;
    for row in candidates {
        buf.push(row.clone());
        if encode_rows(&buf)?.len() <= PAGE_SIZE - HEADER_SIZE {
            taken += 1;
        } else {
            buf.pop();
            break;
        }
    }
    Ok(taken)
}

/// Deletes every row matching an optional predicate (all rows, if none),
/// copy-on-writing every page of the table unconditionally — simpler than
/// tracking which pages actually contain a match, at the cost of an
/// unconditional COW per page even when nothing in it is deleted.
pub struct DeleteExec {
    table_name: String,
    predicate: Option<ResolvedExpr>,
    schema: Schema,
    message: Option<String>,
}

impl DeleteExec {
    pub fn new(table: &Table, predicate: Option<ResolvedExpr>, schema: Schema) -> Self {
        Self {
            table_name: table.name.clone(),
            predicate,
            schema,
            message: None,
        }
    }
}

impl Executor for DeleteExec {
    fn open(&mut self, ctx: &mut ExecutionContext) -> DbResult<()> {
        let table = ctx.txn.resolve_table(ctx.catalog, &self.table_name)?;
        let mut deleted = 0usize;

        for ordinal in 0..table.page_ids.len() {
            let (page_id, mut rows) = ctx.txn.page_for_write(ctx.catalog, ctx.pool, &self.table_name, ordinal)?;

            let mut indices = Vec::new();
            for (i, row) in rows.iter().enumerate() {
                let matches = match &self.predicate {
                    Some(expr) => eval_predicate(expr, row)?,
                    None => true,
                };
                if matches {
                    indices.push(i);
                }
            }

            if !indices.is_empty() {
                deleted += indices.len();
                txn::delete_rows(&mut rows, indices);
                ctx.txn.write_page(ctx.pool, page_id, &rows)?;
            }
        }

        self.message = Some(format!("{deleted} row(s) deleted"));
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
    use crate::tests::helpers::{table_schema, TestDb};
    use crate::Executor;
    use expr::BinaryOp;
    use planner::{InsertPlanSource, ResolvedExpr};
    use pretty_assertions::assert_eq;
    use types::{SqlType, Value};

    #[test]
    fn insert_values_coerces_text_literals_and_fills_unspecified_columns_with_null() {
        let mut db = TestDb::new();
        db.create_table("t", &[("id", SqlType::Int), ("name", SqlType::Text)]);
        let table = db.table("t");

        let source = InsertPlanSource::Values(vec![vec![ResolvedExpr::Literal(Value::Int(1))]]);
        let schema = vec![planner::ColumnIdentifier {
            name: "status".into(),
            qualifier: None,
            is_aggregate: false,
        }];
        let mut insert =
            super::InsertExec::new(&table, &Some(vec!["id".into()]), source, schema).unwrap();
        let mut ctx = db.ctx();

        insert.open(&mut ctx).unwrap();
        let row = insert.next(&mut ctx).unwrap().unwrap();
        assert_eq!(row.row.values, vec![Value::Text("1 row(s) inserted".into())]);
        insert.close(&mut ctx).unwrap();

        let table = db.table("t");
        let out_schema = table_schema(&table, "t");
        let mut scan = super::super::scan::ScanExec::new(table, out_schema);
        let mut ctx = db.ctx();
        scan.open(&mut ctx).unwrap();
        let row = scan.next(&mut ctx).unwrap().unwrap();
        assert_eq!(row.row.values, vec![Value::Int(1), Value::Null]);
        scan.close(&mut ctx).unwrap();
    }

    #[test]
    fn delete_with_predicate_removes_only_matching_rows() {
        let mut db = TestDb::new();
        db.create_table("t", &[("id", SqlType::Int)]);
        db.insert_values("t", vec![vec![Value::Int(1)], vec![Value::Int(2)], vec![Value::Int(3)]]);

        let table = db.table("t");
        let schema = table_schema(&table, "t");
        let predicate = ResolvedExpr::Binary {
            left: Box::new(ResolvedExpr::Column(0)),
            op: BinaryOp::Eq,
            right: Box::new(ResolvedExpr::Literal(Value::Int(2))),
        };
        let status_schema = vec![planner::ColumnIdentifier {
            name: "status".into(),
            qualifier: None,
            is_aggregate: false,
        }];
        let mut delete = super::DeleteExec::new(&table, Some(predicate), status_schema);
        let mut ctx = db.ctx();

        delete.open(&mut ctx).unwrap();
        let row = delete.next(&mut ctx).unwrap().unwrap();
        assert_eq!(row.row.values, vec![Value::Text("1 row(s) deleted".into())]);
        delete.close(&mut ctx).unwrap();

        let table = db.table("t");
        let mut scan = super::super::scan::ScanExec::new(table, schema);
        let mut ctx = db.ctx();
        scan.open(&mut ctx).unwrap();
        let mut remaining = Vec::new();
        while let Some(row) = scan.next(&mut ctx).unwrap() {
            remaining.push(row.row.values[0].clone());
        }
        scan.close(&mut ctx).unwrap();

        assert_eq!(remaining, vec![Value::Int(1), Value::Int(3)]);
    }
}
