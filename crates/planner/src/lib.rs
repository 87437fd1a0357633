//! Query planner: converts SQL AST to bound physical operator trees.
//!
//! The planner bridges between the parser's abstract syntax tree and the
//! executor's runtime operators. It performs two tasks:
//!
//! 1. **Name binding** - resolves column references to ordinals against a
//!    bottom-up computed `Schema`.
//! 2. **Shape selection** - picks the Volcano operator tree (scan, filter,
//!    join, aggregate, ...) that realizes a statement.
//!
//! There is no cost-based optimization; the physical shape mirrors the
//! syntactic shape of the statement directly.


use catalog::Table;
use common::{ColumnId, DbError, DbResult};
use parser::{AggregateFunc, Expr, FromClause, InsertSource, SelectStatement, SortItem, Statement};
use types::Value;

/// One column of a bottom-up-computed output schema.
#[derive(Clone, Debug, PartialEq)]
pub struct ColumnIdentifier {
    pub name: String,
    pub qualifier: Option<String>,
    pub is_aggregate: bool,
}

impl ColumnIdentifier {
    fn plain(name: impl Into<String>, qualifier: Option<String>) -> Self {
        Self {
            name: name.into(),
            qualifier,
            is_aggregate: false,
        }
    }
}

pub type Schema = Vec<ColumnIdentifier>;

/// An expression with column references bound to ordinals into a `Schema`.
#[derive(Clone, Debug, PartialEq)]
pub enum ResolvedExpr {
    Literal(Value),
    Column(ColumnId),
    Unary {
        op: expr::UnaryOp,
        expr: Box<ResolvedExpr>,
    },
    Binary {
        left: Box<ResolvedExpr>,
        op: expr::BinaryOp,
        right: Box<ResolvedExpr>,
    },
}

/// A bound aggregate function call.
#[derive(Clone, Debug, PartialEq)]
pub struct AggregateSpec {
    pub func: AggregateFunc,
    /// `None` only for `COUNT(*)`.
    pub arg: Option<ResolvedExpr>,
    pub distinct: bool,
    /// The canonical `FUNC(ARG)` / `FUNC(DISTINCT ARG)` / `FUNC(*)` name this
    /// output is addressable by in a later ORDER BY/select reference.
    pub output_name: String,
}

/// One item of a non-aggregating projection.
#[derive(Clone, Debug, PartialEq)]
pub struct ProjectItem {
    pub expr: ResolvedExpr,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq)]
pub enum InsertPlanSource {
    Values(Vec<Vec<ResolvedExpr>>),
    Select(Box<PhysicalPlan>),
}

/// A bound operator tree, ready for the executor to pull rows through.
#[derive(Clone, Debug, PartialEq)]
pub enum PhysicalPlan {
    Scan {
        table: Table,
        qualifier: String,
        schema: Schema,
    },
    Filter {
        input: Box<PhysicalPlan>,
        predicate: ResolvedExpr,
        schema: Schema,
    },
    Projection {
        input: Box<PhysicalPlan>,
        items: Vec<ProjectItem>,
        schema: Schema,
    },
    NestedLoopJoin {
        left: Box<PhysicalPlan>,
        right: Box<PhysicalPlan>,
        predicate: ResolvedExpr,
        schema: Schema,
    },
    Aggregate {
        input: Box<PhysicalPlan>,
        group_by: Vec<ResolvedExpr>,
        aggregates: Vec<AggregateSpec>,
        schema: Schema,
    },
    Distinct {
        input: Box<PhysicalPlan>,
        schema: Schema,
    },
    Sort {
        input: Box<PhysicalPlan>,
        keys: Vec<(ResolvedExpr, bool)>,
        schema: Schema,
    },
    Limit {
        input: Box<PhysicalPlan>,
        limit: i64,
        schema: Schema,
    },
    Insert {
        table: Table,
        columns: Option<Vec<String>>,
        source: InsertPlanSource,
    },
    Delete {
        table: Table,
        predicate: Option<ResolvedExpr>,
        schema: Schema,
    },
    /// Used for DDL and transaction-control statements: emits one row
    /// carrying a status string.
    Status(String),
}

impl PhysicalPlan {
    pub fn schema(&self) -> Schema {
        match self {
            PhysicalPlan::Scan { schema, .. }
            | PhysicalPlan::Filter { schema, .. }
            | PhysicalPlan::Projection { schema, .. }
            | PhysicalPlan::NestedLoopJoin { schema, .. }
            | PhysicalPlan::Aggregate { schema, .. }
            | PhysicalPlan::Distinct { schema, .. }
            | PhysicalPlan::Sort { schema, .. }
            | PhysicalPlan::Limit { schema, .. }
            | PhysicalPlan::Delete { schema, .. } => schema.clone(),
            PhysicalPlan::Insert { .. } => vec![ColumnIdentifier::plain("status", None)],
            PhysicalPlan::Status(_) => vec![ColumnIdentifier::plain("status", None)],
        }
    }
}

/// Looks up a table's current metadata and column arity, honoring whatever
/// transaction (if any) a caller is planning against. The planner itself
/// never touches a `Transaction` directly, so callers in `database` pass a
/// closure that consults the transaction's shadow tables before falling back
/// to the committed catalog.
pub type TableLookup<'a> = dyn Fn(&str) -> DbResult<Table> + 'a;

/// Convert a parsed statement into a bound physical plan.
pub fn plan(stmt: &Statement, lookup: &TableLookup) -> DbResult<PhysicalPlan> {
    match stmt {
        Statement::Begin => Ok(PhysicalPlan::Status("transaction started".into())),
        Statement::Commit => Ok(PhysicalPlan::Status("transaction committed".into())),
        Statement::Rollback => Ok(PhysicalPlan::Status("transaction rolled back".into())),
        Statement::CreateTable { name, .. } => {
            Ok(PhysicalPlan::Status(format!("table '{name}' created")))
        }
        Statement::DropTable { name } => Ok(PhysicalPlan::Status(format!("table '{name}' dropped"))),
        Statement::Select(select) => bind_select(select, lookup),
        Statement::Insert { table, columns, source } => {
            let meta = lookup(table)?;
            validate_insert_columns(&meta, columns.as_deref())?;
            let source = match source {
                InsertSource::Values(rows) => {
                    let arity = columns.as_ref().map(|c| c.len()).unwrap_or(meta.arity());
                    let mut bound_rows = Vec::with_capacity(rows.len());
                    for row in rows {
                        if row.len() != arity {
                            return Err(DbError::ValidationError(format!(
                                "expected {arity} values, found {}",
                                row.len()
                            )));
                        }
                        bound_rows.push(
                            row.iter()
                                .map(|e| bind_expr_with_schema(&[], e))
                                .collect::<DbResult<Vec<_>>>()?,
                        );
                    }
                    InsertPlanSource::Values(bound_rows)
                }
                InsertSource::Select(inner) => {
                    InsertPlanSource::Select(Box::new(bind_select(inner, lookup)?))
                }
            };
            Ok(PhysicalPlan::Insert {
                table: meta,
                columns: columns.clone(),
                source,
            })
        }
        Statement::Delete { table, selection } => {
            let meta = lookup(table)?;
            let schema = table_schema(&meta, table);
            let predicate = selection
                .as_ref()
                .map(|e| {
                    reject_aggregate(e)?;
                    bind_expr_with_schema(&schema, e)
                })
                .transpose()?;
            Ok(PhysicalPlan::Delete {
                table: meta,
                predicate,
                schema,
            })
        }
    }
}

fn validate_insert_columns(meta: &Table, columns: Option<&[String]>) -> DbResult<()> {
    let Some(columns) = columns else { return Ok(()) };
    let mut seen = hashbrown::HashSet::new();
    for name in columns {
        if meta.column_index(name).is_none() {
            return Err(DbError::ValidationError(format!(
                "unknown column '{name}' in table '{}'",
                meta.name
            )));
        }
        if !seen.insert(name.to_lowercase()) {
            return Err(DbError::ValidationError(format!("duplicate column '{name}' in INSERT")));
        }
    }
    Ok(())
}

fn table_schema(meta: &Table, qualifier: &str) -> Schema {
    meta.column_names
        .iter()
        .map(|c| ColumnIdentifier::plain(c.clone(), Some(qualifier.to_lowercase())))
        .collect()
}

fn bind_select(select: &SelectStatement, lookup: &TableLookup) -> DbResult<PhysicalPlan> {
    let mut plan = bind_from(&select.from, lookup)?;

    if let Some(pred) = &select.selection {
        reject_aggregate(pred)?;
        let schema = plan.schema();
        let resolved = bind_expr_with_schema(&schema, pred)?;
        plan = PhysicalPlan::Filter {
            input: Box::new(plan),
            predicate: resolved,
            schema,
        };
    }

    let has_aggregate = !select.group_by.is_empty() || select.items.iter().any(|i| contains_aggregate(&i.expr));

    if has_aggregate {
        plan = bind_aggregate(plan, select)?;
    } else {
        let schema = plan.schema();
        let items = bind_select_items(&schema, &select.items)?;
        let out_schema = items
            .iter()
            .map(|i| ColumnIdentifier {
                name: i.name.clone(),
                qualifier: None,
                is_aggregate: false,
            })
            .collect();
        plan = PhysicalPlan::Projection {
            input: Box::new(plan),
            items,
            schema: out_schema,
        };
    }

    if select.distinct {
        let schema = plan.schema();
        plan = PhysicalPlan::Distinct {
            input: Box::new(plan),
            schema,
        };
    }

    if !select.order_by.is_empty() {
        let schema = plan.schema();
        let keys = bind_order_by(&schema, &select.order_by)?;
        plan = PhysicalPlan::Sort {
            input: Box::new(plan),
            keys,
            schema,
        };
    }

    if let Some(limit) = select.limit {
        let schema = plan.schema();
        plan = PhysicalPlan::Limit {
            input: Box::new(plan),
            limit,
            schema,
        };
    }

    Ok(plan)
}

fn bind_from(from: &FromClause, lookup: &TableLookup) -> DbResult<PhysicalPlan> {
    match from {
        FromClause::Table(t) => {
            let meta = lookup(&t.name)?;
            let qualifier = t.alias.clone().unwrap_or_else(|| t.name.clone());
            let schema = table_schema(&meta, &qualifier);
            Ok(PhysicalPlan::Scan {
                table: meta,
                qualifier,
                schema,
            })
        }
        FromClause::Join { left, right, on } => {
            let left_plan = bind_from(left, lookup)?;
            let meta = lookup(&right.name)?;
            let qualifier = right.alias.clone().unwrap_or_else(|| right.name.clone());
            let right_schema = table_schema(&meta, &qualifier);
            let right_plan = PhysicalPlan::Scan {
                table: meta,
                qualifier,
                schema: right_schema.clone(),
            };

            let mut combined = left_plan.schema();
            combined.extend(right_schema);

            reject_aggregate(on)?;
            let predicate = bind_expr_with_schema(&combined, on)?;

            Ok(PhysicalPlan::NestedLoopJoin {
                left: Box::new(left_plan),
                right: Box::new(right_plan),
                predicate,
                schema: combined,
            })
        }
    }
}

fn bind_select_items(schema: &Schema, items: &[parser::SelectItem]) -> DbResult<Vec<ProjectItem>> {
    let mut out = Vec::new();
    for item in items {
        if matches!(item.expr, Expr::Star) {
            for (idx, col) in schema.iter().enumerate() {
                out.push(ProjectItem {
                    expr: ResolvedExpr::Column(idx as ColumnId),
                    name: col.name.clone(),
                });
            }
            continue;
        }
        let resolved = bind_expr_with_schema(schema, &item.expr)?;
        let name = item
            .alias
            .clone()
            .unwrap_or_else(|| item.expr.to_string());
        out.push(ProjectItem { expr: resolved, name });
    }
    Ok(out)
}

/// Builds the Aggregate operator plus a reordering Projection so the final
/// schema matches the select list's own order (the Aggregate operator's
/// native schema is always `[group cols] ++ [aggregate outputs]`).
fn bind_aggregate(input: PhysicalPlan, select: &SelectStatement) -> DbResult<PhysicalPlan> {
    let input_schema = input.schema();

    let group_by = select
        .group_by
        .iter()
        .map(|e| {
            reject_aggregate(e)?;
            bind_expr_with_schema(&input_schema, e)
        })
        .collect::<DbResult<Vec<_>>>()?;

    let mut aggregates: Vec<AggregateSpec> = Vec::new();
    let mut agg_names: Vec<String> = Vec::new();

    // first-encounter order across the select list
    for item in &select.items {
        collect_aggregates(&item.expr, &input_schema, &mut aggregates, &mut agg_names)?;
    }

    let mut agg_schema: Schema = select
        .group_by
        .iter()
        .map(|e| ColumnIdentifier {
            name: e.to_string(),
            qualifier: None,
            is_aggregate: false,
        })
        .collect();
    agg_schema.extend(aggregates.iter().map(|a| ColumnIdentifier {
        name: a.output_name.clone(),
        qualifier: None,
        is_aggregate: true,
    }));

    let aggregate_plan = PhysicalPlan::Aggregate {
        input: Box::new(input),
        group_by,
        aggregates,
        schema: agg_schema.clone(),
    };

    // Reorder/alias to match the select list. Every non-aggregate select
    // item must be exactly one of the GROUP BY expressions.
    let mut items = Vec::new();
    for item in &select.items {
        let lookup_name = canonical_name(&item.expr);
        let idx = agg_schema
            .iter()
            .position(|c| c.name == lookup_name)
            .ok_or_else(|| {
                DbError::ValidationError(format!(
                    "'{lookup_name}' must appear in GROUP BY or be an aggregate function"
                ))
            })?;
        let name = item.alias.clone().unwrap_or(lookup_name);
        items.push(ProjectItem {
            expr: ResolvedExpr::Column(idx as ColumnId),
            name,
        });
    }

    let out_schema = items
        .iter()
        .map(|i| ColumnIdentifier::plain(i.name.clone(), None))
        .collect();

    Ok(PhysicalPlan::Projection {
        input: Box::new(aggregate_plan),
        items,
        schema: out_schema,
    })
}

/// The name an expression is addressable by in an aggregate's output
/// schema: the expression's own canonical text for plain columns, or
/// `FUNC(ARG)` / `FUNC(DISTINCT ARG)` / `FUNC(*)` for aggregate calls.
fn canonical_name(e: &Expr) -> String {
    e.to_string()
}

fn collect_aggregates(
    e: &Expr,
    schema: &Schema,
    out: &mut Vec<AggregateSpec>,
    seen_names: &mut Vec<String>,
) -> DbResult<()> {
    if let Expr::Aggregate { func, arg, distinct } = e {
        let name = canonical_name(e);
        if seen_names.contains(&name) {
            return Ok(());
        }
        let bound_arg = if matches!(**arg, Expr::Star) {
            if *func != AggregateFunc::Count {
                return Err(DbError::ValidationError(format!(
                    "{} does not accept '*'",
                    func.name()
                )));
            }
            None
        } else {
            Some(bind_expr_with_schema(schema, arg)?)
        };
        seen_names.push(name.clone());
        out.push(AggregateSpec {
            func: *func,
            arg: bound_arg,
            distinct: *distinct,
            output_name: name,
        });
    }
    Ok(())
}

fn bind_order_by(schema: &Schema, items: &[SortItem]) -> DbResult<Vec<(ResolvedExpr, bool)>> {
    items
        .iter()
        .map(|item| {
            reject_aggregate(&item.expr)?;
            Ok((bind_expr_with_schema(schema, &item.expr)?, item.descending))
        })
        .collect()
}

fn contains_aggregate(e: &Expr) -> bool {
    match e {
        Expr::Aggregate { .. } => true,
        Expr::Unary { expr, .. } => contains_aggregate(expr),
        Expr::Binary { left, right, .. } => contains_aggregate(left) || contains_aggregate(right),
        _ => false,
    }
}

/// WHERE/JOIN-ON/GROUP BY predicates may never themselves contain an
/// aggregate call; only the select list and ORDER BY may.
fn reject_aggregate(e: &Expr) -> DbResult<()> {
    if contains_aggregate(e) {
        return Err(DbError::ValidationError(
            "aggregate functions are not allowed here".into(),
        ));
    }
    Ok(())
}

fn bind_expr_with_schema(schema: &Schema, e: &Expr) -> DbResult<ResolvedExpr> {
    match e {
        Expr::Literal(v) => Ok(ResolvedExpr::Literal(v.clone())),
        Expr::Star => Err(DbError::ValidationError("'*' is not valid in this position".into())),
        Expr::Column { qualifier, name } => {
            let idx = resolve(schema, qualifier.as_deref(), name)?;
            Ok(ResolvedExpr::Column(idx as ColumnId))
        }
        Expr::Unary { op, expr: inner } => Ok(ResolvedExpr::Unary {
            op: *op,
            expr: Box::new(bind_expr_with_schema(schema, inner)?),
        }),
        Expr::Binary { left, op, right } => Ok(ResolvedExpr::Binary {
            left: Box::new(bind_expr_with_schema(schema, left)?),
            op: *op,
            right: Box::new(bind_expr_with_schema(schema, right)?),
        }),
        Expr::Aggregate { .. } => Err(DbError::ValidationError(
            "aggregate functions are not allowed here".into(),
        )),
    }
}

/// Resolve `(qualifier?, name)` against `schema`:
/// 1. Qualified: unique match on `(qualifier, name)`.
/// 2. Unqualified: unique match on `name`.
/// 3. Zero matches -> `UnknownColumn`; two or more -> `AmbiguousColumn`.
fn resolve(schema: &Schema, qualifier: Option<&str>, name: &str) -> DbResult<usize> {
    if let Some(q) = qualifier {
        let matches: Vec<usize> = schema
            .iter()
            .enumerate()
            .filter(|(_, c)| {
                c.qualifier.as_deref().is_some_and(|cq| cq.eq_ignore_ascii_case(q)) && c.name.eq_ignore_ascii_case(name)
            })
            .map(|(i, _)| i)
            .collect();
        return pick(matches, name);
    }

    let matches: Vec<usize> = schema
        .iter()
        .enumerate()
        .filter(|(_, c)| c.name.eq_ignore_ascii_case(name))
        .map(|(i, _)| i)
        .collect();
    pick(matches, name)
}

fn pick(matches: Vec<usize>, name: &str) -> DbResult<usize> {
    match matches.len() {
        0 => Err(DbError::UnknownColumn(name.to_string())),
        1 => Ok(matches[0]),
        _ => Err(DbError::AmbiguousColumn {
            name: name.to_string(),
            candidates: matches.iter().map(|i| i.to_string()).collect(),
        }),
    }
}
