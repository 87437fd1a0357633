use expr::{BinaryOp, UnaryOp};
use std::fmt;
use types::{SqlType, Value};

/// A parsed expression, still unbound to any schema. Column references carry
/// an optional qualifier and are resolved against a schema by the planner.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Literal(Value),
    Column {
        qualifier: Option<String>,
        name: String,
    },
    /// The bare `*`, valid only as a select item or as `COUNT(*)`'s argument.
    Star,
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },
    Aggregate {
        func: AggregateFunc,
        arg: Box<Expr>,
        distinct: bool,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AggregateFunc {
    Count,
    Sum,
    Min,
    Max,
    Avg,
}

impl AggregateFunc {
    pub fn name(self) -> &'static str {
        match self {
            AggregateFunc::Count => "COUNT",
            AggregateFunc::Sum => "SUM",
            AggregateFunc::Min => "MIN",
            AggregateFunc::Max => "MAX",
            AggregateFunc::Avg => "AVG",
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(v) => write!(f, "{}", common::pretty::format_value(v)),
            Expr::Column {
                qualifier: Some(q),
                name,
            } => write!(f, "{q}.{name}"),
            Expr::Column { qualifier: None, name } => write!(f, "{name}"),
            Expr::Star => write!(f, "*"),
            Expr::Unary { op, expr } => match op {
                UnaryOp::Not => write!(f, "NOT {expr}"),
                UnaryOp::Neg => write!(f, "-{expr}"),
            },
            Expr::Binary { left, op, right } => write!(f, "{left} {} {right}", op_symbol(*op)),
            Expr::Aggregate { func, arg, distinct } => {
                let prefix = if *distinct { "DISTINCT " } else { "" };
                write!(f, "{}({prefix}{arg})", func.name())
            }
        }
    }
}

fn op_symbol(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Eq => "=",
        BinaryOp::Ne => "!=",
        BinaryOp::Lt => "<",
        BinaryOp::Le => "<=",
        BinaryOp::Gt => ">",
        BinaryOp::Ge => ">=",
        BinaryOp::And => "AND",
        BinaryOp::Or => "OR",
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Mul => "*",
        BinaryOp::Div => "/",
        BinaryOp::Mod => "%",
    }
}

/// A single item of a `SELECT` list: `expr [AS alias]`.
#[derive(Clone, Debug, PartialEq)]
pub struct SelectItem {
    pub expr: Expr,
    pub alias: Option<String>,
}

impl fmt::Display for SelectItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expr)?;
        if let Some(alias) = &self.alias {
            write!(f, " AS {alias}")?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TableRef {
    pub name: String,
    pub alias: Option<String>,
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(alias) = &self.alias {
            write!(f, " AS {alias}")?;
        }
        Ok(())
    }
}

/// Left-associative chain of tables: a base table followed by zero or more
/// `JOIN table ON expr` clauses.
#[derive(Clone, Debug, PartialEq)]
pub enum FromClause {
    Table(TableRef),
    Join {
        left: Box<FromClause>,
        right: TableRef,
        on: Expr,
    },
}

impl fmt::Display for FromClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FromClause::Table(t) => write!(f, "{t}"),
            FromClause::Join { left, right, on } => write!(f, "{left} JOIN {right} ON {on}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SortItem {
    pub expr: Expr,
    pub descending: bool,
}

impl fmt::Display for SortItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.expr, if self.descending { "DESC" } else { "ASC" })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SelectStatement {
    pub distinct: bool,
    pub items: Vec<SelectItem>,
    pub from: FromClause,
    pub selection: Option<Expr>,
    pub group_by: Vec<Expr>,
    pub order_by: Vec<SortItem>,
    pub limit: Option<i64>,
}

impl fmt::Display for SelectStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SELECT ")?;
        if self.distinct {
            write!(f, "DISTINCT ")?;
        }
        let items: Vec<String> = self.items.iter().map(|i| i.to_string()).collect();
        write!(f, "{} FROM {}", items.join(", "), self.from)?;
        if let Some(sel) = &self.selection {
            write!(f, " WHERE {sel}")?;
        }
        if !self.group_by.is_empty() {
            let cols: Vec<String> = self.group_by.iter().map(|c| c.to_string()).collect();
            write!(f, " GROUP BY {}", cols.join(", "))?;
        }
        if !self.order_by.is_empty() {
            let items: Vec<String> = self.order_by.iter().map(|i| i.to_string()).collect();
            write!(f, " ORDER BY {}", items.join(", "))?;
        }
        if let Some(limit) = self.limit {
            write!(f, " LIMIT {limit}")?;
        }
        write!(f, ";")
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    pub ty: SqlType,
}

#[derive(Clone, Debug, PartialEq)]
pub enum InsertSource {
    Values(Vec<Vec<Expr>>),
    Select(Box<SelectStatement>),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Statement {
    Begin,
    Commit,
    Rollback,
    CreateTable {
        name: String,
        columns: Vec<ColumnDef>,
    },
    DropTable {
        name: String,
    },
    Insert {
        table: String,
        columns: Option<Vec<String>>,
        source: InsertSource,
    },
    Delete {
        table: String,
        selection: Option<Expr>,
    },
    Select(SelectStatement),
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Begin => write!(f, "BEGIN TRANSACTION;"),
            Statement::Commit => write!(f, "COMMIT;"),
            Statement::Rollback => write!(f, "ROLLBACK;"),
            Statement::CreateTable { name, columns } => {
                let cols: Vec<String> = columns.iter().map(|c| format!("{} {}", c.name, c.ty)).collect();
                write!(f, "CREATE TABLE {name} ({});", cols.join(", "))
            }
            Statement::DropTable { name } => write!(f, "DROP TABLE {name};"),
            Statement::Insert { table, columns, source } => {
                write!(f, "INSERT INTO {table} ")?;
                if let Some(cols) = columns {
                    write!(f, "({}) ", cols.join(", "))?;
                }
                match source {
                    InsertSource::Values(rows) => {
                        let rendered: Vec<String> = rows
                            .iter()
                            .map(|row| {
                                let vals: Vec<String> = row.iter().map(|e| e.to_string()).collect();
                                format!("({})", vals.join(", "))
                            })
                            .collect();
                        write!(f, "VALUES {};", rendered.join(", "))
                    }
                    InsertSource::Select(select) => write!(f, "{select}"),
                }
            }
            Statement::Delete { table, selection } => {
                write!(f, "DELETE FROM {table}")?;
                if let Some(sel) = selection {
                    write!(f, " WHERE {sel}")?;
                }
                write!(f, ";")
            }
            Statement::Select(select) => write!(f, "{select}"),
        }
    }
}
