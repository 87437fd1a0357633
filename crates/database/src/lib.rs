//! The database engine facade: opens a file-backed database, tracks open
//! transactions, and dispatches one SQL statement per call through the
//! parser, planner, and executor.
//!
//! Unlike a server, [`Engine`] is synchronous and single-threaded: one
//! request runs to completion, including any page I/O, before the next is
//! accepted. There is no async runtime, no replication, and no locking
//! beyond what an exclusive `&mut Engine` already gives the caller.

use anyhow::{Context, Result};
use buffer::BufferPool;
use catalog::{Catalog, Table};
use common::{DbError, DbResult, Row, TxnId, CATALOG_PAGE_ID, NO_TXN};
use parser::Statement;
use std::collections::HashMap;
use std::path::Path;
use txn::Transaction;
use types::Value;

/// One SQL statement to run, optionally against an already-open transaction.
#[derive(Clone, Debug)]
pub struct QueryRequest {
    pub sql: String,
    /// [`common::NO_TXN`] when the caller has no transaction of its own open.
    pub transaction_id: TxnId,
    /// Whether a statement running outside an explicit transaction should be
    /// wrapped in an anonymous transaction that commits before the request
    /// returns.
    pub auto_commit: bool,
}

impl QueryRequest {
    /// A one-shot statement, auto-committed if it needs a transaction at all.
    pub fn new(sql: impl Into<String>) -> Self {
        Self { sql: sql.into(), transaction_id: NO_TXN, auto_commit: true }
    }

    /// A statement that runs under a transaction the caller already opened.
    pub fn within_transaction(sql: impl Into<String>, transaction_id: TxnId) -> Self {
        Self { sql: sql.into(), transaction_id, auto_commit: true }
    }
}

/// Whether the transaction a request ran under is still open after it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransactionStatus {
    Open,
    Closed,
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            TransactionStatus::Open => "OPEN",
            TransactionStatus::Closed => "CLOSED",
        })
    }
}

/// Everything a caller needs to report a statement's outcome: the result set
/// (or the `("status",)`/`("Error",)` sentinel on failure), parse
/// diagnostics, and the transaction this request ran under.
#[derive(Clone, Debug)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
    pub sql: String,
    pub tokens: String,
    pub ast: String,
    pub query_plan: String,
    pub rowcount: Option<usize>,
    pub error: Option<String>,
    pub transaction_id: TxnId,
    pub transaction_status: TransactionStatus,
}

/// A synchronous SQL engine over a single flat file.
pub struct Engine {
    catalog: Catalog,
    pool: BufferPool,
    transactions: HashMap<TxnId, Transaction>,
    next_txn_id: TxnId,
}

impl Engine {
    /// Open (or create) the database file described by `config`.
    pub fn open(config: &common::Config) -> Result<Self> {
        if config.page_size != storage::PAGE_SIZE {
            anyhow::bail!(
                "page_size {} does not match the compile-time page size {}",
                config.page_size,
                storage::PAGE_SIZE
            );
        }

        let (mut pool, is_new) = BufferPool::open(&config.path, config.buffer_pool_pages)
            .with_context(|| format!("opening database file {}", config.path.display()))?;

        let catalog = if is_new {
            let catalog = Catalog::empty();
            let page = catalog.to_page().context("encoding the initial catalog page")?;
            pool.put(page).context("writing the initial catalog page")?;
            pool.flush().context("flushing the initial catalog page")?;
            catalog
        } else {
            let page = pool.get_page(CATALOG_PAGE_ID).context("reading the catalog page")?;
            Catalog::from_page(&page).context("decoding the catalog page")?
        };

        Ok(Self { catalog, pool, transactions: HashMap::new(), next_txn_id: 1 })
    }

    /// Open the database file at `path` with default page/buffer settings.
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::open(&common::Config::builder().path(path.as_ref().to_path_buf()).build())
    }

    /// Flush every dirty page, then rewrite the catalog page, so a caller
    /// that checkpoints before shutting down sees a consistent file on the
    /// next `open` even after a crash between individual page writes.
    pub fn checkpoint(&mut self) -> DbResult<()> {
        self.pool.flush()?;
        let page = self.catalog.to_page()?;
        self.pool.put(page)?;
        self.pool.flush()
    }

    /// How many transactions are currently open (anonymous ones included).
    pub fn open_transaction_count(&self) -> usize {
        self.transactions.len()
    }

    /// Run one SQL statement and report its outcome. Never panics and never
    /// propagates a `DbError`: any failure is captured in the returned
    /// `QueryResult::error` instead.
    pub fn execute(&mut self, request: QueryRequest) -> QueryResult {
        let sql = ensure_trailing_semicolon(&request.sql);

        let tokens = match parser::tokenize(&sql) {
            Ok(tokens) => parser::render_tokens(&tokens),
            Err(e) => {
                let status = self.status_of(request.transaction_id);
                return error_result(sql, String::new(), String::new(), String::new(), request.transaction_id, status, e);
            }
        };

        let stmt = match parser::parse_statement(&sql) {
            Ok(stmt) => stmt,
            Err(e) => {
                let status = self.status_of(request.transaction_id);
                return error_result(sql, tokens, String::new(), String::new(), request.transaction_id, status, e);
            }
        };
        let ast = stmt.to_string();

        if matches!(stmt, Statement::Begin) && request.transaction_id != NO_TXN {
            let err = DbError::TransactionMisuse("BEGIN cannot be issued against an existing transaction".into());
            let status = self.status_of(request.transaction_id);
            return error_result(sql, tokens, ast, String::new(), request.transaction_id, status, err);
        }
        if matches!(stmt, Statement::Commit | Statement::Rollback) && request.transaction_id == NO_TXN {
            let err = DbError::TransactionMisuse("COMMIT/ROLLBACK requires an open transaction id".into());
            return error_result(sql, tokens, ast, String::new(), NO_TXN, TransactionStatus::Closed, err);
        }

        if matches!(stmt, Statement::Begin) {
            let id = self.next_txn_id;
            self.next_txn_id += 1;
            self.transactions.insert(id, Transaction::new(id));
            return success_result(
                sql,
                tokens,
                ast,
                String::new(),
                vec!["status".into()],
                vec![Row::new(vec![Value::Text("transaction started".into())])],
                id,
                TransactionStatus::Open,
            );
        }

        let (txn_id, anonymous) = match self.resolve_transaction(request.transaction_id, request.auto_commit) {
            Ok(resolved) => resolved,
            Err(e) => {
                let status = self.status_of(request.transaction_id);
                return error_result(sql, tokens, ast, String::new(), request.transaction_id, status, e);
            }
        };

        if matches!(stmt, Statement::Commit | Statement::Rollback) {
            let message = if matches!(stmt, Statement::Commit) {
                self.transactions.get_mut(&txn_id).expect("just resolved").commit(&mut self.catalog)
            } else {
                self.transactions.get_mut(&txn_id).expect("just resolved").rollback(&mut self.catalog);
                Ok(())
            };
            return match message {
                Ok(()) => {
                    self.transactions.remove(&txn_id);
                    let text = if matches!(stmt, Statement::Commit) {
                        "transaction committed"
                    } else {
                        "transaction rolled back"
                    };
                    success_result(
                        sql,
                        tokens,
                        ast,
                        String::new(),
                        vec!["status".into()],
                        vec![Row::new(vec![Value::Text(text.into())])],
                        txn_id,
                        TransactionStatus::Closed,
                    )
                }
                Err(e) => error_result(sql, tokens, ast, String::new(), txn_id, TransactionStatus::Open, e),
            };
        }

        match self.run(&stmt, txn_id) {
            Ok((query_plan, output)) => {
                if anonymous {
                    self.transactions.get_mut(&txn_id).expect("anonymous txn").commit(&mut self.catalog).ok();
                    self.transactions.remove(&txn_id);
                }
                let (reported_id, status) = if anonymous {
                    (NO_TXN, TransactionStatus::Closed)
                } else {
                    (txn_id, TransactionStatus::Open)
                };
                success_result(sql, tokens, ast, query_plan, output.columns, output.rows, reported_id, status)
            }
            Err(e) => {
                let should_rollback = e.should_rollback();
                if anonymous || should_rollback {
                    if let Some(mut txn) = self.transactions.remove(&txn_id) {
                        if should_rollback {
                            txn.rollback(&mut self.catalog);
                        } else {
                            txn.commit(&mut self.catalog).ok();
                        }
                    }
                }
                let (reported_id, status) = if anonymous || should_rollback {
                    (NO_TXN, TransactionStatus::Closed)
                } else {
                    (txn_id, TransactionStatus::Open)
                };
                error_result(sql, tokens, ast, String::new(), reported_id, status, e)
            }
        }
    }

    /// Resolves which transaction a (non-control) statement runs under, and
    /// whether the engine opened it anonymously just for this request. An
    /// anonymous transaction is pinned to [`common::NO_TXN`]'s id internally:
    /// at most one may be in flight at a time.
    fn resolve_transaction(&mut self, transaction_id: TxnId, auto_commit: bool) -> DbResult<(TxnId, bool)> {
        if transaction_id != NO_TXN {
            if !self.transactions.contains_key(&transaction_id) {
                return Err(DbError::TransactionMisuse(format!("no open transaction with id {transaction_id}")));
            }
            return Ok((transaction_id, false));
        }

        if auto_commit {
            if self.transactions.contains_key(&NO_TXN) {
                return Err(DbError::TransactionMisuse(
                    "an anonymous auto-commit transaction is already open".into(),
                ));
            }
            self.transactions.insert(NO_TXN, Transaction::new(NO_TXN));
            return Ok((NO_TXN, true));
        }

        let id = self.next_txn_id;
        self.next_txn_id += 1;
        self.transactions.insert(id, Transaction::new(id));
        Ok((id, false))
    }

    fn status_of(&self, transaction_id: TxnId) -> TransactionStatus {
        if transaction_id != NO_TXN && self.transactions.contains_key(&transaction_id) {
            TransactionStatus::Open
        } else {
            TransactionStatus::Closed
        }
    }

    /// Runs a CREATE TABLE/DROP TABLE/INSERT/DELETE/SELECT statement under
    /// an already-resolved transaction: mutates the catalog directly for
    /// DDL, then binds and executes a physical plan for everything else.
    fn run(&mut self, stmt: &Statement, txn_id: TxnId) -> DbResult<(String, executor::ExecutionOutput)> {
        match stmt {
            Statement::CreateTable { name, columns } => {
                let table = Table::new(
                    name.clone(),
                    columns.iter().map(|c| c.name.clone()).collect(),
                    columns.iter().map(|c| c.ty).collect(),
                );
                let Engine { catalog, transactions, .. } = self;
                transactions.get_mut(&txn_id).expect("resolved by caller").create_table(catalog, table)?;
            }
            Statement::DropTable { name } => {
                let Engine { catalog, transactions, .. } = self;
                transactions.get_mut(&txn_id).expect("resolved by caller").drop_table(catalog, name)?;
            }
            _ => {}
        }

        let plan = {
            let txn = self.transactions.get(&txn_id).expect("resolved by caller");
            let lookup = |name: &str| txn.resolve_table(&self.catalog, name);
            planner::plan(stmt, &lookup)?
        };
        let query_plan = format!("{plan:?}");

        let Engine { catalog, pool, transactions, .. } = self;
        let txn = transactions.get_mut(&txn_id).expect("resolved by caller");
        let mut ctx = executor::ExecutionContext { catalog, pool, txn };
        let output = executor::execute(plan, &mut ctx)?;

        Ok((query_plan, output))
    }
}

fn ensure_trailing_semicolon(sql: &str) -> String {
    let trimmed = sql.trim_end();
    if trimmed.ends_with(';') {
        trimmed.to_string()
    } else {
        format!("{trimmed};")
    }
}

fn success_result(
    sql: String,
    tokens: String,
    ast: String,
    query_plan: String,
    columns: Vec<String>,
    rows: Vec<Row>,
    transaction_id: TxnId,
    transaction_status: TransactionStatus,
) -> QueryResult {
    let rowcount = Some(rows.len());
    QueryResult {
        columns,
        rows,
        sql,
        tokens,
        ast,
        query_plan,
        rowcount,
        error: None,
        transaction_id,
        transaction_status,
    }
}

fn error_result(
    sql: String,
    tokens: String,
    ast: String,
    query_plan: String,
    transaction_id: TxnId,
    transaction_status: TransactionStatus,
    err: DbError,
) -> QueryResult {
    QueryResult {
        columns: vec!["status".into()],
        rows: vec![Row::new(vec![Value::Text("Error".into())])],
        sql,
        tokens,
        ast,
        query_plan,
        rowcount: None,
        error: Some(err.to_string()),
        transaction_id,
        transaction_status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn test_engine() -> (Engine, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        (Engine::open_path(&path).unwrap(), dir)
    }

    #[test]
    fn create_table_then_insert_then_select_round_trips_auto_committed() {
        let (mut engine, _dir) = test_engine();

        let created = engine.execute(QueryRequest::new("CREATE TABLE t (id INT, name TEXT)"));
        assert_eq!(created.error, None);
        assert_eq!(created.transaction_status, TransactionStatus::Closed);

        let inserted = engine.execute(QueryRequest::new("INSERT INTO t (id, name) VALUES (1, 'ada')"));
        assert_eq!(inserted.error, None);
        assert_eq!(inserted.rows[0].values, vec![Value::Text("1 row(s) inserted".into())]);

        let selected = engine.execute(QueryRequest::new("SELECT id, name FROM t"));
        assert_eq!(selected.error, None);
        assert_eq!(selected.columns, vec!["id", "name"]);
        assert_eq!(selected.rows.len(), 1);
        assert_eq!(selected.rows[0].values, vec![Value::Int(1), Value::Text("ada".into())]);
    }

    #[test]
    fn explicit_transaction_is_visible_to_itself_before_commit() {
        let (mut engine, _dir) = test_engine();
        engine.execute(QueryRequest::new("CREATE TABLE t (id INT)"));

        let begin = engine.execute(QueryRequest::new("BEGIN"));
        assert_eq!(begin.transaction_status, TransactionStatus::Open);
        let txn_id = begin.transaction_id;

        let insert = engine.execute(QueryRequest {
            sql: "INSERT INTO t (id) VALUES (1)".into(),
            transaction_id: txn_id,
            auto_commit: true,
        });
        assert_eq!(insert.error, None);
        assert_eq!(insert.transaction_status, TransactionStatus::Open);

        let select = engine.execute(QueryRequest {
            sql: "SELECT id FROM t".into(),
            transaction_id: txn_id,
            auto_commit: true,
        });
        assert_eq!(select.rows.len(), 1);

        let commit = engine.execute(QueryRequest::within_transaction("COMMIT", txn_id));
        assert_eq!(commit.error, None);
        assert_eq!(commit.transaction_status, TransactionStatus::Closed);
        assert_eq!(engine.open_transaction_count(), 0);
    }

    #[test]
    fn rollback_discards_every_mutation_made_under_the_transaction() {
        let (mut engine, _dir) = test_engine();
        engine.execute(QueryRequest::new("CREATE TABLE t (id INT)"));
        engine.execute(QueryRequest::new("INSERT INTO t (id) VALUES (1)"));

        let begin = engine.execute(QueryRequest::new("BEGIN"));
        let txn_id = begin.transaction_id;
        engine.execute(QueryRequest::within_transaction("INSERT INTO t (id) VALUES (2)", txn_id));
        let rollback = engine.execute(QueryRequest::within_transaction("ROLLBACK", txn_id));
        assert_eq!(rollback.error, None);

        let select = engine.execute(QueryRequest::new("SELECT id FROM t"));
        assert_eq!(select.rows.len(), 1);
        assert_eq!(select.rows[0].values, vec![Value::Int(1)]);
    }

    #[test]
    fn begin_against_an_existing_transaction_id_is_rejected() {
        let (mut engine, _dir) = test_engine();
        let begin = engine.execute(QueryRequest::new("BEGIN"));
        let txn_id = begin.transaction_id;

        let second = engine.execute(QueryRequest::within_transaction("BEGIN", txn_id));
        assert!(second.error.is_some());
    }

    #[test]
    fn commit_without_a_transaction_id_is_rejected() {
        let (mut engine, _dir) = test_engine();
        let commit = engine.execute(QueryRequest::new("COMMIT"));
        assert!(commit.error.is_some());
        assert_eq!(commit.columns, vec!["status"]);
        assert_eq!(commit.rows[0].values, vec![Value::Text("Error".into())]);
    }

    #[test]
    fn selecting_an_unknown_table_reports_an_error_without_panicking() {
        let (mut engine, _dir) = test_engine();
        let result = engine.execute(QueryRequest::new("SELECT * FROM ghost"));
        assert!(result.error.is_some());
        assert_eq!(result.transaction_status, TransactionStatus::Closed);
    }

    #[test]
    fn checkpoint_preserves_catalog_state_across_a_fresh_engine_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");

        let mut engine = Engine::open_path(&path).unwrap();
        engine.execute(QueryRequest::new("CREATE TABLE t (id INT)"));
        engine.execute(QueryRequest::new("INSERT INTO t (id) VALUES (1)"));
        engine.checkpoint().unwrap();
        drop(engine);

        let mut reopened = Engine::open_path(&path).unwrap();
        let select = reopened.execute(QueryRequest::new("SELECT id FROM t"));
        assert_eq!(select.error, None);
        assert_eq!(select.rows[0].values, vec![Value::Int(1)]);
    }
}
