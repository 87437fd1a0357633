//! In-memory-backed fixture for executor unit tests: a throwaway database
//! file with a single live transaction, recreated after every mutating call
//! so each operator test sees committed state.

use crate::ExecutionContext;
use buffer::BufferPool;
use catalog::{Catalog, Table};
use common::{Row, TxnId};
use planner::{ColumnIdentifier, Schema};
use txn::Transaction;
use types::{SqlType, Value};

const TEST_TXN_ID: TxnId = 1;

pub struct TestDb {
    catalog: Catalog,
    pool: BufferPool,
    txn: Transaction,
    _tempdir: tempfile::TempDir,
}

impl TestDb {
    pub fn new() -> Self {
        let tempdir = tempfile::tempdir().expect("create tempdir for test db");
        let path = tempdir.path().join("test.db");
        let (pool, _is_new) = BufferPool::open(&path, 16).expect("open buffer pool");
        Self {
            catalog: Catalog::empty(),
            pool,
            txn: Transaction::new(TEST_TXN_ID),
            _tempdir: tempdir,
        }
    }

    pub fn create_table(&mut self, name: &str, columns: &[(&str, SqlType)]) {
        let table = Table::new(
            name.to_string(),
            columns.iter().map(|(n, _)| n.to_string()).collect(),
            columns.iter().map(|(_, t)| *t).collect(),
        );
        self.txn.create_table(&self.catalog, table).expect("create table");
        self.txn.commit(&mut self.catalog).expect("commit create table");
        self.txn = Transaction::new(TEST_TXN_ID);
    }

    /// Allocates one brand-new page per call, so repeated calls exercise
    /// scans across page boundaries rather than accumulating onto one page.
    pub fn insert_values(&mut self, table: &str, rows: Vec<Vec<Value>>) {
        let page_id = self
            .txn
            .allocate_page(&mut self.catalog, &mut self.pool, table)
            .expect("allocate page");
        let rows: Vec<Row> = rows.into_iter().map(Row::new).collect();
        self.txn.write_page(&mut self.pool, page_id, &rows).expect("write page");
        self.txn.commit(&mut self.catalog).expect("commit insert");
        self.txn = Transaction::new(TEST_TXN_ID);
    }

    pub fn table(&self, name: &str) -> Table {
        self.catalog.get_table_by_name(name).expect("table exists").clone()
    }

    pub fn ctx(&mut self) -> ExecutionContext<'_> {
        ExecutionContext {
            catalog: &mut self.catalog,
            pool: &mut self.pool,
            txn: &mut self.txn,
        }
    }
}

impl Default for TestDb {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds the unqualified-output schema for a scan of `table`, as the
/// planner would resolve `qualifier.*` against it.
pub fn table_schema(table: &Table, qualifier: &str) -> Schema {
    table
        .column_names
        .iter()
        .map(|name| ColumnIdentifier {
            name: name.clone(),
            qualifier: Some(qualifier.to_string()),
            is_aggregate: false,
        })
        .collect()
}
