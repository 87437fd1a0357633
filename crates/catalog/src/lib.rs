//! Table metadata and page-id allocation, persisted as the database's own
//! page 0 rather than as a side file.
//!
//! The catalog is the only authority that mints and recycles page ids; every
//! allocation is tagged with the requesting transaction so a rollback can
//! hand the ids straight back to the free list.


use bincode::config::{self, Config as BincodeConfig};
use bincode::serde::{decode_from_slice, encode_to_vec};
use common::{DbError, DbResult, PageId, TxnId, CATALOG_PAGE_ID};
use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};
use storage::Page;
use types::SqlType;

fn bincode_config() -> impl BincodeConfig {
    config::legacy()
}

/// Schema and page list for one table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub column_names: Vec<String>,
    pub column_types: Vec<SqlType>,
    pub page_ids: Vec<PageId>,
}

impl Table {
    pub fn new(name: String, column_names: Vec<String>, column_types: Vec<SqlType>) -> Self {
        Self {
            name,
            column_names,
            column_types,
            page_ids: Vec::new(),
        }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.column_names.iter().position(|c| c == name)
    }

    pub fn arity(&self) -> usize {
        self.column_names.len()
    }
}

/// System metadata: table schemas plus the page-id allocator, itself
/// persisted as page 0.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Catalog {
    tables: HashMap<String, Table>,
    free_page_ids: HashSet<PageId>,
    max_page_id: i32,
    borrowed_page_ids: HashMap<TxnId, Vec<PageId>>,
}

impl Catalog {
    /// An empty catalog: no tables, no free pages, page 0 already accounted for.
    pub fn empty() -> Self {
        Self {
            tables: HashMap::new(),
            free_page_ids: HashSet::new(),
            max_page_id: CATALOG_PAGE_ID.0,
            borrowed_page_ids: HashMap::new(),
        }
    }

    pub fn get_table_by_name(&self, name: &str) -> DbResult<&Table> {
        self.tables
            .get(&name.to_lowercase())
            .ok_or_else(|| DbError::ValidationError(format!("unknown table '{name}'")))
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.tables.contains_key(&name.to_lowercase())
    }

    pub fn add_new_table(&mut self, table: Table) -> DbResult<()> {
        let key = table.name.to_lowercase();
        if self.tables.contains_key(&key) {
            return Err(DbError::ValidationError(format!(
                "table '{key}' already exists"
            )));
        }
        self.tables.insert(key, table);
        Ok(())
    }

    pub fn drop_table_by_name(&mut self, name: &str) -> DbResult<()> {
        let key = name.to_lowercase();
        let table = self
            .tables
            .remove(&key)
            .ok_or_else(|| DbError::ValidationError(format!("unknown table '{name}'")))?;
        self.return_page_ids(table.page_ids);
        Ok(())
    }

    /// Replace (or insert) a table's metadata wholesale — used on commit, when
    /// a shadow table's realized page list supersedes the live entry.
    pub fn create_or_replace_table(&mut self, table: Table) {
        let key = table.name.to_lowercase();
        self.tables.insert(key, table);
    }

    /// Smallest reusable page id, else one past the highest ever allocated.
    /// Tags the allocation under `txn_id` so a rollback can reclaim it.
    pub fn get_free_page_id(&mut self, txn_id: TxnId) -> PageId {
        let id = if let Some(&reused) = self.free_page_ids.iter().min_by_key(|p| p.0) {
            self.free_page_ids.remove(&reused);
            reused
        } else {
            self.max_page_id += 1;
            PageId(self.max_page_id)
        };
        self.max_page_id = self.max_page_id.max(id.0);
        self.borrowed_page_ids.entry(txn_id).or_default().push(id);
        id
    }

    /// Return ids to the free list. Never frees the catalog's own page.
    pub fn return_page_ids(&mut self, ids: impl IntoIterator<Item = PageId>) {
        for id in ids {
            if id != CATALOG_PAGE_ID {
                self.free_page_ids.insert(id);
            }
        }
    }

    /// Drop the bookkeeping entry for `txn_id`'s borrowed ids without
    /// touching the free list (used once its ids have been folded into
    /// `freed_page_ids` and returned separately by the caller).
    pub fn clear_borrowed(&mut self, txn_id: TxnId) {
        self.borrowed_page_ids.remove(&txn_id);
    }

    pub fn borrowed_page_ids(&self, txn_id: TxnId) -> &[PageId] {
        self.borrowed_page_ids
            .get(&txn_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn free_page_ids(&self) -> impl Iterator<Item = PageId> + '_ {
        self.free_page_ids.iter().copied()
    }

    pub fn max_page_id(&self) -> i32 {
        self.max_page_id
    }

    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.tables.values()
    }

    /// Encode this catalog as the contents of page 0.
    pub fn to_page(&self) -> DbResult<Page> {
        let payload = encode_to_vec(self, bincode_config())
            .map_err(|e| DbError::RuntimeError(format!("failed to serialize catalog: {e}")))?;
        Ok(Page {
            page_id: CATALOG_PAGE_ID,
            payload,
        })
    }

    /// Decode a catalog from page 0's contents.
    pub fn from_page(page: &Page) -> DbResult<Self> {
        if page.page_id != CATALOG_PAGE_ID {
            return Err(DbError::StorageCorrupt(format!(
                "expected catalog at page 0, got page {}",
                page.page_id.0
            )));
        }
        let (catalog, _) = decode_from_slice(&page.payload, bincode_config())
            .map_err(|e| DbError::StorageCorrupt(format!("failed to deserialize catalog: {e}")))?;
        Ok(catalog)
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::empty()
    }
}
