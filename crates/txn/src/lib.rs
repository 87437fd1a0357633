//! Shadow paging: per-transaction copy-on-write over tables and pages.
//!
//! A transaction never mutates a committed `Table` or `Page` in place. It
//! keeps its own map of shadow tables, copy-on-writes pages into freshly
//! allocated shadow pages the first time they are touched, and only folds
//! those changes into the live catalog on [`Transaction::commit`].

#[cfg(test)]
mod tests;

use buffer::BufferPool;
use catalog::{Catalog, Table};
use common::{DbError, DbResult, PageId, TxnId};
use hashbrown::HashMap;
use storage::{decode_rows, encode_rows, Page};

/// A transaction-local entry for a table: either a working copy of its
/// metadata, or a tombstone recording that this transaction dropped it.
enum ShadowEntry {
    Table(Table),
    Tombstone,
}

pub struct Transaction {
    id: TxnId,
    shadow_tables: HashMap<String, ShadowEntry>,
    obtained_page_ids: Vec<PageId>,
    freed_page_ids: Vec<PageId>,
    terminated: bool,
}

impl Transaction {
    pub fn new(id: TxnId) -> Self {
        Self {
            id,
            shadow_tables: HashMap::new(),
            obtained_page_ids: Vec::new(),
            freed_page_ids: Vec::new(),
            terminated: false,
        }
    }

    pub fn id(&self) -> TxnId {
        self.id
    }

    fn key(name: &str) -> String {
        name.to_lowercase()
    }

    /// The table as this transaction currently sees it: its own shadow copy
    /// if one exists, otherwise the live catalog entry. Errors if the
    /// transaction has tombstoned it or neither has ever heard of it.
    pub fn resolve_table(&self, catalog: &Catalog, name: &str) -> DbResult<Table> {
        match self.shadow_tables.get(&Self::key(name)) {
            Some(ShadowEntry::Table(table)) => Ok(table.clone()),
            Some(ShadowEntry::Tombstone) => {
                Err(DbError::ValidationError(format!("unknown table '{name}'")))
            }
            None => catalog.get_table_by_name(name).map(|t| t.clone()),
        }
    }

    /// Register a brand new table (CREATE TABLE) as this transaction's
    /// shadow entry. Visible only to this transaction until commit.
    pub fn create_table(&mut self, catalog: &Catalog, table: Table) -> DbResult<()> {
        let key = Self::key(&table.name);
        if catalog.has_table(&table.name) || matches!(self.shadow_tables.get(&key), Some(ShadowEntry::Table(_))) {
            return Err(DbError::ValidationError(format!(
                "table '{key}' already exists"
            )));
        }
        self.shadow_tables.insert(key, ShadowEntry::Table(table));
        Ok(())
    }

    /// Mark a table dropped by this transaction (DROP TABLE).
    pub fn drop_table(&mut self, catalog: &Catalog, name: &str) -> DbResult<()> {
        let key = Self::key(name);
        if !catalog.has_table(name) && !matches!(self.shadow_tables.get(&key), Some(ShadowEntry::Table(_))) {
            return Err(DbError::ValidationError(format!("unknown table '{name}'")));
        }
        // A table created earlier in this same transaction never reached the
        // live catalog, so its pages would otherwise be orphaned: commit's
        // `drop_table_by_name` call has nothing to return them from.
        if let Some(ShadowEntry::Table(table)) = self.shadow_tables.get(&key) {
            self.freed_page_ids.extend(table.page_ids.iter().copied());
        }
        self.shadow_tables.insert(key, ShadowEntry::Tombstone);
        Ok(())
    }

    /// Materialize a shadow copy of `name` if this transaction has not
    /// already made one, so it can append/replace pages in it.
    fn ensure_shadow(&mut self, catalog: &Catalog, name: &str) -> DbResult<&mut Table> {
        let key = Self::key(name);
        if !self.shadow_tables.contains_key(&key) {
            let table = catalog.get_table_by_name(name)?.clone();
            self.shadow_tables.insert(key.clone(), ShadowEntry::Table(table));
        }
        match self.shadow_tables.get_mut(&key) {
            Some(ShadowEntry::Table(table)) => Ok(table),
            Some(ShadowEntry::Tombstone) => {
                Err(DbError::ValidationError(format!("unknown table '{name}'")))
            }
            None => unreachable!(),
        }
    }

    /// Copy-on-write the page at `ordinal` in `table_name`'s page list.
    /// Returns the new shadow page's id and its decoded rows, ready for the
    /// caller to mutate and write back via `BufferPool::put`.
    ///
    /// If this transaction already copied that page, returns it directly
    /// instead of copying again.
    pub fn page_for_write(
        &mut self,
        catalog: &mut Catalog,
        pool: &mut BufferPool,
        table_name: &str,
        ordinal: usize,
    ) -> DbResult<(PageId, Vec<common::Row>)> {
        let table = self.ensure_shadow(catalog, table_name)?;
        let current = *table
            .page_ids
            .get(ordinal)
            .ok_or_else(|| DbError::RuntimeError(format!("page ordinal {ordinal} out of range")))?;

        if self.obtained_page_ids.contains(&current) {
            let page = pool.get_page(current)?;
            return Ok((current, decode_rows(&page.payload)?));
        }

        let original = pool.get_page(current)?;
        let rows = decode_rows(&original.payload)?;

        let new_id = catalog.get_free_page_id(self.id);
        self.obtained_page_ids.push(new_id);

        let table = self.ensure_shadow(catalog, table_name)?;
        table.page_ids[ordinal] = new_id;

        self.freed_page_ids.push(current);

        let shadow_page = Page {
            page_id: new_id,
            payload: encode_rows(&rows)?,
        };
        pool.put(shadow_page)?;

        Ok((new_id, rows))
    }

    /// Allocate and append a brand new (empty) shadow page to `table_name`.
    pub fn allocate_page(
        &mut self,
        catalog: &mut Catalog,
        pool: &mut BufferPool,
        table_name: &str,
    ) -> DbResult<PageId> {
        let new_id = catalog.get_free_page_id(self.id);
        self.obtained_page_ids.push(new_id);

        pool.put(Page::empty(new_id))?;

        let table = self.ensure_shadow(catalog, table_name)?;
        table.page_ids.push(new_id);

        Ok(new_id)
    }

    /// Overwrite the row sequence of an already-owned shadow page.
    pub fn write_page(&self, pool: &mut BufferPool, page_id: PageId, rows: &[common::Row]) -> DbResult<()> {
        debug_assert!(self.obtained_page_ids.contains(&page_id));
        pool.put(Page {
            page_id,
            payload: encode_rows(rows)?,
        })
    }

    pub fn owns_page(&self, id: PageId) -> bool {
        self.obtained_page_ids.contains(&id)
    }

    /// Fold every shadow-table mutation into the live catalog. Idempotent:
    /// a second call on an already-terminated transaction is a no-op.
    pub fn commit(&mut self, catalog: &mut Catalog) -> DbResult<()> {
        if self.terminated {
            return Ok(());
        }

        for (name, entry) in self.shadow_tables.drain() {
            match entry {
                ShadowEntry::Tombstone => match catalog.drop_table_by_name(&name) {
                    Ok(()) => {}
                    // Created and dropped within the same, uncommitted
                    // transaction: the catalog never had it, so there is
                    // nothing to return it from.
                    Err(DbError::ValidationError(_)) => {}
                    Err(e) => return Err(e),
                },
                ShadowEntry::Table(table) => catalog.create_or_replace_table(table),
            }
        }

        catalog.return_page_ids(std::mem::take(&mut self.freed_page_ids));
        catalog.clear_borrowed(self.id);
        self.terminated = true;
        Ok(())
    }

    /// Discard every shadow-table mutation and return this transaction's
    /// allocations to the catalog's free list.
    pub fn rollback(&mut self, catalog: &mut Catalog) {
        if self.terminated {
            return;
        }

        catalog.return_page_ids(std::mem::take(&mut self.obtained_page_ids));
        catalog.clear_borrowed(self.id);
        self.shadow_tables.clear();
        self.freed_page_ids.clear();
        self.terminated = true;
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }
}

/// Remove rows at `indices` from a decoded row sequence, as `delete_rows`
/// would on a `ShadowPage`. Indices need not be sorted.
pub fn delete_rows(rows: &mut Vec<common::Row>, mut indices: Vec<usize>) {
    indices.sort_unstable();
    indices.dedup();
    for idx in indices.into_iter().rev() {
        if idx < rows.len() {
            rows.remove(idx);
        }
    }
}
