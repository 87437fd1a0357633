//! Bounded LRU cache of pages sitting in front of the [`DiskManager`].
//!
//! The buffer pool is the single authority that calls `DiskManager::write_page`:
//! every mutation, whether to a committed page or a transaction's shadow page,
//! passes through [`BufferPool::put`] and is written back only on eviction or
//! an explicit [`BufferPool::flush`].


use common::{DbResult, PageId};
use hashbrown::HashSet;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::path::Path;
use storage::{DiskManager, Page};

/// Bounded `page_id -> Page` cache, ordered by access recency.
pub struct BufferPool {
    disk: DiskManager,
    capacity: usize,
    cache: LruCache<PageId, Page>,
    dirty: HashSet<PageId>,
}

impl BufferPool {
    pub fn new(disk: DiskManager, capacity: usize) -> Self {
        assert!(capacity > 0, "buffer pool capacity must be > 0");
        Self {
            disk,
            capacity,
            cache: LruCache::new(NonZeroUsize::new(capacity).unwrap()),
            dirty: HashSet::new(),
        }
    }

    /// Open the database file at `path` and wrap it in a pool of `capacity`
    /// pages. Returns whether the file was freshly created.
    pub fn open(path: &Path, capacity: usize) -> DbResult<(Self, bool)> {
        let (disk, is_new) = DiskManager::open(path)?;
        Ok((Self::new(disk, capacity), is_new))
    }

    /// Fetch a page, promoting it to most-recently-used. Reads through to
    /// disk on a cache miss; never clears the page's dirty bit.
    pub fn get_page(&mut self, id: PageId) -> DbResult<Page> {
        if let Some(page) = self.cache.get(&id) {
            return Ok(page.clone());
        }

        let page = self.disk.read_page(id)?;
        self.evict_if_needed()?;
        self.cache.put(id, page.clone());
        Ok(page)
    }

    /// Fetch several pages, lazily. Already-cached pages are yielded first
    /// (in their relative order among themselves), then the remainder is
    /// read from disk in their relative order — so a disk read earlier in
    /// the sequence never evicts a page this same call still needs later.
    pub fn get_pages<'a>(&'a mut self, ids: &[PageId]) -> GetPages<'a> {
        let mut cached = Vec::with_capacity(ids.len());
        let mut uncached = Vec::new();
        for &id in ids {
            if self.cache.contains(&id) {
                cached.push(id);
            } else {
                uncached.push(id);
            }
        }
        cached.extend(uncached);

        GetPages {
            pool: self,
            remaining: cached.into_iter(),
        }
    }

    /// Insert or replace `page` at most-recently-used, marking it dirty.
    /// May evict the current LRU victim (writing it back first if dirty).
    pub fn put(&mut self, page: Page) -> DbResult<()> {
        let id = page.page_id;
        if !self.cache.contains(&id) {
            self.evict_if_needed()?;
        }
        self.cache.put(id, page);
        self.dirty.insert(id);
        Ok(())
    }

    /// Write every dirty page to disk without evicting anything.
    pub fn flush(&mut self) -> DbResult<()> {
        for id in self.dirty.drain() {
            if let Some(page) = self.cache.peek(&id) {
                self.disk.write_page(page)?;
            }
        }
        Ok(())
    }

    /// Drop a page from the cache without writing it back, regardless of its
    /// dirty bit. Used to eagerly discard a rolled-back transaction's shadow
    /// pages; the buffer pool does not require this (their ids are already
    /// back on the catalog free list and will be overwritten), but it avoids
    /// serving stale shadow content to a reader that races a later allocator
    /// reuse of the same id within the same process lifetime.
    pub fn discard(&mut self, id: PageId) {
        self.cache.pop(&id);
        self.dirty.remove(&id);
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn contains(&self, id: PageId) -> bool {
        self.cache.contains(&id)
    }

    pub fn is_dirty(&self, id: PageId) -> bool {
        self.dirty.contains(&id)
    }

    fn evict_if_needed(&mut self) -> DbResult<()> {
        if self.cache.len() < self.capacity {
            return Ok(());
        }

        if let Some((id, page)) = self.cache.pop_lru() {
            if self.dirty.remove(&id) {
                self.disk.write_page(&page)?;
            }
        }

        Ok(())
    }
}

/// Lazy iterator returned by [`BufferPool::get_pages`].
pub struct GetPages<'a> {
    pool: &'a mut BufferPool,
    remaining: std::vec::IntoIter<PageId>,
}

impl<'a> Iterator for GetPages<'a> {
    type Item = DbResult<Page>;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.remaining.next()?;
        Some(self.pool.get_page(id))
    }
}
