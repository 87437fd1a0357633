//! Page-granular disk I/O against a single flat file.
//!
//! A [`Page`] is a fixed-size on-disk unit: an 8-byte big-endian header
//! (`page_id: i32`, `data_length: i32`) followed by an opaque payload,
//! zero-padded to [`PAGE_SIZE`]. Page 0 is reserved for the catalog; every
//! other page encodes a row sequence belonging to exactly one table. This
//! crate only knows about bytes and row sequences — it has no notion of
//! tables, schemas, or catalogs.


use bincode::config::{self, Config};
use bincode::serde::{decode_from_slice, encode_to_vec};
use common::{DbError, DbResult, PageId, Row};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

pub const PAGE_SIZE: usize = 4096;
pub const HEADER_SIZE: usize = 8;

fn bincode_config() -> impl Config {
    config::legacy()
}

/// A fixed-size page: a page id, and an opaque payload whose meaning is
/// determined by the caller (catalog bytes for page 0, a row sequence for
/// every other page).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub page_id: PageId,
    pub payload: Vec<u8>,
}

impl Page {
    pub fn empty(page_id: PageId) -> Self {
        Self {
            page_id,
            payload: Vec::new(),
        }
    }

    /// Encode this page to exactly `PAGE_SIZE` bytes: header + payload +
    /// zero padding. Fails with `PageOverflow` if the payload does not fit.
    pub fn encode(&self) -> DbResult<Vec<u8>> {
        if self.payload.len() > PAGE_SIZE - HEADER_SIZE {
            return Err(DbError::PageOverflow(format!(
                "payload of {} bytes exceeds capacity of {} bytes for page {}",
                self.payload.len(),
                PAGE_SIZE - HEADER_SIZE,
                self.page_id.0
            )));
        }

        let mut bytes = vec![0u8; PAGE_SIZE];
        bytes[0..4].copy_from_slice(&self.page_id.0.to_be_bytes());
        bytes[4..8].copy_from_slice(&(self.payload.len() as i32).to_be_bytes());
        bytes[HEADER_SIZE..HEADER_SIZE + self.payload.len()].copy_from_slice(&self.payload);
        Ok(bytes)
    }

    /// Decode a page from exactly `PAGE_SIZE` bytes. Fails with
    /// `StorageCorrupt` if the header is malformed or claims more payload
    /// than the buffer holds.
    pub fn decode(bytes: &[u8]) -> DbResult<Self> {
        if bytes.len() != PAGE_SIZE {
            return Err(DbError::StorageCorrupt(format!(
                "expected {PAGE_SIZE} bytes, got {}",
                bytes.len()
            )));
        }

        let page_id = i32::from_be_bytes(bytes[0..4].try_into().unwrap());
        let data_length = i32::from_be_bytes(bytes[4..8].try_into().unwrap());

        if data_length < 0 || data_length as usize > PAGE_SIZE - HEADER_SIZE {
            return Err(DbError::StorageCorrupt(format!(
                "page {page_id} has invalid data_length {data_length}"
            )));
        }

        let data_length = data_length as usize;
        let payload = bytes[HEADER_SIZE..HEADER_SIZE + data_length].to_vec();
        Ok(Self {
            page_id: PageId(page_id),
            payload,
        })
    }
}

/// Serialize an ordered sequence of rows into a page payload.
pub fn encode_rows(rows: &[Row]) -> DbResult<Vec<u8>> {
    encode_to_vec(rows, bincode_config())
        .map_err(|e| DbError::RuntimeError(format!("failed to serialize rows: {e}")))
}

/// Deserialize an ordered sequence of rows from a page payload.
pub fn decode_rows(payload: &[u8]) -> DbResult<Vec<Row>> {
    if payload.is_empty() {
        return Ok(Vec::new());
    }
    let (rows, _) = decode_from_slice(payload, bincode_config())
        .map_err(|e| DbError::StorageCorrupt(format!("failed to deserialize rows: {e}")))?;
    Ok(rows)
}

/// Page-granular reader/writer over one flat file.
///
/// No caching and no locking: the buffer pool is the single writer, and
/// concurrent use from multiple threads is undefined.
#[derive(Debug)]
pub struct DiskManager {
    file: File,
}

impl DiskManager {
    /// Open (or create) the database file. Returns whether the file was
    /// just created (empty), in which case the caller is responsible for
    /// writing the bootstrap catalog page to page 0 (see `catalog::Catalog`).
    pub fn open(path: &Path) -> DbResult<(Self, bool)> {
        let existed = path.exists() && path.metadata().map(|m| m.len() > 0).unwrap_or(false);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;
        Ok((Self { file }, !existed))
    }

    fn num_pages(&self) -> DbResult<u64> {
        Ok(self.file.metadata()?.len() / PAGE_SIZE as u64)
    }

    /// Read the page at `id`. Fails with `StorageCorrupt` if fewer than
    /// `PAGE_SIZE` bytes are available at that offset.
    pub fn read_page(&mut self, id: PageId) -> DbResult<Page> {
        let offset = id.0 as u64 * PAGE_SIZE as u64;
        if offset + PAGE_SIZE as u64 > self.file.metadata()?.len() {
            return Err(DbError::StorageCorrupt(format!(
                "page {} is not allocated on disk",
                id.0
            )));
        }

        let mut buf = vec![0u8; PAGE_SIZE];
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(&mut buf)?;
        Page::decode(&buf)
    }

    /// Write `page` at its own id's offset. Extends the file if the page is
    /// beyond the current end. Fails with `PageOverflow` if the payload does
    /// not fit.
    pub fn write_page(&mut self, page: &Page) -> DbResult<()> {
        let bytes = page.encode()?;
        let offset = page.page_id.0 as u64 * PAGE_SIZE as u64;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(&bytes)?;
        self.file.flush()?;
        Ok(())
    }

    /// Highest page id ever allocated on disk (i.e. the last page's index),
    /// or `None` for a fresh, empty file.
    pub fn max_allocated_page_id(&self) -> DbResult<Option<i32>> {
        let pages = self.num_pages()?;
        if pages == 0 {
            Ok(None)
        } else {
            Ok(Some(pages as i32 - 1))
        }
    }
}
