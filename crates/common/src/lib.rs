
pub mod pretty;

use serde::{Deserialize, Serialize};
use std::{collections::HashMap, io, path::PathBuf};
use thiserror::Error;
use types::Value;

/// Identifier for a column within a table schema.
pub type ColumnId = u16;

/// Logical identifier for a page in the storage layer. Page `0` is always the
/// catalog page and never appears in a table's page list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PageId(pub i32);

pub const CATALOG_PAGE_ID: PageId = PageId(0);

/// Monotonically-assigned transaction identifier. `-1` is the request-level
/// sentinel meaning "no transaction supplied"; it is also reserved internally
/// for the single in-flight anonymous auto-commit transaction.
pub type TxnId = i64;

pub const NO_TXN: TxnId = -1;

/// Fully-qualified identifier for a row within a page, used as the back-link
/// carried alongside rows produced by `Scan` and forwarded by identity-preserving
/// operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId {
    pub page_id: PageId,
    pub row_index: usize,
}

/// Positional row representation backed by `types::Value`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub values: Vec<Value>,
}

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

impl From<Vec<Value>> for Row {
    fn from(values: Vec<Value>) -> Self {
        Row::new(values)
    }
}

/// Named projection of a row keyed by column name.
pub type RowMap = HashMap<String, Value>;

/// Rectangular result set carrying column labels and rows.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RecordBatch {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

/// Canonical error type shared across database subsystems.
///
/// Variants correspond to the error kinds a caller must distinguish in order to
/// decide whether an owning transaction should be rolled back; see
/// [`DbError::should_rollback`].
#[derive(Error, Debug)]
pub enum DbError {
    #[error("syntax error at position {position}: {message}")]
    SyntaxError { message: String, position: usize },
    #[error("validation error: {0}")]
    ValidationError(String),
    #[error("ambiguous column '{name}', candidates: {candidates:?}")]
    AmbiguousColumn { name: String, candidates: Vec<String> },
    #[error("unknown column '{0}'")]
    UnknownColumn(String),
    #[error("page overflow: {0}")]
    PageOverflow(String),
    #[error("storage corrupt: {0}")]
    StorageCorrupt(String),
    #[error("transaction misuse: {0}")]
    TransactionMisuse(String),
    #[error("runtime error: {0}")]
    RuntimeError(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl DbError {
    /// Whether an error of this kind should trigger rollback of the transaction
    /// it surfaced under, per the error-kind table: syntax/validation/ambiguity/
    /// misuse errors never began mutating state, so they leave the transaction
    /// open; page overflow, storage corruption, and generic runtime failures may
    /// have left partial shadow state and must unwind it.
    pub fn should_rollback(&self) -> bool {
        matches!(
            self,
            DbError::PageOverflow(_) | DbError::StorageCorrupt(_) | DbError::RuntimeError(_) | DbError::Io(_)
        )
    }
}

/// Result alias that carries a `DbError`.
pub type DbResult<T> = Result<T, DbError>;

/// Runtime configuration for the database engine.
///
/// # Example
/// ```
/// use common::Config;
/// use std::path::PathBuf;
///
/// let config = Config::builder()
///     .path(PathBuf::from("./teaching.db"))
///     .page_size(4096)
///     .buffer_pool_pages(32)
///     .build();
/// ```
#[derive(Clone, Debug, bon::Builder)]
pub struct Config {
    /// Path to the single flat file backing the whole database.
    pub path: PathBuf,
    /// Fixed-size page allocation in bytes.
    #[builder(default = 4096)]
    pub page_size: usize,
    /// Number of pages the buffer pool keeps resident.
    #[builder(default = 32)]
    pub buffer_pool_pages: usize,
}

/// Convenient re-exports for downstream crates.
pub mod prelude {
    pub use crate::{
        CATALOG_PAGE_ID, Config, DbError, DbResult, NO_TXN, PageId, RecordBatch, RecordId, Row,
        RowMap, TxnId,
    };
    pub use types::{SqlType, Value};
}
