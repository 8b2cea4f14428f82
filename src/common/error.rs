use thiserror::Error;

use super::types::PageId;

/// Storage engine error types
#[derive(Error, Debug)]
pub enum QuarryError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Buffer pool exhausted, every frame is pinned")]
    PoolExhausted,

    #[error("Invalid page ID: {0}")]
    InvalidPageId(PageId),

    #[error("Page {0} corrupted: {1}")]
    PageCorrupted(PageId, String),

    #[error("Header page is full")]
    CatalogFull,

    #[error("Index {0} already registered in header page")]
    DuplicateIndex(String),

    #[error("Index {0} not found in header page")]
    IndexNotFound(String),

    #[error("Disk scheduler error: {0}")]
    Channel(String),
}

pub type Result<T> = std::result::Result<T, QuarryError>;
