use thiserror::Error;

use super::types::PageId;

/// Storage substrate error types
#[derive(Error, Debug)]
pub enum BedrockError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Buffer pool exhausted, every frame is pinned")]
    PoolExhausted,

    #[error("Invalid page ID: {0}")]
    InvalidPageId(PageId),

    #[error("Disk scheduler error: {0}")]
    DiskScheduler(String),
}

pub type Result<T> = std::result::Result<T, BedrockError>;
