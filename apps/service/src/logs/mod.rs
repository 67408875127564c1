/// Check history logs
///
/// One append-only log per check id, rotated into compressed archives:
/// - `file`: on-disk log store (`<id>.log` + `<archive>.gz.b64`)
/// - `writer`: serializes one entry per probe cycle
/// - `rotator`: compress-then-truncate pass over every live log
pub mod file;
pub mod rotator;
pub mod writer;

pub use file::FileLogStore;
pub use rotator::{LogRotator, RotationSummary};
pub use writer::LogWriter;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LogStoreError {
    #[error("Archive {0} already exists")]
    AlreadyExists(String),

    #[error("Log {0} not found")]
    NotFound(String),

    #[error("Log {0} is empty, nothing to compress")]
    EmptyLog(String),

    #[error("Log {0} already has an archive waiting to be truncated")]
    RotationPending(String),

    #[error("Log store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Archive {id} could not be decoded: {reason}")]
    Decode { id: String, reason: String },
}

/// Storage for live logs and their archives
#[async_trait]
pub trait LogStore: Send + Sync {
    /// Append one record, creating the log if needed
    async fn append(&self, log_id: &str, entry: &str) -> Result<(), LogStoreError>;

    /// Ids of live logs, plus archive ids when `include_archived` is set
    async fn list(&self, include_archived: bool) -> Result<Vec<String>, LogStoreError>;

    /// Compress a live log into a new archive. Never overwrites an archive.
    async fn compress_exclusive(&self, log_id: &str, archive_id: &str) -> Result<(), LogStoreError>;

    /// Original content of an archive
    async fn decompress(&self, archive_id: &str) -> Result<String, LogStoreError>;

    /// Drop what the last compression archived, or everything if nothing is pending
    async fn truncate(&self, log_id: &str) -> Result<(), LogStoreError>;
}
