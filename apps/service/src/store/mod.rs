/// Record store abstraction
///
/// Check documents are owned by the account-facing API; the worker only lists,
/// reads and updates them. `FileStore` keeps one JSON document per key.
pub mod file;

pub use file::FileStore;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Namespace holding check records
pub const CHECKS: &str = "checks";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Record {category}/{id} not found")]
    NotFound { category: String, id: String },

    #[error("Record {category}/{id} already exists")]
    AlreadyExists { category: String, id: String },

    #[error("Store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Stored document is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// Keyed persistent storage, atomic per key
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// All keys in a category
    async fn list(&self, category: &str) -> Result<Vec<String>, StoreError>;

    /// Raw document, left for the caller to validate
    async fn read(&self, category: &str, id: &str) -> Result<Value, StoreError>;

    /// Replace an existing document
    async fn update(&self, category: &str, id: &str, record: &Value) -> Result<(), StoreError>;

    /// Store a new document, failing if the key is taken
    async fn create(&self, category: &str, id: &str, record: &Value) -> Result<(), StoreError>;

    async fn delete(&self, category: &str, id: &str) -> Result<(), StoreError>;
}
