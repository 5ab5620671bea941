mod memory;
mod sqlite;

pub use memory::MemoryStorage;
pub use sqlite::SqliteStorage;

use crate::error::StorageError;
use crate::models::PollRecord;
use async_trait::async_trait;

/// Backing store for poll records. Implementations only persist; every rule
/// about votes and ownership lives in the poll store above them.
#[async_trait]
pub trait PollStorage: Send + Sync {
    async fn get(&self, poll_id: &str) -> Result<Option<PollRecord>, StorageError>;

    /// Inserts or fully replaces a record. A replaced record keeps its place in `list`.
    async fn put(&self, record: &PollRecord) -> Result<(), StorageError>;

    /// Returns whether a record was removed.
    async fn delete(&self, poll_id: &str) -> Result<bool, StorageError>;

    /// All records in insertion order.
    async fn list(&self) -> Result<Vec<PollRecord>, StorageError>;
}
