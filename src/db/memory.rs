use super::PollStorage;
use crate::error::StorageError;
use crate::models::PollRecord;
use async_trait::async_trait;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct MemoryStorage {
    records: RwLock<Vec<PollRecord>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PollStorage for MemoryStorage {
    async fn get(&self, poll_id: &str) -> Result<Option<PollRecord>, StorageError> {
        let records = self.records.read().await;
        Ok(records.iter().find(|r| r.poll.id == poll_id).cloned())
    }

    async fn put(&self, record: &PollRecord) -> Result<(), StorageError> {
        let mut records = self.records.write().await;
        match records.iter_mut().find(|r| r.poll.id == record.poll.id) {
            Some(existing) => *existing = record.clone(),
            None => records.push(record.clone()),
        }
        Ok(())
    }

    async fn delete(&self, poll_id: &str) -> Result<bool, StorageError> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|r| r.poll.id != poll_id);
        Ok(records.len() != before)
    }

    async fn list(&self) -> Result<Vec<PollRecord>, StorageError> {
        Ok(self.records.read().await.clone())
    }
}
