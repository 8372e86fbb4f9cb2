use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::FlagStore;
use crate::error::StoreError;
use crate::record::FlagRecord;

/// In-memory flag storage backed by a `RwLock<HashMap>` keyed by name.
#[derive(Default)]
pub struct MemoryStore {
    data: RwLock<HashMap<String, FlagRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl FlagStore for MemoryStore {
    async fn upsert(&self, record: &FlagRecord) -> Result<(), StoreError> {
        let mut data = self.data.write().await;
        data.insert(record.name.clone(), record.clone());
        Ok(())
    }

    async fn get(&self, name: &str, environment: &str) -> Result<Option<FlagRecord>, StoreError> {
        let data = self.data.read().await;
        Ok(data
            .get(name)
            .filter(|r| r.environment == environment)
            .cloned())
    }

    async fn list(&self) -> Result<Vec<FlagRecord>, StoreError> {
        let data = self.data.read().await;
        let mut records: Vec<FlagRecord> = data.values().cloned().collect();
        records.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(records)
    }
}
