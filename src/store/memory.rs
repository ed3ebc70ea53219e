//! In-memory connection store for tests and single-node deployments

use super::ConnectionStore;
use crate::error::Result;
use crate::types::ConnectionRecord;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Stores records in a map. Lost on drop.
#[derive(Default)]
pub struct MemoryConnectionStore {
    records: RwLock<HashMap<String, ConnectionRecord>>,
}

impl MemoryConnectionStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConnectionStore for MemoryConnectionStore {
    async fn put(&self, record: &ConnectionRecord) -> Result<()> {
        let mut records = self.records.write().await;
        records.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<ConnectionRecord>> {
        let records = self.records.read().await;
        Ok(records.get(id).cloned())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let mut records = self.records.write().await;
        records.remove(id);
        Ok(())
    }

    async fn set_language(&self, id: &str, language: &str) -> Result<bool> {
        let mut records = self.records.write().await;
        match records.get_mut(id) {
            Some(record) => {
                record.language = language.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list(&self) -> Result<Vec<ConnectionRecord>> {
        let records = self.records.read().await;
        Ok(records.values().cloned().collect())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
