//! NATS JetStream KV connection store
//!
//! One KV entry per connection id holding the JSON `ConnectionRecord`.
//! Language updates use compare-and-set on the entry revision so a
//! concurrent disconnect is never resurrected.

mod client;
mod config;

pub use config::{NatsStoreConfig, StorageType};

use super::ConnectionStore;
use crate::error::{RelayError, Result};
use crate::types::ConnectionRecord;
use async_nats::jetstream::kv;
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;

/// Compare-and-set attempts before a language update gives up
const MAX_UPDATE_ATTEMPTS: usize = 3;

/// Connection store backed by a NATS KV bucket
pub struct NatsConnectionStore {
    kv: kv::Store,
    config: NatsStoreConfig,
}

impl NatsConnectionStore {
    /// Connect to NATS and open the configured bucket
    pub async fn connect(config: NatsStoreConfig) -> Result<Self> {
        let kv = client::connect(&config).await?;
        Ok(Self { kv, config })
    }

    /// Get the configuration
    pub fn config(&self) -> &NatsStoreConfig {
        &self.config
    }
}

#[async_trait]
impl ConnectionStore for NatsConnectionStore {
    async fn put(&self, record: &ConnectionRecord) -> Result<()> {
        let payload = serde_json::to_vec(record)?;
        let revision = self
            .kv
            .put(record.id.as_str(), Bytes::from(payload))
            .await
            .map_err(|e| {
                RelayError::Store(format!("Failed to put connection '{}': {}", record.id, e))
            })?;

        tracing::debug!(connection = %record.id, revision, "Connection record stored");
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<ConnectionRecord>> {
        let value = self
            .kv
            .get(id)
            .await
            .map_err(|e| RelayError::Store(format!("Failed to get connection '{}': {}", id, e)))?;

        match value {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.kv.delete(id).await.map_err(|e| {
            RelayError::Store(format!("Failed to delete connection '{}': {}", id, e))
        })?;
        Ok(())
    }

    async fn set_language(&self, id: &str, language: &str) -> Result<bool> {
        let mut last_error = String::new();

        for attempt in 1..=MAX_UPDATE_ATTEMPTS {
            let entry = self.kv.entry(id).await.map_err(|e| {
                RelayError::Store(format!("Failed to read connection '{}': {}", id, e))
            })?;

            let entry = match entry {
                Some(entry) if entry.operation == kv::Operation::Put => entry,
                _ => return Ok(false),
            };

            let mut record: ConnectionRecord = serde_json::from_slice(&entry.value)?;
            record.language = language.to_string();
            let payload = serde_json::to_vec(&record)?;

            match self.kv.update(id, Bytes::from(payload), entry.revision).await {
                Ok(_) => return Ok(true),
                Err(e) => {
                    tracing::debug!(
                        connection = %id,
                        attempt,
                        error = %e,
                        "Language update lost a revision race"
                    );
                    last_error = e.to_string();
                }
            }
        }

        Err(RelayError::Store(format!(
            "Failed to update language for '{}': {}",
            id, last_error
        )))
    }

    async fn list(&self) -> Result<Vec<ConnectionRecord>> {
        let keys = self
            .kv
            .keys()
            .await
            .map_err(|e| RelayError::Store(format!("Failed to list connections: {}", e)))?;
        let mut keys = std::pin::pin!(keys);

        let mut records = Vec::new();
        while let Some(key) = keys.next().await {
            let key =
                key.map_err(|e| RelayError::Store(format!("Failed to list connections: {}", e)))?;
            let value = self.kv.get(key.as_str()).await.map_err(|e| {
                RelayError::Store(format!("Failed to get connection '{}': {}", key, e))
            })?;
            // Deleted between listing and reading
            if let Some(record) = value.and_then(|bytes| decode_listed(&key, &bytes)) {
                records.push(record);
            }
        }

        Ok(records)
    }

    fn name(&self) -> &str {
        "nats-kv"
    }
}

/// Decode one listed entry; a corrupt row is skipped so it cannot block fan-out
fn decode_listed(key: &str, bytes: &[u8]) -> Option<ConnectionRecord> {
    match serde_json::from_slice(bytes) {
        Ok(record) => Some(record),
        Err(e) => {
            tracing::warn!(connection = %key, error = %e, "Skipping undecodable connection record");
            None
        }
    }
}
