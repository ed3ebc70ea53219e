//! Durable connection store, the shared state of the replicated directory
//!
//! Every operation is atomic for a single connection id. Nothing spans ids,
//! so a fan-out racing a connect or disconnect may miss or over-reach one
//! recipient; callers treat delivery as best effort.

use crate::error::Result;
use crate::types::ConnectionRecord;
use async_trait::async_trait;

pub mod memory;
pub mod nats;

/// Per-connection record storage
#[async_trait]
pub trait ConnectionStore: Send + Sync {
    /// Insert or overwrite the record for `record.id`
    async fn put(&self, record: &ConnectionRecord) -> Result<()>;

    /// Fetch one record
    async fn get(&self, id: &str) -> Result<Option<ConnectionRecord>>;

    /// Delete one record; deleting a missing id is not an error
    async fn delete(&self, id: &str) -> Result<()>;

    /// Update the language of an existing record, returning whether it existed
    async fn set_language(&self, id: &str, language: &str) -> Result<bool>;

    /// All records currently stored
    async fn list(&self) -> Result<Vec<ConnectionRecord>>;

    /// Store name (e.g., "memory", "nats-kv")
    fn name(&self) -> &str;
}
