//! Connection directory: who is connected, in which language, with which tier
//!
//! The directory only exposes primitive CRUD. Pruning dead recipients is the
//! dispatcher's job. All implementations synchronize internally; callers
//! never hold a lock across a network send.

use crate::config::{DirectoryBackend, DirectoryConfig};
use crate::error::Result;
use crate::store::nats::NatsConnectionStore;
use crate::types::Connection;
use async_trait::async_trait;
use std::sync::Arc;

pub mod local;
pub mod replicated;

pub use local::LocalDirectory;
pub use replicated::ReplicatedDirectory;

/// Registry of known connections
#[async_trait]
pub trait Directory: Send + Sync {
    /// Insert or overwrite the entry for `connection.id`
    async fn add(&self, connection: Connection) -> Result<()>;

    /// Remove an entry; a missing id is a no-op
    ///
    /// Removal races with normal disconnects, so it never fails.
    async fn remove(&self, id: &str);

    /// Look up one connection
    async fn get(&self, id: &str) -> Result<Option<Connection>>;

    /// Point-in-time copy of every known connection
    async fn snapshot(&self) -> Result<Vec<Connection>>;

    /// Change the language of an existing entry, returning whether it existed
    async fn set_language(&self, id: &str, language: &str) -> Result<bool>;

    /// Number of connections owned by this process
    async fn count(&self) -> usize;

    /// Remove every connection owned by this process (shutdown step)
    async fn drain(&self) -> usize;

    /// Directory name (e.g., "local", "replicated")
    fn name(&self) -> &str;
}

/// Build the directory selected by configuration
pub async fn connect(config: &DirectoryConfig) -> Result<Arc<dyn Directory>> {
    match config.backend {
        DirectoryBackend::Local => Ok(Arc::new(LocalDirectory::new())),
        DirectoryBackend::Replicated => {
            let store = NatsConnectionStore::connect(config.nats.clone()).await?;
            Ok(Arc::new(ReplicatedDirectory::new(Arc::new(store))))
        }
    }
}
