//! Directory persisted to a shared `ConnectionStore`
//!
//! Language and tier live in the store so independent invocations see the
//! same connections. Socket handles cannot leave the owning process, so a
//! local cache keeps weak references to the handles this process accepted.
//!
//! The shipped shells never combine the two: `serve` runs the local
//! directory and `invoke` holds no sockets. Weak handles matter only to an
//! embedder that accepts sockets itself and shares the store with other
//! processes, pairing this directory with a transport that falls back to the
//! gateway for rows it does not own.

use super::Directory;
use crate::error::Result;
use crate::store::ConnectionStore;
use crate::transport::WeakConnectionHandle;
use crate::types::{normalize_language, AuthorizationTier, Connection};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Locally cached view of a connection this process accepted
#[derive(Debug, Clone)]
struct CachedConnection {
    language: String,
    tier: AuthorizationTier,
    handle: Option<WeakConnectionHandle>,
}

impl CachedConnection {
    fn to_connection(&self, id: &str) -> Connection {
        Connection {
            id: id.to_string(),
            language: self.language.clone(),
            tier: self.tier,
            handle: self.handle.as_ref().and_then(|h| h.upgrade()),
        }
    }
}

/// Directory shared across processes through a durable store
pub struct ReplicatedDirectory {
    store: Arc<dyn ConnectionStore>,
    local: RwLock<HashMap<String, CachedConnection>>,
}

impl ReplicatedDirectory {
    /// Create a directory over the given store
    pub fn new(store: Arc<dyn ConnectionStore>) -> Self {
        Self {
            store,
            local: RwLock::new(HashMap::new()),
        }
    }

    /// The underlying store
    pub fn store(&self) -> &dyn ConnectionStore {
        self.store.as_ref()
    }
}

#[async_trait]
impl Directory for ReplicatedDirectory {
    async fn add(&self, connection: Connection) -> Result<()> {
        self.store.put(&connection.record()).await?;

        let cached = CachedConnection {
            language: connection.language.clone(),
            tier: connection.tier,
            handle: connection.handle.as_ref().map(|h| h.downgrade()),
        };
        self.local
            .write()
            .await
            .insert(connection.id.clone(), cached);

        tracing::info!(
            connection = %connection.id,
            language = %connection.language,
            tier = ?connection.tier,
            store = self.store.name(),
            "Client added"
        );
        Ok(())
    }

    async fn remove(&self, id: &str) {
        if let Err(e) = self.store.delete(id).await {
            tracing::warn!(
                connection = %id,
                error = %e,
                "Failed to delete connection from store, removing locally"
            );
        }

        self.local.write().await.remove(id);
        tracing::info!(connection = %id, "Client removed");
    }

    async fn get(&self, id: &str) -> Result<Option<Connection>> {
        // The store is authoritative for language; the cache only adds the handle
        let record = match self.store.get(id).await {
            Ok(record) => record,
            Err(e) => match self.local.read().await.get(id) {
                Some(cached) => {
                    tracing::warn!(
                        connection = %id,
                        error = %e,
                        "Store read failed, serving cached connection"
                    );
                    return Ok(Some(cached.to_connection(id)));
                }
                None => return Err(e),
            },
        };

        let Some(record) = record else {
            return Ok(None);
        };
        let mut connection = record.into_connection();
        if let Some(cached) = self.local.read().await.get(id) {
            connection.handle = cached.handle.as_ref().and_then(|h| h.upgrade());
        }
        Ok(Some(connection))
    }

    async fn snapshot(&self) -> Result<Vec<Connection>> {
        let records = self.store.list().await?;
        let local = self.local.read().await;

        Ok(records
            .into_iter()
            .map(|record| {
                let mut connection = record.into_connection();
                if let Some(cached) = local.get(&connection.id) {
                    connection.handle = cached.handle.as_ref().and_then(|h| h.upgrade());
                }
                connection
            })
            .collect())
    }

    async fn set_language(&self, id: &str, language: &str) -> Result<bool> {
        let language = normalize_language(language);
        let existed = self.store.set_language(id, &language).await?;

        if existed {
            if let Some(cached) = self.local.write().await.get_mut(id) {
                cached.language = language.clone();
            }
            tracing::info!(connection = %id, language = %language, "Client language updated");
        }

        Ok(existed)
    }

    async fn count(&self) -> usize {
        self.local.read().await.len()
    }

    async fn drain(&self) -> usize {
        let drained = {
            let mut local = self.local.write().await;
            std::mem::take(&mut *local)
        };

        for id in drained.keys() {
            if let Err(e) = self.store.delete(id).await {
                tracing::warn!(
                    connection = %id,
                    error = %e,
                    "Failed to delete connection during drain"
                );
            }
        }

        tracing::info!(count = drained.len(), "Directory drained");
        drained.len()
    }

    fn name(&self) -> &str {
        "replicated"
    }
}
