//! Single-process directory holding socket handles inline

use super::Directory;
use crate::error::Result;
use crate::types::{normalize_language, Connection};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Volatile directory for the long-running topology
#[derive(Default)]
pub struct LocalDirectory {
    connections: RwLock<HashMap<String, Connection>>,
}

impl LocalDirectory {
    /// Create an empty directory
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Directory for LocalDirectory {
    async fn add(&self, connection: Connection) -> Result<()> {
        let id = connection.id.clone();
        let language = connection.language.clone();
        let tier = connection.tier;

        let total = {
            let mut connections = self.connections.write().await;
            connections.insert(id.clone(), connection);
            connections.len()
        };

        tracing::info!(
            connection = %id,
            language = %language,
            tier = ?tier,
            total,
            "Client added"
        );
        Ok(())
    }

    async fn remove(&self, id: &str) {
        let removed = {
            let mut connections = self.connections.write().await;
            connections.remove(id).is_some()
        };
        if removed {
            tracing::info!(connection = %id, "Client removed");
        }
    }

    async fn get(&self, id: &str) -> Result<Option<Connection>> {
        let connections = self.connections.read().await;
        Ok(connections.get(id).cloned())
    }

    async fn snapshot(&self) -> Result<Vec<Connection>> {
        let connections = self.connections.read().await;
        Ok(connections.values().cloned().collect())
    }

    async fn set_language(&self, id: &str, language: &str) -> Result<bool> {
        let mut connections = self.connections.write().await;
        match connections.get_mut(id) {
            Some(connection) => {
                connection.language = normalize_language(language);
                tracing::info!(
                    connection = %id,
                    language = %connection.language,
                    "Client language updated"
                );
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn count(&self) -> usize {
        self.connections.read().await.len()
    }

    async fn drain(&self) -> usize {
        let drained = {
            let mut connections = self.connections.write().await;
            std::mem::take(&mut *connections)
        };
        tracing::info!(count = drained.len(), "Directory drained");
        drained.len()
    }

    fn name(&self) -> &str {
        "local"
    }
}
