//! NATS connection and KV bucket lifecycle

use super::config::{NatsStoreConfig, StorageType};
use crate::error::{RelayError, Result};
use async_nats::jetstream::{self, kv};
use std::time::Duration;

/// Connect to NATS and open (or create) the connection bucket
pub(super) async fn connect(config: &NatsStoreConfig) -> Result<kv::Store> {
    let connect_opts = build_connect_options(config);

    let client = connect_opts
        .connect(&config.url)
        .await
        .map_err(|e| RelayError::Connection(format!("{}: {}", config.url, e)))?;

    tracing::info!(url = %config.url, "Connected to NATS");

    let jetstream = jetstream::new(client);
    ensure_bucket(&jetstream, config).await
}

/// Build NATS connect options from config
fn build_connect_options(config: &NatsStoreConfig) -> async_nats::ConnectOptions {
    let mut opts = async_nats::ConnectOptions::new()
        .connection_timeout(Duration::from_secs(config.connect_timeout_secs))
        .request_timeout(Some(Duration::from_secs(config.request_timeout_secs)));

    if let Some(ref token) = config.token {
        opts = opts.token(token.clone());
    }

    opts
}

/// Open the bucket, creating it on first use
async fn ensure_bucket(js: &jetstream::Context, config: &NatsStoreConfig) -> Result<kv::Store> {
    if let Ok(store) = js.get_key_value(config.bucket.as_str()).await {
        tracing::info!(bucket = %config.bucket, "KV bucket ready");
        return Ok(store);
    }

    let storage = match config.storage {
        StorageType::File => jetstream::stream::StorageType::File,
        StorageType::Memory => jetstream::stream::StorageType::Memory,
    };

    let store = js
        .create_key_value(kv::Config {
            bucket: config.bucket.clone(),
            description: "Live translation connection directory".to_string(),
            history: 1,
            max_age: Duration::from_secs(config.max_age_secs),
            storage,
            num_replicas: config.replicas.max(1),
            ..Default::default()
        })
        .await
        .map_err(|e| {
            RelayError::Store(format!(
                "Failed to create KV bucket '{}': {}",
                config.bucket, e
            ))
        })?;

    tracing::info!(
        bucket = %config.bucket,
        storage = ?config.storage,
        "KV bucket created"
    );

    Ok(store)
}
