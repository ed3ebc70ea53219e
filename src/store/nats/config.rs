//! NATS key-value store configuration

use serde::{Deserialize, Serialize};

/// Storage backend for the KV bucket
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    /// Survives server restarts
    #[default]
    File,
    /// Faster, lost on server restart
    Memory,
}

/// Connection and bucket settings for `NatsConnectionStore`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NatsStoreConfig {
    /// Server URL
    pub url: String,

    /// KV bucket holding one entry per connection id
    pub bucket: String,

    /// Optional auth token
    pub token: Option<String>,

    pub connect_timeout_secs: u64,

    pub request_timeout_secs: u64,

    pub storage: StorageType,

    /// Entry expiry in seconds (0 = never); bounds leaks from lost disconnects
    pub max_age_secs: u64,

    pub replicas: usize,
}

impl Default for NatsStoreConfig {
    fn default() -> Self {
        Self {
            url: "nats://127.0.0.1:4222".to_string(),
            bucket: "live-translate-connections".to_string(),
            token: None,
            connect_timeout_secs: 5,
            request_timeout_secs: 5,
            storage: StorageType::File,
            max_age_secs: 0,
            replicas: 1,
        }
    }
}
