use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::auth::SenderAuth;
use crate::error::{RelayError, Result};
use crate::store::nats::NatsStoreConfig;

/// Settings for the relay server, invocation handler, and CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Host address for the HTTP server (default: 127.0.0.1)
    #[serde(default = "default_host")]
    pub host: String,

    /// Port for the HTTP server (default: 5000)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Shared secret for producers; unset disables secret checks
    #[serde(default)]
    pub api_key: Option<String>,

    /// Region reported beside issued credentials
    #[serde(default = "default_region")]
    pub region: String,

    /// Per-connection outbound queue depth
    #[serde(default = "default_outbound_queue")]
    pub outbound_queue: usize,

    #[serde(default)]
    pub dispatch: DispatchConfig,

    #[serde(default)]
    pub directory: DirectoryConfig,

    #[serde(default)]
    pub translation: TranslationConfig,

    #[serde(default)]
    pub credentials: CredentialsConfig,

    #[serde(default)]
    pub gateway: GatewayConfig,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_outbound_queue() -> usize {
    64
}

fn default_true() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_session_duration_secs() -> u64 {
    3600
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            api_key: None,
            region: default_region(),
            outbound_queue: default_outbound_queue(),
            dispatch: DispatchConfig::default(),
            directory: DirectoryConfig::default(),
            translation: TranslationConfig::default(),
            credentials: CredentialsConfig::default(),
            gateway: GatewayConfig::default(),
        }
    }
}

/// Fan-out behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    #[serde(default)]
    pub sender_auth: SenderAuth,

    /// Skip the producer when broadcasting its own text
    #[serde(default = "default_true")]
    pub exclude_sender: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            sender_auth: SenderAuth::default(),
            exclude_sender: true,
        }
    }
}

/// Which directory implementation to run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DirectoryBackend {
    /// In-process map holding live sockets
    #[default]
    Local,
    /// Shared NATS KV bucket
    Replicated,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DirectoryConfig {
    #[serde(default)]
    pub backend: DirectoryBackend,

    #[serde(default)]
    pub nats: NatsStoreConfig,
}

/// HTTP translation backend; no endpoint means text passes through untranslated
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationConfig {
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Temporary credential issuing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialsConfig {
    /// Role assumed for recognizer sessions
    #[serde(default)]
    pub role_arn: Option<String>,

    /// Requested session length, capped at 3600
    #[serde(default = "default_session_duration_secs")]
    pub session_duration_secs: u64,

    /// Credential-vending endpoint
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            role_arn: None,
            session_duration_secs: default_session_duration_secs(),
            endpoint: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Push API of the connection gateway (stateless topology)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Bearer token sent with every push
    #[serde(default)]
    pub token: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            token: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl RelayConfig {
    /// Load configuration from `path` (defaults when `None`), then apply
    /// environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Parse a TOML config file without environment overrides.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RelayError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        Ok(toml::from_str(&content)?)
    }

    /// Apply overrides from a variable lookup (the process environment in
    /// production). Empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(key) = var("API_KEY") {
            self.api_key = Some(key);
        }
        if let Some(role) = var("TRANSCRIBE_ROLE_ARN") {
            self.credentials.role_arn = Some(role);
        }
        if let Some(region) = var("AWS_REGION") {
            self.region = region;
        }
        if let Some(endpoint) = var("TRANSLATE_ENDPOINT") {
            self.translation.endpoint = Some(endpoint);
        }
        if let Some(url) = var("NATS_URL") {
            self.directory.nats.url = url;
        }
        if let Some(endpoint) = var("GATEWAY_ENDPOINT") {
            self.gateway.endpoint = Some(endpoint);
        }
        if let Some(host) = var("RELAY_HOST") {
            self.host = host;
        }
        if let Some(port) = var("RELAY_PORT") {
            self.port = port
                .parse()
                .map_err(|e| RelayError::Config(format!("Invalid RELAY_PORT '{}': {}", port, e)))?;
        }
        Ok(())
    }

    /// Returns the server bind address string (e.g., "127.0.0.1:5000").
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
