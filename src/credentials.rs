//! Short-lived credentials for the producer's speech recognizer
//!
//! The broker caches nothing: every request assumes the role again.

use crate::config::CredentialsConfig;
use crate::error::{RelayError, Result};
use crate::types::Credential;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Longest session the broker will request
pub const MAX_SESSION_DURATION_SECS: u64 = 3600;

const NOT_CONFIGURED: &str = "Token generation not configured. TRANSCRIBE_ROLE_ARN required.";

/// Assume-role request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AssumeRoleRequest {
    pub role_arn: String,
    pub role_session_name: String,
    pub duration_seconds: u64,
}

/// Backend that mints temporary credentials
#[async_trait]
pub trait CredentialIssuer: Send + Sync {
    /// Assume the role; the returned credential's `region` is filled by the broker
    async fn assume_role(&self, request: &AssumeRoleRequest) -> Result<Credential>;
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AssumeRoleResponse {
    credentials: IssuedCredentials,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct IssuedCredentials {
    access_key_id: String,
    secret_access_key: String,
    session_token: String,
    expiration: DateTime<Utc>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ErrorBody {
    #[serde(default)]
    code: Option<String>,
    message: String,
}

/// Issuer calling a credential-vending HTTP endpoint
pub struct HttpCredentialIssuer {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpCredentialIssuer {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RelayError::Connection(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
        })
    }
}

#[async_trait]
impl CredentialIssuer for HttpCredentialIssuer {
    async fn assume_role(&self, request: &AssumeRoleRequest) -> Result<Credential> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| RelayError::Upstream(e.to_string()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| RelayError::Upstream(e.to_string()))?;

        if !status.is_success() {
            let message = match serde_json::from_slice::<ErrorResponse>(&body) {
                Ok(err) => {
                    tracing::debug!(code = ?err.error.code, "Credential service rejected request");
                    err.error.message
                }
                Err(_) => format!("credential service returned HTTP {}", status.as_u16()),
            };
            return Err(RelayError::Upstream(message));
        }

        let parsed: AssumeRoleResponse = serde_json::from_slice(&body)
            .map_err(|e| RelayError::Upstream(format!("Invalid credential response: {}", e)))?;
        let issued = parsed.credentials;

        Ok(Credential {
            access_key_id: issued.access_key_id,
            secret_access_key: issued.secret_access_key,
            session_token: issued.session_token,
            expiration: issued.expiration,
            region: String::new(),
        })
    }
}

/// Stateless wrapper enforcing the role and session duration policy
#[derive(Clone)]
pub struct CredentialBroker {
    role_arn: Option<String>,
    region: String,
    duration_secs: u64,
    issuer: Option<Arc<dyn CredentialIssuer>>,
}

impl CredentialBroker {
    /// Create a broker; `duration_secs` is capped at `MAX_SESSION_DURATION_SECS`
    pub fn new(
        role_arn: Option<String>,
        region: impl Into<String>,
        duration_secs: u64,
        issuer: Option<Arc<dyn CredentialIssuer>>,
    ) -> Self {
        Self {
            role_arn: role_arn.filter(|r| !r.is_empty()),
            region: region.into(),
            duration_secs: duration_secs.min(MAX_SESSION_DURATION_SECS),
            issuer,
        }
    }

    /// Broker that always answers `NotConfigured`
    pub fn disabled(region: impl Into<String>) -> Self {
        Self::new(None, region, MAX_SESSION_DURATION_SECS, None)
    }

    /// Build from config, using the HTTP issuer when an endpoint is set
    pub fn from_config(config: &CredentialsConfig, region: &str) -> Result<Self> {
        let issuer: Option<Arc<dyn CredentialIssuer>> = match config.endpoint.as_deref() {
            Some(endpoint) if !endpoint.is_empty() => Some(Arc::new(HttpCredentialIssuer::new(
                endpoint,
                Duration::from_secs(config.timeout_secs),
            )?)),
            _ => None,
        };

        let broker = Self::new(
            config.role_arn.clone(),
            region,
            config.session_duration_secs,
            issuer,
        );
        if !broker.is_available() {
            tracing::warn!("TRANSCRIBE_ROLE_ARN not configured. Token generation unavailable.");
        }
        Ok(broker)
    }

    /// Whether both a role and an issuer are configured
    pub fn is_available(&self) -> bool {
        self.role_arn.is_some() && self.issuer.is_some()
    }

    /// Effective session duration in seconds
    pub fn duration_secs(&self) -> u64 {
        self.duration_secs
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// Issue fresh credentials, naming the session after `session_name` if given
    pub async fn issue(&self, session_name: Option<&str>) -> Result<Credential> {
        let (Some(role_arn), Some(issuer)) = (&self.role_arn, &self.issuer) else {
            tracing::warn!("Token generation attempted but not configured");
            return Err(RelayError::NotConfigured(NOT_CONFIGURED.to_string()));
        };

        let session_name = match session_name.filter(|s| !s.is_empty()) {
            Some(name) => name.to_string(),
            None => format!("live-translate-{}", Utc::now().timestamp()),
        };

        tracing::info!(
            session = %session_name,
            duration_secs = self.duration_secs,
            "Generating temporary credentials"
        );

        let request = AssumeRoleRequest {
            role_arn: role_arn.clone(),
            role_session_name: session_name,
            duration_seconds: self.duration_secs,
        };

        let mut credential = issuer.assume_role(&request).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to generate token");
            RelayError::Upstream(format!("Failed to generate credentials: {}", e))
        })?;
        credential.region = self.region.clone();

        tracing::info!(expires = %credential.expiration, "Token generated");
        Ok(credential)
    }
}
