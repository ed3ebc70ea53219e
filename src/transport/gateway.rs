//! Gateway-mediated transport: `POST {endpoint}/@connections/{id}`

use super::{Transport, TransportError};
use crate::config::GatewayConfig;
use crate::envelope::Outbound;
use crate::error::{RelayError, Result};
use crate::types::Connection;
use async_trait::async_trait;
use std::time::Duration;

/// Pushes envelopes through an external connection-management API
///
/// The API answers `410 Gone` for connections it no longer knows.
pub struct GatewayTransport {
    client: reqwest::Client,
    endpoint: String,
    token: Option<String>,
}

impl GatewayTransport {
    /// Build a transport for the configured push endpoint
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        let endpoint = config
            .endpoint
            .as_deref()
            .map(|e| e.trim_end_matches('/').to_string())
            .filter(|e| !e.is_empty())
            .ok_or_else(|| {
                RelayError::NotConfigured("Gateway endpoint not configured".to_string())
            })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                RelayError::Connection(format!("Failed to build gateway client: {}", e))
            })?;

        Ok(Self {
            client,
            endpoint,
            token: config.token.clone(),
        })
    }

    /// Push URL for one connection
    pub fn connection_url(&self, connection_id: &str) -> String {
        format!("{}/@connections/{}", self.endpoint, connection_id)
    }
}

/// Map a push API status code to a delivery result
fn classify_status(status: u16) -> std::result::Result<(), TransportError> {
    match status {
        200..=299 => Ok(()),
        410 => Err(TransportError::Gone),
        other => Err(TransportError::Failed(format!(
            "gateway returned HTTP {}",
            other
        ))),
    }
}

#[async_trait]
impl Transport for GatewayTransport {
    async fn send(
        &self,
        recipient: &Connection,
        envelope: &Outbound,
    ) -> std::result::Result<(), TransportError> {
        let body = envelope
            .to_json()
            .map_err(|e| TransportError::Failed(e.to_string()))?;

        let mut request = self
            .client
            .post(self.connection_url(&recipient.id))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body);
        if let Some(ref token) = self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| TransportError::Failed(e.to_string()))?;

        classify_status(response.status().as_u16())
    }

    fn name(&self) -> &str {
        "gateway"
    }
}
