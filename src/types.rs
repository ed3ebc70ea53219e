//! Core relay types: connections, durable records, credentials
//!
//! Wire-facing records use the field casing their consumers expect:
//! camelCase for the durable connection row, PascalCase for credentials.

use crate::transport::ConnectionHandle;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Language every connection starts in; text in this language is never translated
pub const DEFAULT_LANGUAGE: &str = "en";

/// Apply the default to a missing or blank language code
pub fn normalize_language(language: &str) -> String {
    let trimmed = language.trim();
    if trimmed.is_empty() {
        DEFAULT_LANGUAGE.to_string()
    } else {
        trimmed.to_string()
    }
}

fn default_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}

/// Coarse permission level, decided once at connect time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationTier {
    /// Passive recipient
    #[default]
    Anonymous,
    /// Producer allowed to publish new text
    AuthorizedSender,
}

impl AuthorizationTier {
    /// Tier for an authorizer's boolean decision
    pub fn from_authorized(authorized: bool) -> Self {
        if authorized {
            AuthorizationTier::AuthorizedSender
        } else {
            AuthorizationTier::Anonymous
        }
    }
}

/// One connected subscriber or producer
#[derive(Debug, Clone)]
pub struct Connection {
    /// Opaque id, unique for the connection's lifetime
    pub id: String,

    /// Preferred language (ISO code)
    pub language: String,

    /// Authorization tier, immutable after connect
    pub tier: AuthorizationTier,

    /// Live socket handle, present only in the process that owns the socket
    pub handle: Option<ConnectionHandle>,
}

impl Connection {
    /// Create a connection with default language and `Anonymous` tier
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            language: default_language(),
            tier: AuthorizationTier::default(),
            handle: None,
        }
    }

    /// Set the preferred language (blank falls back to the default)
    pub fn with_language(mut self, language: &str) -> Self {
        self.language = normalize_language(language);
        self
    }

    /// Set the authorization tier
    pub fn with_tier(mut self, tier: AuthorizationTier) -> Self {
        self.tier = tier;
        self
    }

    /// Attach the owned socket handle
    pub fn with_handle(mut self, handle: ConnectionHandle) -> Self {
        self.handle = Some(handle);
        self
    }

    /// Whether this connection may publish new text by tier alone
    pub fn is_authorized_sender(&self) -> bool {
        self.tier == AuthorizationTier::AuthorizedSender
    }

    /// The durable part of this connection
    pub fn record(&self) -> ConnectionRecord {
        ConnectionRecord {
            id: self.id.clone(),
            language: self.language.clone(),
            authorization_tier: self.tier,
        }
    }
}

/// Durable row persisted by the replicated directory
///
/// Transport handles are never part of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionRecord {
    pub id: String,

    #[serde(default = "default_language")]
    pub language: String,

    #[serde(default)]
    pub authorization_tier: AuthorizationTier,
}

impl ConnectionRecord {
    /// Rebuild a connection without a handle, applying the language default
    pub fn into_connection(self) -> Connection {
        Connection {
            id: self.id,
            language: normalize_language(&self.language),
            tier: self.authorization_tier,
            handle: None,
        }
    }
}

/// Short-lived access credentials, issued fresh per request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Credential {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    pub expiration: DateTime<Utc>,

    /// Region the credentials are scoped to; reported beside them on the wire
    #[serde(skip)]
    pub region: String,
}

/// Payload of a `translated_text` delivery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslatedText {
    /// Text in the recipient's language
    pub text: String,
    /// Text as the producer sent it
    pub original: String,
    /// Producer-supplied timestamp, passed through untouched
    pub timestamp: String,
    /// Recipient language
    pub language: String,
}
