//! Message envelopes: `{"type": ..., "data": {...}}` in both directions

use crate::error::{RelayError, Result};
use crate::types::{normalize_language, Credential, TranslatedText};
use serde::{Deserialize, Serialize};

/// Envelope a client sends to the relay
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// Change the sender's preferred language
    SetLanguage { language: String },

    /// New utterance from a producer, fanned out to everyone else
    NewText {
        text: String,
        timestamp: String,
        api_key: Option<String>,
    },

    /// One-off translation for the sender only
    RequestTranslation {
        text: String,
        target_language: String,
    },

    /// Temporary credentials for the producer's recognizer
    GenerateToken {
        api_key: Option<String>,
        session_name: Option<String>,
    },
}

#[derive(Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    data: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct SetLanguageData {
    #[serde(default, alias = "lang")]
    language: String,
}

#[derive(Deserialize)]
struct NewTextData {
    #[serde(default)]
    text: String,
    #[serde(default)]
    timestamp: String,
    #[serde(default)]
    api_key: Option<String>,
}

#[derive(Deserialize)]
struct RequestTranslationData {
    #[serde(default)]
    text: String,
    #[serde(default)]
    target_language: String,
}

#[derive(Deserialize)]
struct GenerateTokenData {
    #[serde(default)]
    api_key: Option<String>,
    #[serde(default)]
    session_name: Option<String>,
}

impl Inbound {
    /// Parse one raw frame
    ///
    /// Missing `data` fields take their defaults; malformed JSON or an
    /// unknown `type` is a `Validation` error.
    pub fn parse(raw: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(raw)
            .map_err(|e| RelayError::Validation(format!("Invalid JSON: {}", e)))?;
        Self::from_value(value)
    }

    /// Interpret an already-decoded JSON document as an envelope
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        let envelope: RawEnvelope = serde_json::from_value(value)
            .map_err(|e| RelayError::Validation(format!("Invalid envelope: {}", e)))?;

        let kind = envelope
            .kind
            .ok_or_else(|| RelayError::Validation("Missing message type".to_string()))?;
        let data = match envelope.data {
            Some(serde_json::Value::Null) | None => serde_json::json!({}),
            Some(data) => data,
        };

        match kind.as_str() {
            "set_language" => {
                let d: SetLanguageData = decode(&kind, data)?;
                Ok(Inbound::SetLanguage {
                    language: normalize_language(&d.language),
                })
            }
            "new_text" => {
                let d: NewTextData = decode(&kind, data)?;
                Ok(Inbound::NewText {
                    text: d.text,
                    timestamp: d.timestamp,
                    api_key: d.api_key,
                })
            }
            "request_translation" => {
                let d: RequestTranslationData = decode(&kind, data)?;
                Ok(Inbound::RequestTranslation {
                    text: d.text,
                    target_language: normalize_language(&d.target_language),
                })
            }
            "generate_token" => {
                let d: GenerateTokenData = decode(&kind, data)?;
                Ok(Inbound::GenerateToken {
                    api_key: d.api_key,
                    session_name: d.session_name,
                })
            }
            other => Err(RelayError::Validation(format!(
                "Unknown message type: {}",
                other
            ))),
        }
    }

    /// Wire name of this envelope's type
    pub fn kind(&self) -> &'static str {
        match self {
            Inbound::SetLanguage { .. } => "set_language",
            Inbound::NewText { .. } => "new_text",
            Inbound::RequestTranslation { .. } => "request_translation",
            Inbound::GenerateToken { .. } => "generate_token",
        }
    }
}

fn decode<T: serde::de::DeserializeOwned>(kind: &str, data: serde_json::Value) -> Result<T> {
    serde_json::from_value(data)
        .map_err(|e| RelayError::Validation(format!("Invalid data for '{}': {}", kind, e)))
}

/// Envelope the relay sends to a client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Outbound {
    /// Sent once a connection is registered
    ConnectionStatus {
        status: String,
        /// Whether a translation backend is configured
        aws_available: bool,
    },

    /// Confirms a language change
    LanguageSet { language: String },

    /// One fan-out delivery
    TranslatedText(TranslatedText),

    /// Reply to `request_translation`
    TranslationResult {
        original: String,
        translated: String,
        language: String,
    },

    /// Reply to `generate_token`
    TokenResponse {
        credentials: Credential,
        region: String,
    },

    /// Typed error for the sender
    Error { message: String },
}

impl Outbound {
    /// `connection_status` for a freshly registered connection
    pub fn connected(translation_available: bool) -> Self {
        Outbound::ConnectionStatus {
            status: "connected".to_string(),
            aws_available: translation_available,
        }
    }

    /// `error` with the given message
    pub fn error(message: impl Into<String>) -> Self {
        Outbound::Error {
            message: message.into(),
        }
    }

    /// `token_response` for an issued credential
    pub fn token(credential: Credential) -> Self {
        let region = credential.region.clone();
        Outbound::TokenResponse {
            credentials: credential,
            region,
        }
    }

    /// Serialize to a wire frame
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl From<&RelayError> for Outbound {
    fn from(err: &RelayError) -> Self {
        Outbound::error(err.to_string())
    }
}
