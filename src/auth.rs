//! Sender authorization and the connect-time authorizer
//!
//! Secrets are compared with `subtle` so the comparison time does not
//! depend on the secret's length or on where the inputs first differ.

use crate::error::{RelayError, Result};
use crate::types::AuthorizationTier;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

/// Compare two strings in constant time
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    // Pad both to the longer length; differing pad bytes keep a length
    // mismatch unequal even when one input is a prefix of the other
    let max_len = std::cmp::max(a.len(), b.len());
    let mut a_padded = vec![0u8; max_len];
    let mut b_padded = vec![0xFFu8; max_len];
    a_padded[..a.len()].copy_from_slice(a.as_bytes());
    b_padded[..b.len()].copy_from_slice(b.as_bytes());

    let lengths_equal = a.len().ct_eq(&b.len());
    let contents_equal = a_padded.ct_eq(&b_padded);
    (lengths_equal & contents_equal).into()
}

/// Token from an `Authorization: Bearer <token>` header value
pub fn bearer_token(header: Option<&str>) -> Option<&str> {
    let token = header?.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

/// The producer's shared secret, possibly unset
#[derive(Clone, Default)]
pub struct SharedSecret {
    key: Option<String>,
}

impl std::fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedSecret")
            .field("configured", &self.is_configured())
            .finish()
    }
}

impl SharedSecret {
    /// Wrap a configured key; blank keys count as unset
    pub fn new(key: Option<String>) -> Self {
        Self {
            key: key.filter(|k| !k.is_empty()),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.key.is_some()
    }

    /// Strict check: a key is configured and `supplied` equals it
    pub fn matches(&self, supplied: Option<&str>) -> bool {
        match (&self.key, supplied) {
            (Some(expected), Some(supplied)) => constant_time_eq(supplied, expected),
            _ => false,
        }
    }

    /// Open check: passes when no key is configured, else as `matches`
    pub fn allows(&self, supplied: Option<&str>) -> bool {
        !self.is_configured() || self.matches(supplied)
    }
}

/// How a `new_text` or `generate_token` sender is authorized
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SenderAuth {
    /// Tier `AuthorizedSender` only
    Tier,
    /// Per-message secret only; open when no secret is configured
    SharedSecret,
    /// Tier `AuthorizedSender`, or a per-message secret; open when no
    /// secret is configured
    #[default]
    TierOrSecret,
}

impl SenderAuth {
    /// Decide whether a sender may publish
    pub fn permits(
        &self,
        tier: AuthorizationTier,
        supplied: Option<&str>,
        secret: &SharedSecret,
    ) -> bool {
        let by_tier = tier == AuthorizationTier::AuthorizedSender;
        match self {
            SenderAuth::Tier => by_tier,
            SenderAuth::SharedSecret => secret.allows(supplied),
            SenderAuth::TierOrSecret => by_tier || secret.allows(supplied),
        }
    }

    /// `permits`, as a `RelayError::Authorization` on refusal
    pub fn check(
        &self,
        tier: AuthorizationTier,
        supplied: Option<&str>,
        secret: &SharedSecret,
    ) -> Result<()> {
        if self.permits(tier, supplied, secret) {
            Ok(())
        } else {
            Err(RelayError::Authorization("Invalid API key".to_string()))
        }
    }
}

/// Connect-time decision from the `X-API-Key` header
///
/// No key connects as `Anonymous`; a valid key as `AuthorizedSender`; any
/// other key is refused.
#[derive(Debug, Clone, Default)]
pub struct ConnectAuthorizer {
    secret: SharedSecret,
}

impl ConnectAuthorizer {
    pub fn new(secret: SharedSecret) -> Self {
        Self { secret }
    }

    pub fn decide(&self, provided_key: Option<&str>) -> Result<AuthorizationTier> {
        match provided_key.filter(|k| !k.is_empty()) {
            None => {
                tracing::debug!("Connection allowed as anonymous (no API key)");
                Ok(AuthorizationTier::Anonymous)
            }
            Some(key) if self.secret.matches(Some(key)) => {
                tracing::debug!("Connection authorized with valid API key");
                Ok(AuthorizationTier::AuthorizedSender)
            }
            Some(_) => {
                tracing::warn!("Connection denied: invalid API key");
                Err(RelayError::Authorization("Invalid API key".to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret(key: &str) -> SharedSecret {
        SharedSecret::new(Some(key.to_string()))
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq("secret", "secret"));
        assert!(!constant_time_eq("secret", "secreT"));
        assert!(!constant_time_eq("secret", "secret2"));
        assert!(!constant_time_eq("secret", ""));
        assert!(constant_time_eq("", ""));
    }

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token(Some("Bearer abc")), Some("abc"));
        assert_eq!(bearer_token(Some("Basic abc")), None);
        assert_eq!(bearer_token(Some("Bearer ")), None);
        assert_eq!(bearer_token(None), None);
    }

    #[test]
    fn test_shared_secret_unset() {
        let s = SharedSecret::new(None);
        assert!(!s.is_configured());
        assert!(s.allows(None));
        assert!(!s.matches(Some("anything")));

        assert!(!SharedSecret::new(Some(String::new())).is_configured());
    }

    #[test]
    fn test_shared_secret_configured() {
        let s = secret("k");
        assert!(s.allows(Some("k")));
        assert!(!s.allows(Some("x")));
        assert!(!s.allows(None));
    }

    #[test]
    fn test_secret_debug_hides_key() {
        let rendered = format!("{:?}", secret("hunter2"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn test_sender_auth_tier() {
        let s = secret("k");
        assert!(SenderAuth::Tier.permits(AuthorizationTier::AuthorizedSender, None, &s));
        assert!(!SenderAuth::Tier.permits(AuthorizationTier::Anonymous, Some("k"), &s));
    }

    #[test]
    fn test_sender_auth_shared_secret() {
        let s = secret("k");
        assert!(SenderAuth::SharedSecret.permits(AuthorizationTier::Anonymous, Some("k"), &s));
        assert!(!SenderAuth::SharedSecret.permits(AuthorizationTier::AuthorizedSender, None, &s));
        // Unconfigured secret is open access
        assert!(SenderAuth::SharedSecret.permits(
            AuthorizationTier::Anonymous,
            None,
            &SharedSecret::default()
        ));
    }

    #[test]
    fn test_sender_auth_tier_or_secret() {
        let s = secret("k");
        let mode = SenderAuth::TierOrSecret;
        assert!(mode.permits(AuthorizationTier::AuthorizedSender, None, &s));
        assert!(mode.permits(AuthorizationTier::Anonymous, Some("k"), &s));
        assert!(!mode.permits(AuthorizationTier::Anonymous, Some("x"), &s));
        assert!(!mode.permits(AuthorizationTier::Anonymous, None, &s));
        // No configured secret means open access
        let open = SharedSecret::default();
        assert!(mode.permits(AuthorizationTier::Anonymous, None, &open));
        assert!(mode.permits(AuthorizationTier::Anonymous, Some("anything"), &open));
    }

    #[test]
    fn test_check_error_kind() {
        let err = SenderAuth::Tier
            .check(AuthorizationTier::Anonymous, None, &SharedSecret::default())
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Authorization);
        assert_eq!(err.to_string(), "Unauthorized: Invalid API key");
    }

    #[test]
    fn test_connect_authorizer() {
        let authorizer = ConnectAuthorizer::new(secret("k"));
        assert_eq!(authorizer.decide(None).unwrap(), AuthorizationTier::Anonymous);
        assert_eq!(authorizer.decide(Some("")).unwrap(), AuthorizationTier::Anonymous);
        assert_eq!(
            authorizer.decide(Some("k")).unwrap(),
            AuthorizationTier::AuthorizedSender
        );
        assert!(authorizer.decide(Some("bad")).is_err());
    }

    #[test]
    fn test_connect_authorizer_without_secret_denies_keys() {
        let authorizer = ConnectAuthorizer::default();
        assert!(authorizer.decide(Some("k")).is_err());
        assert_eq!(authorizer.decide(None).unwrap(), AuthorizationTier::Anonymous);
    }

    #[test]
    fn test_sender_auth_serde() {
        let mode: SenderAuth = serde_json::from_str("\"tier_or_secret\"").unwrap();
        assert_eq!(mode, SenderAuth::TierOrSecret);
    }
}
