//! Fan-out dispatch engine
//!
//! Turns inbound envelopes into per-recipient deliveries. A broadcast works
//! on a directory snapshot, sends every delivery concurrently, and prunes
//! failed recipients only after the full pass.

use crate::auth::{bearer_token, SenderAuth, SharedSecret};
use crate::config::{DispatchConfig, RelayConfig};
use crate::credentials::CredentialBroker;
use crate::directory::Directory;
use crate::envelope::{Inbound, Outbound};
use crate::error::{RelayError, Result};
use crate::transport::{ConnectionHandle, Transport, TransportError};
use crate::translate::TranslationService;
use crate::types::{
    normalize_language, AuthorizationTier, Connection, Credential, TranslatedText,
    DEFAULT_LANGUAGE,
};
use futures::future::join_all;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// Dispatch policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchOptions {
    pub sender_auth: SenderAuth,
    pub exclude_sender: bool,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            sender_auth: SenderAuth::default(),
            exclude_sender: true,
        }
    }
}

impl From<&DispatchConfig> for DispatchOptions {
    fn from(config: &DispatchConfig) -> Self {
        Self {
            sender_auth: config.sender_auth,
            exclude_sender: config.exclude_sender,
        }
    }
}

/// One resolved recipient and its payload
#[derive(Debug, Clone)]
pub struct Delivery {
    pub recipient: Connection,
    pub envelope: Outbound,
}

/// Outcome of one broadcast pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: Vec<String>,
    pub pruned: Vec<String>,
}

impl BroadcastReport {
    pub fn attempted(&self) -> usize {
        self.delivered.len() + self.pruned.len()
    }
}

/// Routes envelopes between connections
pub struct Dispatcher {
    directory: Arc<dyn Directory>,
    transport: Arc<dyn Transport>,
    translation: TranslationService,
    credentials: CredentialBroker,
    secret: SharedSecret,
    options: DispatchOptions,
}

impl Dispatcher {
    pub fn new(
        directory: Arc<dyn Directory>,
        transport: Arc<dyn Transport>,
        translation: TranslationService,
        credentials: CredentialBroker,
        secret: SharedSecret,
        options: DispatchOptions,
    ) -> Self {
        Self {
            directory,
            transport,
            translation,
            credentials,
            secret,
            options,
        }
    }

    /// Wire a dispatcher from configuration around an existing directory and transport
    pub fn from_config(
        config: &RelayConfig,
        directory: Arc<dyn Directory>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        Ok(Self::new(
            directory,
            transport,
            TranslationService::from_config(&config.translation)?,
            CredentialBroker::from_config(&config.credentials, &config.region)?,
            SharedSecret::new(config.api_key.clone()),
            DispatchOptions::from(&config.dispatch),
        ))
    }

    pub fn directory(&self) -> &Arc<dyn Directory> {
        &self.directory
    }

    pub fn translation(&self) -> &TranslationService {
        &self.translation
    }

    pub fn credentials(&self) -> &CredentialBroker {
        &self.credentials
    }

    pub fn secret(&self) -> &SharedSecret {
        &self.secret
    }

    pub fn options(&self) -> DispatchOptions {
        self.options
    }

    /// Register a connection and build its `connection_status` envelope
    pub async fn connect(
        &self,
        id: &str,
        tier: AuthorizationTier,
        handle: Option<ConnectionHandle>,
    ) -> Result<Outbound> {
        let mut connection = Connection::new(id).with_tier(tier);
        connection.handle = handle;
        self.directory.add(connection).await?;

        tracing::info!(
            connection = %id,
            tier = ?tier,
            directory = self.directory.name(),
            "Client connected"
        );
        Ok(self.status())
    }

    /// Forget a connection
    pub async fn disconnect(&self, id: &str) {
        self.directory.remove(id).await;
        tracing::info!(connection = %id, "Client disconnected");
    }

    /// `connection_status` reflecting current translation availability
    pub fn status(&self) -> Outbound {
        Outbound::connected(self.translation.is_available())
    }

    /// Route one inbound envelope from `sender`
    ///
    /// Returns the reply for the sender, if any. Errors are meant for the
    /// sender as well (`Outbound::from(&err)`); the connection stays open.
    pub async fn handle_envelope(
        &self,
        sender: &str,
        message: Inbound,
    ) -> Result<Option<Outbound>> {
        tracing::debug!(connection = %sender, kind = message.kind(), "Envelope received");

        match message {
            Inbound::SetLanguage { language } => {
                Ok(Some(self.set_language(sender, &language).await))
            }
            Inbound::NewText {
                text,
                timestamp,
                api_key,
            } => {
                self.new_text(sender, &text, &timestamp, api_key.as_deref())
                    .await?;
                Ok(None)
            }
            Inbound::RequestTranslation {
                text,
                target_language,
            } => Ok(Some(self.request_translation(&text, &target_language).await)),
            Inbound::GenerateToken {
                api_key,
                session_name,
            } => {
                let credential = self
                    .generate_token(sender, api_key.as_deref(), session_name.as_deref())
                    .await?;
                Ok(Some(Outbound::token(credential)))
            }
        }
    }

    /// Update a connection's language; never fails from the sender's view
    pub async fn set_language(&self, id: &str, language: &str) -> Outbound {
        match self.directory.set_language(id, language).await {
            Ok(true) => Outbound::LanguageSet {
                language: normalize_language(language),
            },
            Ok(false) => {
                tracing::warn!(connection = %id, "Language update for unknown connection");
                Outbound::error("Failed to update language preference")
            }
            Err(e) => {
                tracing::error!(connection = %id, error = %e, "Language update failed");
                Outbound::error("Failed to update language preference")
            }
        }
    }

    /// Authorize the sender, then fan `text` out to every other recipient
    pub async fn new_text(
        &self,
        sender: &str,
        text: &str,
        timestamp: &str,
        api_key: Option<&str>,
    ) -> Result<BroadcastReport> {
        self.authorize_sender(sender, api_key).await?;

        let exclude = self.options.exclude_sender.then_some(sender);
        let deliveries = self.prepare_fan_out(text, timestamp, exclude).await?;
        let report = self.broadcast(deliveries).await;

        tracing::info!(
            connection = %sender,
            delivered = report.delivered.len(),
            pruned = report.pruned.len(),
            "Text broadcast"
        );
        Ok(report)
    }

    /// Resolve one `translated_text` delivery per recipient
    ///
    /// Translates once per distinct non-default language, concurrently.
    pub async fn prepare_fan_out(
        &self,
        text: &str,
        timestamp: &str,
        exclude: Option<&str>,
    ) -> Result<Vec<Delivery>> {
        let recipients: Vec<Connection> = self
            .directory
            .snapshot()
            .await?
            .into_iter()
            .filter(|c| Some(c.id.as_str()) != exclude)
            .collect();

        let languages: BTreeSet<&str> = recipients
            .iter()
            .map(|c| c.language.as_str())
            .filter(|l| *l != DEFAULT_LANGUAGE)
            .collect();

        let translated = join_all(languages.into_iter().map(|language| async move {
            let translated = self.translation.translate(text, language).await;
            (language.to_string(), translated)
        }))
        .await;
        let translations: HashMap<String, String> = translated.into_iter().collect();

        Ok(recipients
            .into_iter()
            .map(|recipient| {
                let translated = translations
                    .get(&recipient.language)
                    .cloned()
                    .unwrap_or_else(|| text.to_string());
                let envelope = Outbound::TranslatedText(TranslatedText {
                    text: translated,
                    original: text.to_string(),
                    timestamp: timestamp.to_string(),
                    language: recipient.language.clone(),
                });
                Delivery {
                    recipient,
                    envelope,
                }
            })
            .collect())
    }

    /// Send every delivery concurrently, then prune the failures
    pub async fn broadcast(&self, deliveries: Vec<Delivery>) -> BroadcastReport {
        let transport = self.transport.as_ref();
        let results = join_all(deliveries.iter().map(|delivery| async move {
            let outcome = transport.send(&delivery.recipient, &delivery.envelope).await;
            (delivery.recipient.id.as_str(), outcome)
        }))
        .await;

        let mut report = BroadcastReport::default();
        for (id, outcome) in results {
            match outcome {
                Ok(()) => report.delivered.push(id.to_string()),
                Err(TransportError::Gone) => {
                    tracing::info!(connection = %id, "Connection is gone, removing");
                    report.pruned.push(id.to_string());
                }
                Err(TransportError::Failed(reason)) => {
                    tracing::warn!(
                        connection = %id,
                        transport = transport.name(),
                        error = %reason,
                        "Delivery failed, removing"
                    );
                    report.pruned.push(id.to_string());
                }
            }
        }

        for id in &report.pruned {
            self.directory.remove(id).await;
        }
        report
    }

    /// Push one envelope to one connection, pruning it if the push fails
    pub async fn send_to(&self, id: &str, envelope: &Outbound) -> bool {
        let recipient = match self.directory.get(id).await {
            Ok(Some(connection)) => connection,
            Ok(None) => Connection::new(id),
            Err(e) => {
                tracing::warn!(connection = %id, error = %e, "Directory lookup failed");
                Connection::new(id)
            }
        };

        match self.transport.send(&recipient, envelope).await {
            Ok(()) => true,
            Err(TransportError::Gone) => {
                tracing::info!(connection = %id, "Connection is gone, removing");
                self.directory.remove(id).await;
                false
            }
            Err(TransportError::Failed(reason)) => {
                tracing::error!(
                    connection = %id,
                    error = %reason,
                    "Error sending to connection"
                );
                false
            }
        }
    }

    /// One-off translation for the sender
    pub async fn request_translation(&self, text: &str, target_language: &str) -> Outbound {
        let translated = self.translation.translate(text, target_language).await;
        Outbound::TranslationResult {
            original: text.to_string(),
            translated,
            language: target_language.to_string(),
        }
    }

    /// Issue credentials to an authorized sender
    pub async fn generate_token(
        &self,
        sender: &str,
        api_key: Option<&str>,
        session_name: Option<&str>,
    ) -> Result<Credential> {
        self.authorize_sender(sender, api_key).await?;
        self.credentials.issue(session_name).await
    }

    /// Issue credentials for an HTTP request carrying `Authorization: Bearer <key>`
    pub async fn token_request(&self, authorization: Option<&str>) -> Result<Credential> {
        let key = bearer_token(authorization).ok_or_else(|| {
            RelayError::Authorization("Missing or invalid Authorization header".to_string())
        })?;
        if !self.secret.allows(Some(key)) {
            tracing::warn!("Token request with invalid API key");
            return Err(RelayError::Authorization("Invalid API key".to_string()));
        }
        self.credentials.issue(None).await
    }

    async fn authorize_sender(&self, sender: &str, api_key: Option<&str>) -> Result<()> {
        let tier = match self.directory.get(sender).await {
            Ok(Some(connection)) => connection.tier,
            Ok(None) => AuthorizationTier::Anonymous,
            Err(e) => {
                tracing::warn!(connection = %sender, error = %e, "Sender lookup failed");
                AuthorizationTier::Anonymous
            }
        };

        self.options
            .sender_auth
            .check(tier, api_key, &self.secret)
            .inspect_err(|_| {
                tracing::warn!(connection = %sender, tier = ?tier, "Unauthorized sender");
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::LocalDirectory;
    use crate::translate::Translator;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Records sends; ids in `fail` are `Failed`, ids in `gone` are `Gone`
    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<(String, Outbound)>>,
        fail: Vec<String>,
        gone: Vec<String>,
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn send(
            &self,
            recipient: &Connection,
            envelope: &Outbound,
        ) -> std::result::Result<(), TransportError> {
            if self.gone.contains(&recipient.id) {
                return Err(TransportError::Gone);
            }
            if self.fail.contains(&recipient.id) {
                return Err(TransportError::Failed("boom".to_string()));
            }
            self.sent
                .lock()
                .unwrap()
                .push((recipient.id.clone(), envelope.clone()));
            Ok(())
        }
        fn name(&self) -> &str {
            "recording"
        }
    }

    struct Tagging {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Translator for Tagging {
        async fn translate(&self, text: &str, _source: &str, target: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("{}:{}", target, text))
        }
        fn name(&self) -> &str {
            "tagging"
        }
    }

    struct Fixture {
        dispatcher: Dispatcher,
        directory: Arc<LocalDirectory>,
        transport: Arc<RecordingTransport>,
        translator: Arc<Tagging>,
    }

    fn fixture(transport: RecordingTransport, secret: Option<&str>) -> Fixture {
        let directory = Arc::new(LocalDirectory::new());
        let transport = Arc::new(transport);
        let translator = Arc::new(Tagging {
            calls: AtomicUsize::new(0),
        });
        let dispatcher = Dispatcher::new(
            directory.clone(),
            transport.clone(),
            TranslationService::new(Some(translator.clone())),
            CredentialBroker::disabled("us-east-1"),
            SharedSecret::new(secret.map(|s| s.to_string())),
            DispatchOptions::default(),
        );
        Fixture {
            dispatcher,
            directory,
            transport,
            translator,
        }
    }

    fn sent_to(transport: &RecordingTransport, id: &str) -> Vec<Outbound> {
        transport
            .sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(to, _)| to == id)
            .map(|(_, e)| e.clone())
            .collect()
    }

    #[tokio::test]
    async fn test_connect_reports_translation() {
        let f = fixture(RecordingTransport::default(), None);
        let status = f
            .dispatcher
            .connect("c1", AuthorizationTier::Anonymous, None)
            .await
            .unwrap();
        assert_eq!(status, Outbound::connected(true));
        assert_eq!(f.directory.count().await, 1);
    }

    #[tokio::test]
    async fn test_two_recipients_two_deliveries() {
        let f = fixture(RecordingTransport::default(), None);
        let d = &f.dispatcher;
        d.connect("p", AuthorizationTier::AuthorizedSender, None).await.unwrap();
        d.connect("a", AuthorizationTier::Anonymous, None).await.unwrap();
        d.connect("b", AuthorizationTier::Anonymous, None).await.unwrap();
        d.set_language("b", "es").await;

        let report = d.new_text("p", "Hello", "12:00:00", None).await.unwrap();
        assert_eq!(report.attempted(), 2);
        assert!(report.pruned.is_empty());

        let a = sent_to(&f.transport, "a");
        assert_eq!(
            a,
            vec![Outbound::TranslatedText(TranslatedText {
                text: "Hello".to_string(),
                original: "Hello".to_string(),
                timestamp: "12:00:00".to_string(),
                language: "en".to_string(),
            })]
        );

        match &sent_to(&f.transport, "b")[0] {
            Outbound::TranslatedText(t) => {
                assert_eq!(t.text, "es:Hello");
                assert_eq!(t.original, "Hello");
                assert_eq!(t.language, "es");
            }
            other => panic!("unexpected envelope: {:?}", other),
        }
        assert!(sent_to(&f.transport, "p").is_empty());
    }

    #[tokio::test]
    async fn test_failed_recipient_pruned() {
        let f = fixture(
            RecordingTransport {
                fail: vec!["b".to_string()],
                gone: vec!["c".to_string()],
                ..Default::default()
            },
            None,
        );
        let d = &f.dispatcher;
        d.connect("p", AuthorizationTier::AuthorizedSender, None).await.unwrap();
        for id in ["a", "b", "c"] {
            d.connect(id, AuthorizationTier::Anonymous, None).await.unwrap();
        }

        let report = d.new_text("p", "hi", "t", None).await.unwrap();
        assert_eq!(report.delivered, vec!["a".to_string()]);
        let mut pruned = report.pruned.clone();
        pruned.sort();
        assert_eq!(pruned, vec!["b".to_string(), "c".to_string()]);

        assert!(f.directory.get("a").await.unwrap().is_some());
        assert!(f.directory.get("b").await.unwrap().is_none());
        assert!(f.directory.get("c").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_anonymous_sender_rejected() {
        let f = fixture(RecordingTransport::default(), Some("k"));
        let d = &f.dispatcher;
        d.connect("anon", AuthorizationTier::Anonymous, None).await.unwrap();
        d.connect("other", AuthorizationTier::Anonymous, None).await.unwrap();

        let err = d.new_text("anon", "hi", "t", Some("wrong")).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Authorization);
        assert!(f.transport.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_secret_authorizes_anonymous_sender() {
        let f = fixture(RecordingTransport::default(), Some("k"));
        let d = &f.dispatcher;
        d.connect("anon", AuthorizationTier::Anonymous, None).await.unwrap();
        d.connect("other", AuthorizationTier::Anonymous, None).await.unwrap();

        let report = d.new_text("anon", "hi", "t", Some("k")).await.unwrap();
        assert_eq!(report.delivered, vec!["other".to_string()]);
    }

    #[tokio::test]
    async fn test_no_secret_configured_is_open() {
        let f = fixture(RecordingTransport::default(), None);
        let d = &f.dispatcher;
        d.connect("anon", AuthorizationTier::Anonymous, None).await.unwrap();
        d.connect("other", AuthorizationTier::Anonymous, None).await.unwrap();

        let report = d.new_text("anon", "hi", "t", None).await.unwrap();
        assert_eq!(report.delivered, vec!["other".to_string()]);

        let report = d.new_text("anon", "hi", "t", Some("anything")).await.unwrap();
        assert_eq!(report.delivered, vec!["other".to_string()]);
    }

    #[tokio::test]
    async fn test_translate_once_per_language() {
        let f = fixture(RecordingTransport::default(), None);
        let d = &f.dispatcher;
        d.connect("p", AuthorizationTier::AuthorizedSender, None).await.unwrap();
        for (id, lang) in [("a", "es"), ("b", "es"), ("c", "fr"), ("d", "en")] {
            d.connect(id, AuthorizationTier::Anonymous, None).await.unwrap();
            d.set_language(id, lang).await;
        }

        d.new_text("p", "hi", "t", None).await.unwrap();
        assert_eq!(f.translator.calls.load(Ordering::SeqCst), 2);
        assert_eq!(f.transport.sent.lock().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_include_sender_when_configured() {
        let f = fixture(RecordingTransport::default(), None);
        let d = Dispatcher {
            options: DispatchOptions {
                exclude_sender: false,
                ..Default::default()
            },
            ..f.dispatcher
        };
        d.connect("p", AuthorizationTier::AuthorizedSender, None).await.unwrap();

        let report = d.new_text("p", "hi", "t", None).await.unwrap();
        assert_eq!(report.delivered, vec!["p".to_string()]);
    }

    #[tokio::test]
    async fn test_set_language_replies() {
        let f = fixture(RecordingTransport::default(), None);
        let d = &f.dispatcher;
        d.connect("c", AuthorizationTier::Anonymous, None).await.unwrap();

        assert_eq!(
            d.set_language("c", "de").await,
            Outbound::LanguageSet {
                language: "de".to_string()
            }
        );
        assert_eq!(
            d.set_language("ghost", "de").await,
            Outbound::error("Failed to update language preference")
        );
    }

    #[tokio::test]
    async fn test_request_translation_default_language() {
        let f = fixture(RecordingTransport::default(), None);
        let reply = f.dispatcher.request_translation("hello", "en").await;
        assert_eq!(
            reply,
            Outbound::TranslationResult {
                original: "hello".to_string(),
                translated: "hello".to_string(),
                language: "en".to_string(),
            }
        );
        assert_eq!(f.translator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_handle_envelope_routes() {
        let f = fixture(RecordingTransport::default(), Some("k"));
        let d = &f.dispatcher;
        d.connect("c", AuthorizationTier::Anonymous, None).await.unwrap();

        let reply = d
            .handle_envelope(
                "c",
                Inbound::RequestTranslation {
                    text: "hi".to_string(),
                    target_language: "it".to_string(),
                },
            )
            .await
            .unwrap();
        assert!(matches!(reply, Some(Outbound::TranslationResult { .. })));

        let err = d
            .handle_envelope(
                "c",
                Inbound::NewText {
                    text: "hi".to_string(),
                    timestamp: "t".to_string(),
                    api_key: None,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(Outbound::from(&err), Outbound::error("Unauthorized: Invalid API key"));
    }

    #[tokio::test]
    async fn test_generate_token_not_configured() {
        let f = fixture(RecordingTransport::default(), None);
        let d = &f.dispatcher;
        d.connect("p", AuthorizationTier::AuthorizedSender, None).await.unwrap();

        let err = d.generate_token("p", None, None).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::NotConfigured);
    }

    #[tokio::test]
    async fn test_token_request_header_checks() {
        let f = fixture(RecordingTransport::default(), Some("k"));
        let d = &f.dispatcher;

        let missing = d.token_request(None).await.unwrap_err();
        assert_eq!(missing.kind(), crate::error::ErrorKind::Authorization);
        assert!(missing.to_string().contains("Unauthorized"));

        let basic = d.token_request(Some("Basic k")).await.unwrap_err();
        assert_eq!(basic.kind(), crate::error::ErrorKind::Authorization);

        let wrong = d.token_request(Some("Bearer x")).await.unwrap_err();
        assert!(wrong.to_string().contains("Invalid API key"));

        // Valid key reaches the (unconfigured) broker
        let ok_key = d.token_request(Some("Bearer k")).await.unwrap_err();
        assert_eq!(ok_key.kind(), crate::error::ErrorKind::NotConfigured);
    }

    #[tokio::test]
    async fn test_send_to_gone_prunes() {
        let f = fixture(
            RecordingTransport {
                gone: vec!["c".to_string()],
                ..Default::default()
            },
            None,
        );
        f.dispatcher
            .connect("c", AuthorizationTier::Anonymous, None)
            .await
            .unwrap();

        assert!(!f.dispatcher.send_to("c", &Outbound::connected(true)).await);
        assert_eq!(f.directory.count().await, 0);
    }
}
