//! Per-connection message pump for the long-running topology
//!
//! A session registers its connection, feeds every inbound frame to the
//! dispatcher, and replies through its own outbound handle. `on_close`
//! runs exactly once on every exit path: end of stream, read error, or a
//! failed registration.

use crate::dispatcher::Dispatcher;
use crate::envelope::{Inbound, Outbound};
use crate::error::Result;
use crate::transport::ConnectionHandle;
use crate::types::AuthorizationTier;
use futures::{Stream, StreamExt};
use std::fmt::Display;
use std::sync::Arc;

/// Connection lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Accepted, not yet in the directory
    Connecting,
    /// Registered; receives fan-out
    Active,
    /// Removed from the directory; terminal
    Closed,
}

/// One accepted connection
pub struct Session {
    id: String,
    tier: AuthorizationTier,
    handle: ConnectionHandle,
    dispatcher: Arc<Dispatcher>,
    state: SessionState,
}

impl Session {
    /// New session with a fresh UUID v4 id
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        tier: AuthorizationTier,
        handle: ConnectionHandle,
    ) -> Self {
        Self::with_id(uuid::Uuid::new_v4().to_string(), dispatcher, tier, handle)
    }

    pub fn with_id(
        id: impl Into<String>,
        dispatcher: Arc<Dispatcher>,
        tier: AuthorizationTier,
        handle: ConnectionHandle,
    ) -> Self {
        Self {
            id: id.into(),
            tier,
            handle,
            dispatcher,
            state: SessionState::Connecting,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Pump `frames` until end of stream or a read error
    pub async fn run<S, E>(mut self, frames: S) -> SessionState
    where
        S: Stream<Item = std::result::Result<String, E>>,
        E: Display,
    {
        if let Err(e) = self.on_open().await {
            tracing::error!(connection = %self.id, error = %e, "Failed to register connection");
            self.on_close().await;
            return self.state;
        }

        let mut frames = std::pin::pin!(frames);
        loop {
            match frames.next().await {
                Some(Ok(raw)) => self.on_message(&raw).await,
                Some(Err(e)) => {
                    tracing::warn!(
                        connection = %self.id,
                        error = %e,
                        "Read error, closing session"
                    );
                    break;
                }
                None => break,
            }
        }

        self.on_close().await;
        self.state
    }

    async fn on_open(&mut self) -> Result<()> {
        let status = self
            .dispatcher
            .connect(&self.id, self.tier, Some(self.handle.clone()))
            .await?;
        self.state = SessionState::Active;
        self.reply(&status);
        Ok(())
    }

    async fn on_message(&self, raw: &str) {
        let reply = match Inbound::parse(raw) {
            Ok(message) => match self.dispatcher.handle_envelope(&self.id, message).await {
                Ok(reply) => reply,
                Err(e) => Some(Outbound::from(&e)),
            },
            Err(e) => {
                tracing::warn!(connection = %self.id, error = %e, "Rejected envelope");
                Some(Outbound::from(&e))
            }
        };

        if let Some(reply) = reply {
            self.reply(&reply);
        }
    }

    async fn on_close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.dispatcher.disconnect(&self.id).await;
        self.state = SessionState::Closed;
    }

    fn reply(&self, envelope: &Outbound) {
        let frame = match envelope.to_json() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(connection = %self.id, error = %e, "Failed to encode reply");
                return;
            }
        };
        if let Err(e) = self.handle.deliver(frame) {
            tracing::warn!(connection = %self.id, error = %e, "Failed to queue reply");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::SharedSecret;
    use crate::credentials::CredentialBroker;
    use crate::directory::{Directory, LocalDirectory};
    use crate::dispatcher::DispatchOptions;
    use crate::transport::DirectTransport;
    use crate::translate::TranslationService;
    use tokio::sync::mpsc;

    fn dispatcher(directory: Arc<LocalDirectory>) -> Arc<Dispatcher> {
        Arc::new(Dispatcher::new(
            directory,
            Arc::new(DirectTransport),
            TranslationService::disabled(),
            CredentialBroker::disabled("us-east-1"),
            SharedSecret::default(),
            DispatchOptions::default(),
        ))
    }

    type Frame = std::result::Result<String, String>;

    fn frames(items: Vec<std::result::Result<&str, &str>>) -> impl Stream<Item = Frame> {
        futures::stream::iter(
            items
                .into_iter()
                .map(|r| r.map(|s| s.to_string()).map_err(|e| e.to_string()))
                .collect::<Vec<_>>(),
        )
    }

    async fn drain(rx: &mut mpsc::Receiver<String>) -> Vec<serde_json::Value> {
        let mut out = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            out.push(serde_json::from_str(&frame).unwrap());
        }
        out
    }

    #[tokio::test]
    async fn test_status_then_language_set() {
        let directory = Arc::new(LocalDirectory::new());
        let (handle, mut rx) = ConnectionHandle::channel(16);
        let session = Session::with_id(
            "s1",
            dispatcher(directory.clone()),
            AuthorizationTier::Anonymous,
            handle,
        );

        let state = session
            .run(frames(vec![Ok(r#"{"type":"set_language","data":{"language":"es"}}"#)]))
            .await;

        assert_eq!(state, SessionState::Closed);
        let replies = drain(&mut rx).await;
        assert_eq!(replies[0]["type"], "connection_status");
        assert_eq!(replies[0]["data"]["status"], "connected");
        assert_eq!(replies[1]["type"], "language_set");
        assert_eq!(replies[1]["data"]["language"], "es");
        assert_eq!(directory.count().await, 0);
    }

    #[tokio::test]
    async fn test_bad_frames_keep_session_open() {
        let directory = Arc::new(LocalDirectory::new());
        let (handle, mut rx) = ConnectionHandle::channel(16);
        let session = Session::with_id(
            "s1",
            dispatcher(directory),
            AuthorizationTier::Anonymous,
            handle,
        );

        session
            .run(frames(vec![
                Ok("not json"),
                Ok(r#"{"type":"foo","data":{}}"#),
                Ok(r#"{"type":"request_translation","data":{"text":"hi","target_language":"es"}}"#),
            ]))
            .await;

        let replies = drain(&mut rx).await;
        assert_eq!(replies.len(), 4);
        assert_eq!(replies[1]["type"], "error");
        assert_eq!(replies[2]["data"]["message"], "Unknown message type: foo");
        assert_eq!(replies[3]["type"], "translation_result");
        assert_eq!(replies[3]["data"]["translated"], "hi");
    }

    #[tokio::test]
    async fn test_read_error_runs_cleanup() {
        let directory = Arc::new(LocalDirectory::new());
        let (handle, _rx) = ConnectionHandle::channel(16);
        let session = Session::with_id(
            "s1",
            dispatcher(directory.clone()),
            AuthorizationTier::Anonymous,
            handle,
        );

        let state = session
            .run(frames(vec![
                Err("connection reset"),
                Ok(r#"{"type":"set_language","data":{}}"#),
            ]))
            .await;

        assert_eq!(state, SessionState::Closed);
        assert!(directory.get("s1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_active_while_streaming() {
        let directory = Arc::new(LocalDirectory::new());
        let (handle, mut rx) = ConnectionHandle::channel(16);
        let (tx, frames_rx) = mpsc::channel::<Frame>(4);
        let session = Session::with_id(
            "s1",
            dispatcher(directory.clone()),
            AuthorizationTier::Anonymous,
            handle,
        );
        assert_eq!(session.state(), SessionState::Connecting);

        let stream = tokio_stream::wrappers::ReceiverStream::new(frames_rx);
        let task = tokio::spawn(session.run(stream));

        // connection_status arrives once registered
        let first = rx.recv().await.unwrap();
        assert!(first.contains("connection_status"));
        assert_eq!(directory.count().await, 1);

        drop(tx);
        assert_eq!(task.await.unwrap(), SessionState::Closed);
        assert_eq!(directory.count().await, 0);
    }
}
