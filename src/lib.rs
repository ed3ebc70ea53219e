//! # a3s-relay
//!
//! Live-translation relay: one privileged producer, many subscribers, each
//! receiving the producer's text in its own language.
//!
//! ## Overview
//!
//! `a3s-relay` tracks connected subscribers in a [`Directory`], and the
//! [`Dispatcher`] turns every inbound utterance into one delivery per
//! recipient, translating once per distinct language. Recipients whose
//! delivery fails are pruned after the pass.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use a3s_relay::{
//!     AuthorizationTier, CredentialBroker, DirectTransport, DispatchOptions, Dispatcher,
//!     LocalDirectory, SharedSecret, TranslationService,
//! };
//!
//! # async fn example() -> a3s_relay::Result<()> {
//! let dispatcher = Dispatcher::new(
//!     Arc::new(LocalDirectory::new()),
//!     Arc::new(DirectTransport),
//!     TranslationService::disabled(),
//!     CredentialBroker::disabled("us-east-1"),
//!     SharedSecret::default(),
//!     DispatchOptions::default(),
//! );
//!
//! dispatcher.connect("producer", AuthorizationTier::AuthorizedSender, None).await?;
//! let report = dispatcher.new_text("producer", "Hello", "12:00:00", None).await?;
//! println!("Delivered to {} connections", report.delivered.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Topologies
//!
//! - **long-running** — [`server`] owns the sockets; [`LocalDirectory`] + [`DirectTransport`]
//! - **stateless** — [`invocation`] handles one gateway event per call;
//!   [`ReplicatedDirectory`] over NATS KV + [`GatewayTransport`]
//!
//! ## Architecture
//!
//! - **Directory** trait — connection registry (local or replicated)
//! - **Transport** trait — push an envelope to one connection
//! - **Dispatcher** — authorization, fan-out, pruning
//! - **Session** — per-connection message pump

pub mod auth;
pub mod cli;
pub mod config;
pub mod credentials;
pub mod directory;
pub mod dispatcher;
pub mod envelope;
pub mod error;
pub mod invocation;
pub mod server;
pub mod session;
pub mod store;
pub mod token;
pub mod translate;
pub mod transport;
pub mod types;

// Re-export core types
pub use auth::{ConnectAuthorizer, SenderAuth, SharedSecret};
pub use config::RelayConfig;
pub use credentials::{CredentialBroker, CredentialIssuer, HttpCredentialIssuer};
pub use directory::{Directory, LocalDirectory, ReplicatedDirectory};
pub use dispatcher::{BroadcastReport, Delivery, DispatchOptions, Dispatcher};
pub use envelope::{Inbound, Outbound};
pub use error::{ErrorKind, RelayError, Result};
pub use session::{Session, SessionState};
pub use store::ConnectionStore;
pub use translate::{HttpTranslator, TranslationService, Translator};
pub use transport::{
    ConnectionHandle, DirectTransport, GatewayTransport, Transport, TransportError,
};
pub use types::{AuthorizationTier, Connection, ConnectionRecord, Credential, TranslatedText};

// Re-export stores for convenience
pub use store::memory::MemoryConnectionStore;
pub use store::nats::{NatsConnectionStore, NatsStoreConfig, StorageType};
