//! Transport trait: push one envelope to one connection
//!
//! `DirectTransport` writes into a socket handle owned by this process;
//! `GatewayTransport` posts to an external push API for topologies where
//! no process holds the socket.

mod direct;
mod gateway;
mod handle;

pub use direct::DirectTransport;
pub use gateway::GatewayTransport;
pub use handle::{ConnectionHandle, WeakConnectionHandle};

use crate::envelope::Outbound;
use crate::types::Connection;
use async_trait::async_trait;
use thiserror::Error;

/// Why a delivery to one recipient failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The target connection no longer exists
    #[error("connection is gone")]
    Gone,

    /// Any other delivery failure; the handle is assumed dead afterwards
    #[error("send failed: {0}")]
    Failed(String),
}

/// Delivery backend used by the dispatcher
#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver `envelope` to `recipient`
    async fn send(
        &self,
        recipient: &Connection,
        envelope: &Outbound,
    ) -> std::result::Result<(), TransportError>;

    /// Transport name (e.g., "direct", "gateway")
    fn name(&self) -> &str;
}
