//! Direct transport over socket handles held by this process

use super::{Transport, TransportError};
use crate::envelope::Outbound;
use crate::types::Connection;
use async_trait::async_trait;

/// Delivers through the recipient's `ConnectionHandle`
///
/// A recipient without a handle is not owned here and reports `Gone`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectTransport;

#[async_trait]
impl Transport for DirectTransport {
    async fn send(
        &self,
        recipient: &Connection,
        envelope: &Outbound,
    ) -> Result<(), TransportError> {
        let handle = recipient.handle.as_ref().ok_or(TransportError::Gone)?;
        let frame = envelope
            .to_json()
            .map_err(|e| TransportError::Failed(e.to_string()))?;
        handle.deliver(frame)
    }

    fn name(&self) -> &str {
        "direct"
    }
}
