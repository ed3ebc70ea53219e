//! Outbound socket handles
//!
//! A session owns the strong `ConnectionHandle`; its writer task drains the
//! paired receiver into the socket. Once every strong handle is dropped the
//! receiver ends and weak handles stop upgrading.

use super::TransportError;
use tokio::sync::mpsc;

/// Strong handle to a live socket's outbound queue
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    tx: mpsc::Sender<String>,
}

impl ConnectionHandle {
    /// Create a handle and the receiver its socket writer drains
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Queue one serialized frame without waiting
    pub fn deliver(&self, frame: String) -> Result<(), TransportError> {
        self.tx.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                TransportError::Failed("outbound queue full".to_string())
            }
            mpsc::error::TrySendError::Closed(_) => {
                TransportError::Failed("socket writer closed".to_string())
            }
        })
    }

    /// Non-owning reference for caches that must not keep the socket alive
    pub fn downgrade(&self) -> WeakConnectionHandle {
        WeakConnectionHandle {
            tx: self.tx.downgrade(),
        }
    }

    /// Whether the socket writer has gone away
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Weak counterpart of `ConnectionHandle`
#[derive(Debug, Clone)]
pub struct WeakConnectionHandle {
    tx: mpsc::WeakSender<String>,
}

impl WeakConnectionHandle {
    /// Recover the strong handle if its owner still holds it
    pub fn upgrade(&self) -> Option<ConnectionHandle> {
        self.tx.upgrade().map(|tx| ConnectionHandle { tx })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_deliver_reaches_receiver() {
        let (handle, mut rx) = ConnectionHandle::channel(4);
        handle.deliver("hello".to_string()).unwrap();
        assert_eq!(rx.recv().await.as_deref(), Some("hello"));
    }

    #[test]
    fn test_full_queue_fails() {
        let (handle, _rx) = ConnectionHandle::channel(1);
        handle.deliver("a".to_string()).unwrap();
        let err = handle.deliver("b".to_string()).unwrap_err();
        assert!(matches!(err, TransportError::Failed(_)));
    }

    #[test]
    fn test_closed_receiver_fails() {
        let (handle, rx) = ConnectionHandle::channel(4);
        drop(rx);
        assert!(handle.is_closed());
        assert!(handle.deliver("a".to_string()).is_err());
    }

    #[test]
    fn test_weak_handle_dies_with_owner() {
        let (handle, _rx) = ConnectionHandle::channel(4);
        let weak = handle.downgrade();
        assert!(weak.upgrade().is_some());
        drop(handle);
        assert!(weak.upgrade().is_none());
    }
}
