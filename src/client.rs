//! Opaque handles to transport connections.

use crate::events::{CoreEvent, EventSink};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::instrument;
use uuid::Uuid;

/// Identity of one connection. Two handles are the same client only if they
/// carry the same id, never because they look alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClientId(Uuid);

impl ClientId {
    fn fresh() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Why an outbound message was not queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum DeliveryFailure {
    /// The client's send queue is full.
    #[display("send queue full")]
    Full,
    /// The connection is gone.
    #[display("connection closed")]
    Closed,
}

/// Handle to a connected client.
///
/// The transport owns the connection; the core only holds this handle and
/// writes serialized messages into the client's bounded send queue. Equality
/// and hashing use [`ClientId`] only.
#[derive(Debug, Clone)]
pub struct ClientRef {
    id: ClientId,
    outbound: mpsc::Sender<Vec<u8>>,
}

impl ClientRef {
    /// Creates a handle and the receiving end of its send queue.
    #[instrument]
    pub fn new(send_capacity: usize) -> (Self, mpsc::Receiver<Vec<u8>>) {
        let (outbound, receiver) = mpsc::channel(send_capacity.max(1));
        let client = Self {
            id: ClientId::fresh(),
            outbound,
        };
        (client, receiver)
    }

    /// Returns the connection identity.
    pub fn id(&self) -> ClientId {
        self.id
    }

    /// Queues `bytes` without waiting. Messages that do not fit are dropped.
    pub fn send(&self, bytes: Vec<u8>) -> Result<(), DeliveryFailure> {
        self.outbound.try_send(bytes).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeliveryFailure::Full,
            mpsc::error::TrySendError::Closed(_) => DeliveryFailure::Closed,
        })
    }
}

impl PartialEq for ClientRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ClientRef {}

impl std::hash::Hash for ClientRef {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Queues `bytes` for `client`, reporting a drop to the event sink.
///
/// Delivery is at-most-once: nothing is retried.
pub fn deliver(events: &dyn EventSink, client: &ClientRef, bytes: Vec<u8>) {
    if let Err(reason) = client.send(bytes) {
        events.emit(CoreEvent::DeliveryDropped {
            client: client.id(),
            reason,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_equality() {
        let (a, _rx_a) = ClientRef::new(4);
        let (b, _rx_b) = ClientRef::new(4);
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn test_send_full_and_closed() {
        let (client, rx) = ClientRef::new(1);
        assert!(client.send(b"one".to_vec()).is_ok());
        assert_eq!(client.send(b"two".to_vec()), Err(DeliveryFailure::Full));
        drop(rx);
        assert_eq!(client.send(b"three".to_vec()), Err(DeliveryFailure::Closed));
    }
}
