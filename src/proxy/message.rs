//! Registry message types
//!
//! Setup tasks and pumps never touch the connection registry directly. They
//! describe what happened to a leg with a [`RegistryEvent`] and send it to the
//! bookkeeping loop, which is the registry's only writer.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

use crate::common::{ProxyError, Result};

/// Depth of the event channel feeding the bookkeeping loop
pub const EVENT_CHANNEL_CAPACITY: usize = 100;

static NEXT_LEG_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a connection leg
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LegId(u64);

impl fmt::Display for LegId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "leg-{}", self.0)
    }
}

/// Which end of a session a leg belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegSide {
    /// Client-facing leg accepted by the listener
    Inbound,
    /// Remote-facing leg produced by the dialer
    Outbound,
}

impl fmt::Display for LegSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LegSide::Inbound => write!(f, "inbound"),
            LegSide::Outbound => write!(f, "outbound"),
        }
    }
}

/// Handle on one connection leg
///
/// The stream itself is owned by the two pumps of the session; this handle
/// only carries the leg's identity and its close signal. Closing is one-way
/// and idempotent.
#[derive(Debug, Clone)]
pub struct Leg {
    id: LegId,
    side: LegSide,
    peer: String,
    closer: CancellationToken,
}

impl Leg {
    /// Create a handle for a freshly opened leg
    pub fn new(side: LegSide, peer: impl Into<String>) -> Self {
        Self {
            id: LegId(NEXT_LEG_ID.fetch_add(1, Ordering::Relaxed)),
            side,
            peer: peer.into(),
            closer: CancellationToken::new(),
        }
    }

    /// Leg identity
    pub fn id(&self) -> LegId {
        self.id
    }

    /// Close the leg
    pub fn close(&self) {
        self.closer.cancel();
    }

    /// Whether the leg has been closed
    #[cfg(test)]
    pub fn is_closed(&self) -> bool {
        self.closer.is_cancelled()
    }

    /// Resolves once the leg is closed
    pub fn closed(&self) -> WaitForCancellationFuture<'_> {
        self.closer.cancelled()
    }
}

impl fmt::Display for Leg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({})", self.side, self.id, self.peer)
    }
}

/// Events consumed by the bookkeeping loop
#[derive(Debug)]
pub enum RegistryEvent {
    /// Both legs of a new session are paired and about to be pumped
    Opened {
        /// Client-facing leg
        inbound: Leg,
        /// Remote-facing leg
        outbound: Leg,
    },
    /// A pump stopped reading from this leg and closed it
    Closed(LegId),
}

/// Sending side of the bookkeeping loop's event channel
#[derive(Debug, Clone)]
pub struct RegistryHandle {
    sender: mpsc::Sender<RegistryEvent>,
}

impl RegistryHandle {
    /// Register both legs of a session
    ///
    /// Fails once the bookkeeping loop has stopped (the proxy is shutting
    /// down); the caller must then close the legs itself.
    pub async fn register(&self, inbound: Leg, outbound: Leg) -> Result<()> {
        self.sender.send(RegistryEvent::Opened { inbound, outbound }).await
            .map_err(|_| ProxyError::Other("Bookkeeping loop has stopped".to_string()))
    }

    /// Report a leg as closed
    pub async fn deregister(&self, id: LegId) -> Result<()> {
        self.sender.send(RegistryEvent::Closed(id)).await
            .map_err(|_| ProxyError::Other("Bookkeeping loop has stopped".to_string()))
    }
}

/// Create the bookkeeping loop's event channel
pub fn create_channel() -> (RegistryHandle, mpsc::Receiver<RegistryEvent>) {
    let (sender, receiver) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    (RegistryHandle { sender }, receiver)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leg_ids_are_unique() {
        let a = Leg::new(LegSide::Inbound, "127.0.0.1:50000");
        let b = Leg::new(LegSide::Outbound, "redis:6379");
        assert_ne!(a.id(), b.id());
        assert_eq!(a.clone().id(), a.id());
    }

    #[test]
    fn test_leg_close_is_shared_and_idempotent() {
        let leg = Leg::new(LegSide::Inbound, "127.0.0.1:50000");
        let copy = leg.clone();
        assert!(!copy.is_closed());

        leg.close();
        leg.close();
        assert!(copy.is_closed());
    }

    #[tokio::test]
    async fn test_register_fails_after_receiver_dropped() {
        let (handle, receiver) = create_channel();
        drop(receiver);

        let result = handle
            .register(Leg::new(LegSide::Inbound, "a"), Leg::new(LegSide::Outbound, "b"))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_events_arrive_in_order() {
        let (handle, mut receiver) = create_channel();
        let inbound = Leg::new(LegSide::Inbound, "a");
        let outbound = Leg::new(LegSide::Outbound, "b");
        let inbound_id = inbound.id();

        handle.register(inbound, outbound).await.unwrap();
        handle.deregister(inbound_id).await.unwrap();

        assert!(matches!(receiver.recv().await, Some(RegistryEvent::Opened { .. })));
        match receiver.recv().await {
            Some(RegistryEvent::Closed(id)) => assert_eq!(id, inbound_id),
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
