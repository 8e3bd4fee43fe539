//! Connection registry and bookkeeping loop
//!
//! The registry is the set of legs that are currently open. It is owned by a
//! single task, the bookkeeping loop, which applies [`RegistryEvent`]s in the
//! order they arrive and orchestrates shutdown:
//!
//! 1. close the listener,
//! 2. wait for the accept loop to stop,
//! 3. close every leg still registered.

use log::{debug, error, info};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::message::{Leg, LegId, RegistryEvent};

/// Set of live connection legs
#[derive(Debug, Default)]
pub struct Registry {
    legs: HashMap<LegId, Leg>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a leg
    pub fn insert(&mut self, leg: Leg) {
        self.legs.insert(leg.id(), leg);
    }

    /// Remove a leg, returning it if it was registered
    pub fn remove(&mut self, id: LegId) -> Option<Leg> {
        self.legs.remove(&id)
    }

    /// Whether a leg is registered
    #[cfg(test)]
    pub fn contains(&self, id: LegId) -> bool {
        self.legs.contains_key(&id)
    }

    /// Number of registered legs
    pub fn len(&self) -> usize {
        self.legs.len()
    }

    /// Whether the registry is empty
    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.legs.is_empty()
    }

    /// Close and drop every registered leg, returning how many there were
    pub fn close_all(&mut self) -> usize {
        let count = self.legs.len();
        for (_, leg) in self.legs.drain() {
            debug!("Force-closing {}", leg);
            leg.close();
        }
        count
    }

    /// Apply one event
    pub fn apply(&mut self, event: RegistryEvent) {
        match event {
            RegistryEvent::Opened { inbound, outbound } => {
                self.insert(inbound);
                self.insert(outbound);
            }
            RegistryEvent::Closed(id) => {
                if self.remove(id).is_none() {
                    debug!("Closed event for unknown {}", id);
                }
            }
        }
    }
}

/// The registry's owning task
pub(crate) struct Bookkeeper {
    /// Proxy-wide shutdown signal
    shutdown: CancellationToken,
    /// Tells the accept loop to drop the listener
    listener_close: CancellationToken,
    /// Accept loop task, awaited during shutdown
    acceptor: JoinHandle<()>,
    /// Incoming leg events
    events: mpsc::Receiver<RegistryEvent>,
    /// Live legs
    registry: Registry,
    /// Registry size published for observers
    live_legs: Arc<AtomicUsize>,
}

impl Bookkeeper {
    pub(crate) fn new(
        shutdown: CancellationToken,
        listener_close: CancellationToken,
        acceptor: JoinHandle<()>,
        events: mpsc::Receiver<RegistryEvent>,
        live_legs: Arc<AtomicUsize>,
    ) -> Self {
        Self {
            shutdown,
            listener_close,
            acceptor,
            events,
            registry: Registry::new(),
            live_legs,
        }
    }

    /// Run until shutdown, or until every event producer is gone
    ///
    /// Producers are the accept loop, setup tasks, and pumps. They are all
    /// gone once the listener was closed and every session drained.
    pub(crate) async fn run(mut self) {
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    self.shutdown().await;
                    break;
                }
                event = self.events.recv() => match event {
                    Some(event) => {
                        self.registry.apply(event);
                        self.publish();
                    }
                    None => {
                        debug!("All sessions drained, bookkeeping loop exiting");
                        break;
                    }
                }
            }
        }
    }

    async fn shutdown(&mut self) {
        info!("Shutdown requested, closing listener");
        self.listener_close.cancel();

        if let Err(e) = (&mut self.acceptor).await {
            error!("Accept loop task error: {}", e);
        }

        // Refuse new registrations, then take in whatever was already queued
        // so that no session slips past the sweep below.
        self.events.close();
        while let Some(event) = self.events.recv().await {
            self.registry.apply(event);
        }

        let closed = self.registry.close_all();
        self.publish();
        info!("Closed {} connection legs", closed);
    }

    fn publish(&self) {
        self.live_legs.store(self.registry.len(), Ordering::Relaxed);
    }
}
