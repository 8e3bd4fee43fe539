//! Proxy server module
//!
//! This module implements the proxy coordinator: it binds the listening
//! socket, runs the accept loop and the bookkeeping loop, and exposes the
//! handle used to wait for or stop the proxy.

use log::{debug, info, warn};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::common::{normalize_listen_addr, ProxyError, Result};
use crate::ssh::{SshClientConfig, SshDialer};
use super::dialer::RemoteDialer;
use super::handler::{handle_connection, SessionContext};
use super::message::create_channel;
use super::registry::Bookkeeper;

/// First delay after a failed accept
const ACCEPT_BACKOFF_MIN: Duration = Duration::from_millis(10);

/// Upper bound for the accept backoff
const ACCEPT_BACKOFF_MAX: Duration = Duration::from_secs(1);

/// Fixed TCP proxy
///
/// Forwards every connection accepted on the listen address to one remote
/// address, obtained through a [`RemoteDialer`]. The proxy starts running as
/// soon as it is constructed and keeps running until its cancellation token
/// (a child of the one passed to [`Proxy::bind`]) fires, or until
/// [`Proxy::close_and_wait`] closes the listener and the remaining sessions
/// drain.
pub struct Proxy {
    /// Address the listener is bound to
    local_addr: SocketAddr,
    /// Address every connection is forwarded to
    remote_addr: Arc<str>,
    /// Shutdown signal, derived from the caller's token
    shutdown: CancellationToken,
    /// Closes the listener without touching established sessions
    listener_close: CancellationToken,
    /// Accept loop, bookkeeping loop, setup tasks and pumps
    tasks: TaskTracker,
    /// Number of registered legs, as last published by the bookkeeping loop
    live_legs: Arc<AtomicUsize>,
}

impl Proxy {
    /// Create and start a proxy
    ///
    /// # Parameters
    ///
    /// * `parent` - Lifetime of the proxy; cancelling it shuts the proxy down
    /// * `listen_addr` - Local address to accept on (`host:port` or `:port`)
    /// * `remote_addr` - Address passed to the dialer for every connection
    /// * `dialer` - How the remote address is reached
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::InvalidArgument`] for an empty address, before
    /// anything is bound, and [`ProxyError::Bind`] if the listen address
    /// cannot be bound. No background work is left running on failure.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use std::sync::Arc;
    /// # use tcp_over_ssh::proxy::{Proxy, dialer_fn};
    /// # use tcp_over_ssh::ProxyError;
    /// # use tokio_util::sync::CancellationToken;
    /// # async fn run() -> tcp_over_ssh::Result<()> {
    /// let dialer = dialer_fn(|addr: String| async move {
    ///     tokio::net::TcpStream::connect(addr).await.map_err(ProxyError::from)
    /// });
    /// let shutdown = CancellationToken::new();
    /// let proxy = Proxy::bind(&shutdown, "127.0.0.1:9877", "127.0.0.1:6379", Arc::new(dialer)).await?;
    /// proxy.wait().await;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn bind(
        parent: &CancellationToken,
        listen_addr: &str,
        remote_addr: &str,
        dialer: Arc<dyn RemoteDialer>,
    ) -> Result<Self> {
        if listen_addr.trim().is_empty() {
            return Err(ProxyError::InvalidArgument("listen address is empty".to_string()));
        }
        if remote_addr.trim().is_empty() {
            return Err(ProxyError::InvalidArgument("remote address is empty".to_string()));
        }

        let listen_addr = normalize_listen_addr(listen_addr);
        let listener = TcpListener::bind(&listen_addr).await
            .map_err(|source| ProxyError::Bind { addr: listen_addr.clone(), source })?;
        let local_addr = listener.local_addr()?;

        let remote_addr: Arc<str> = Arc::from(remote_addr.trim());
        let shutdown = parent.child_token();
        let listener_close = CancellationToken::new();
        let tasks = TaskTracker::new();
        let live_legs = Arc::new(AtomicUsize::new(0));
        let (registry, events) = create_channel();

        let acceptor = Acceptor {
            listener,
            local_addr,
            listener_close: listener_close.clone(),
            session: SessionContext {
                remote_addr: Arc::clone(&remote_addr),
                dialer,
                registry,
                shutdown: shutdown.clone(),
                tracker: tasks.clone(),
            },
        };
        let acceptor = tasks.spawn(acceptor.run());

        let bookkeeper = Bookkeeper::new(
            shutdown.clone(),
            listener_close.clone(),
            acceptor,
            events,
            Arc::clone(&live_legs),
        );
        tasks.spawn(bookkeeper.run());

        // Tasks spawned later by the accept loop are still tracked
        tasks.close();

        info!("Proxy listening on {}, forwarding to {}", local_addr, remote_addr);

        Ok(Self {
            local_addr,
            remote_addr,
            shutdown,
            listener_close,
            tasks,
            live_legs,
        })
    }

    /// Create and start a proxy that dials through SSH
    ///
    /// # Errors
    ///
    /// In addition to the errors of [`Proxy::bind`], returns
    /// [`ProxyError::Dialer`] if the SSH dialer cannot be built from
    /// `ssh_config`.
    pub async fn bind_over_ssh(
        parent: &CancellationToken,
        listen_addr: &str,
        remote_addr: &str,
        ssh_config: SshClientConfig,
    ) -> Result<Self> {
        let dialer = SshDialer::new(ssh_config)?;
        Self::bind(parent, listen_addr, remote_addr, Arc::new(dialer)).await
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Address every connection is forwarded to
    pub fn remote_addr(&self) -> &str {
        &self.remote_addr
    }

    /// Number of connection legs currently registered
    pub fn live_legs(&self) -> usize {
        self.live_legs.load(Ordering::Relaxed)
    }

    /// Shut the proxy down, closing every established session
    ///
    /// Equivalent to cancelling the token passed to [`Proxy::bind`], but
    /// scoped to this proxy.
    pub fn cancel(&self) {
        self.shutdown.cancel();
    }

    /// Wait until all proxy work has completed
    ///
    /// Does not itself stop anything: it returns after the proxy was
    /// cancelled, or after the listener was closed and every session ended.
    pub async fn wait(&self) {
        self.tasks.wait().await;
    }

    /// Stop accepting and wait for established sessions to finish
    ///
    /// Sessions are not force-closed; they end when their peers close.
    pub async fn close_and_wait(&self) {
        debug!("Closing listener on {}", self.local_addr);
        self.listener_close.cancel();
        self.tasks.wait().await;
    }
}

/// Delay before the next retry after a failed accept
fn next_backoff(current: Duration) -> Duration {
    (current * 2).clamp(ACCEPT_BACKOFF_MIN, ACCEPT_BACKOFF_MAX)
}

/// Accept loop state
struct Acceptor {
    listener: TcpListener,
    local_addr: SocketAddr,
    listener_close: CancellationToken,
    session: SessionContext,
}

impl Acceptor {
    /// Accept connections until the listener is closed
    ///
    /// Accept errors on a live proxy are retried with a capped exponential
    /// backoff.
    async fn run(self) {
        let mut backoff = ACCEPT_BACKOFF_MIN;

        loop {
            let accepted = tokio::select! {
                _ = self.listener_close.cancelled() => break,
                result = self.listener.accept() => result,
            };

            match accepted {
                Ok((client_stream, client_addr)) => {
                    backoff = ACCEPT_BACKOFF_MIN;
                    debug!("Accepted connection from {} on {}", client_addr, self.local_addr);
                    self.session.tracker.spawn(handle_connection(
                        client_stream,
                        client_addr,
                        self.session.clone(),
                    ));
                }
                Err(e) => {
                    if self.session.shutdown.is_cancelled() || self.listener_close.is_cancelled() {
                        break;
                    }
                    warn!("Error accepting connection on {}: {} (retrying in {:?})", self.local_addr, e, backoff);
                    tokio::select! {
                        _ = self.listener_close.cancelled() => break,
                        _ = tokio::time::sleep(backoff) => {}
                    }
                    backoff = next_backoff(backoff);
                }
            }
        }

        info!("Stopped accepting connections on {}", self.local_addr);
    }
}
