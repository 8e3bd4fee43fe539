//! Connection handler module
//!
//! This module dials the remote side for a single accepted connection and
//! starts the two pumps of the resulting session.

use log::{debug, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use super::dialer::RemoteDialer;
use super::forwarder::pump;
use super::message::{Leg, LegSide, RegistryHandle};

/// Everything a setup task needs, shared by all connections of one proxy
#[derive(Clone)]
pub(crate) struct SessionContext {
    /// Address handed to the dialer
    pub remote_addr: Arc<str>,
    /// How the remote address is reached
    pub dialer: Arc<dyn RemoteDialer>,
    /// Event channel of the bookkeeping loop
    pub registry: RegistryHandle,
    /// Proxy-wide shutdown signal
    pub shutdown: CancellationToken,
    /// Tracks pumps so that `wait()` covers them
    pub tracker: TaskTracker,
}

/// Handle a single client connection
///
/// A failed dial drops the client connection without writing anything to
/// it. A successful dial registers both legs and spawns one pump per
/// direction.
///
/// # Parameters
///
/// * `client_stream` - Accepted client TCP stream
/// * `client_addr` - Client address
/// * `ctx` - Proxy-wide session context
pub(crate) async fn handle_connection(
    client_stream: TcpStream,
    client_addr: SocketAddr,
    ctx: SessionContext,
) {
    let remote_stream = tokio::select! {
        _ = ctx.shutdown.cancelled() => {
            debug!("Shutdown while dialing {} for {}", ctx.remote_addr, client_addr);
            return;
        }
        result = ctx.dialer.dial(&ctx.remote_addr) => match result {
            Ok(stream) => stream,
            Err(e) => {
                warn!("Failed to dial {} for {}: {}", ctx.remote_addr, client_addr, e);
                return;
            }
        },
    };

    let inbound = Leg::new(LegSide::Inbound, client_addr.to_string());
    let outbound = Leg::new(LegSide::Outbound, ctx.remote_addr.to_string());

    if ctx.registry.register(inbound.clone(), outbound.clone()).await.is_err() {
        debug!("Proxy is shutting down, dropping connection from {}", client_addr);
        return;
    }

    debug!("Session established: {} <-> {}", inbound, outbound);

    let (client_reader, client_writer) = client_stream.into_split();
    let (remote_reader, remote_writer) = tokio::io::split(remote_stream);

    ctx.tracker.spawn(pump(
        client_reader,
        inbound.clone(),
        remote_writer,
        outbound.clone(),
        ctx.registry.clone(),
    ));
    ctx.tracker.spawn(pump(
        remote_reader,
        outbound,
        client_writer,
        inbound,
        ctx.registry,
    ));
}
