//! Remote dialer abstraction
//!
//! The proxy never knows how the remote address is reached. It only asks a
//! [`RemoteDialer`] for a byte stream, one call per accepted connection.

use futures::future::BoxFuture;
use std::future::Future;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::common::Result;

/// Trait for streams that can be used as a connection leg.
pub trait ProxyStream: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

impl<T> ProxyStream for T where T: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

/// Type alias for boxed outbound streams.
pub type BoxedStream = Box<dyn ProxyStream>;

/// Capability that opens an outbound connection to a remote address
///
/// Implementations must be safe to call concurrently and repeatedly. A dial
/// may be arbitrarily expensive (an SSH handshake, for instance); the proxy
/// treats it as opaque and never retries a failed dial.
pub trait RemoteDialer: Send + Sync + 'static {
    /// Open a bidirectional byte stream to `remote_addr` (`host:port`)
    fn dial<'a>(&'a self, remote_addr: &'a str) -> BoxFuture<'a, Result<BoxedStream>>;
}

/// Dialer backed by an async closure
///
/// Created with [`dialer_fn`].
#[derive(Clone)]
pub struct FnDialer<F> {
    f: F,
}

/// Wrap an async closure as a [`RemoteDialer`]
///
/// # Example
///
/// ```no_run
/// use tcp_over_ssh::proxy::dialer_fn;
/// use tcp_over_ssh::ProxyError;
/// use tokio::net::TcpStream;
///
/// let dialer = dialer_fn(|addr: String| async move {
///     TcpStream::connect(addr).await.map_err(ProxyError::from)
/// });
/// ```
pub fn dialer_fn<F, Fut, S>(f: F) -> FnDialer<F>
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<S>> + Send + 'static,
    S: ProxyStream,
{
    FnDialer { f }
}

impl<F, Fut, S> RemoteDialer for FnDialer<F>
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<S>> + Send + 'static,
    S: ProxyStream,
{
    fn dial<'a>(&'a self, remote_addr: &'a str) -> BoxFuture<'a, Result<BoxedStream>> {
        let fut = (self.f)(remote_addr.to_string());
        Box::pin(async move {
            let stream = fut.await?;
            Ok(Box::new(stream) as BoxedStream)
        })
    }
}
