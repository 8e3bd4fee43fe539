//! tcp-over-ssh: fixed TCP port forwarding through an SSH server
//!
//! This library accepts TCP connections on a local address and forwards each
//! of them, byte for byte, to one fixed remote address. The remote side is
//! produced by a pluggable [`RemoteDialer`]; the bundled [`SshDialer`] opens
//! a `direct-tcpip` channel on an SSH server, which makes intranet services
//! reachable from outside.
//!
//! # Main Features
//!
//! - One proxy per listen address, any number of concurrent sessions
//! - Cooperative shutdown through a [`CancellationToken`](tokio_util::sync::CancellationToken)
//! - Graceful close: stop accepting, let established sessions finish
//! - Password and public key SSH authentication with host key verification
//!
//! # Example
//!
//! ```no_run
//! use tcp_over_ssh::{Proxy, Result, SshClientConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let ssh = SshClientConfig {
//!         user: "root".to_string(),
//!         host: "jump.example.com".to_string(),
//!         keys: vec!["/root/.ssh/id_ed25519".into()],
//!         ..Default::default()
//!     };
//!
//!     let shutdown = CancellationToken::new();
//!     let proxy = Proxy::bind_over_ssh(&shutdown, ":6379", "redis.internal:6379", ssh).await?;
//!
//!     proxy.wait().await;
//!     Ok(())
//! }
//! ```

// Public modules
pub mod common;
pub mod config;
pub mod proxy;
pub mod ssh;

// Re-export commonly used structures and functions for convenience
pub use proxy::{dialer_fn, Proxy, RemoteDialer};
pub use ssh::{HostKeyPolicy, SshClient, SshClientConfig, SshDialer};
pub use common::{ProxyError, Result};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
