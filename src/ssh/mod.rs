//! SSH module
//!
//! This module provides the SSH client used to reach remote addresses that
//! are only visible from an SSH server, and the [`SshDialer`] that plugs it
//! into the proxy.

mod client;
mod dialer;
mod host_key;

pub use client::{SshClient, SshClientConfig, SshStream, DEFAULT_SSH_PORT};
pub use dialer::SshDialer;
pub use host_key::HostKeyPolicy;
