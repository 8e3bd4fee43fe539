//! Error handling module
//!
//! This module defines the error types and result type aliases used in the application.

use thiserror::Error;
use std::io;

/// TCP-over-SSH error type
#[derive(Error, Debug)]
pub enum ProxyError {
    /// Bad construction argument (empty address, malformed host:port)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The listen address could not be bound
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        /// Address that was requested
        addr: String,
        /// Underlying socket error
        #[source]
        source: io::Error,
    },

    /// The remote dialer could not be built
    #[error("Dialer error: {0}")]
    Dialer(String),

    /// Dialing the remote address failed
    #[error("Dial error: {0}")]
    Dial(String),

    /// SSH protocol error
    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    /// Host key verification rejected the server
    #[error("Host key error: {0}")]
    HostKey(String),

    /// Every authentication method was rejected
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Remote command exited with a non-zero status
    #[error("Remote command exited with status {status}")]
    RemoteCommand {
        /// Exit status reported by the server
        status: u32,
        /// Combined stdout and stderr
        output: Vec<u8>,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Other error
    #[error("Other error: {0}")]
    Other(String),
}

/// Result type alias
///
/// This is a `Result` type alias that uses our custom `ProxyError`.
pub type Result<T> = std::result::Result<T, ProxyError>;
