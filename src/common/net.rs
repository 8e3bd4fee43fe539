//! Network utility functions
//!
//! Address strings in this crate are `host:port` pairs that are handed to the
//! OS resolver or to the SSH server untouched, so these helpers only split
//! and normalize them.

use super::error::{ProxyError, Result};

/// Normalize a listen address
///
/// A bare `:port` (all interfaces) is accepted and expanded to `0.0.0.0:port`.
///
/// # Arguments
///
/// * `addr` - The listen address to normalize
pub fn normalize_listen_addr(addr: &str) -> String {
    let addr = addr.trim();
    if addr.starts_with(':') {
        format!("0.0.0.0{}", addr)
    } else {
        addr.to_string()
    }
}

/// Split a `host:port` address into its host and port
///
/// IPv6 hosts must be bracketed (`[::1]:6379`); the brackets are stripped
/// from the returned host.
///
/// # Arguments
///
/// * `addr` - The address string to split
///
/// # Returns
///
/// The host and the parsed port
pub fn split_host_port(addr: &str) -> Result<(String, u16)> {
    let (host, port) = addr
        .rsplit_once(':')
        .ok_or_else(|| ProxyError::InvalidArgument(format!("Missing port in address: {}", addr)))?;

    let host = host.strip_prefix('[').and_then(|h| h.strip_suffix(']')).unwrap_or(host);
    if host.is_empty() {
        return Err(ProxyError::InvalidArgument(format!("Missing host in address: {}", addr)));
    }
    if host.contains(':') && !addr.starts_with('[') {
        return Err(ProxyError::InvalidArgument(format!(
            "IPv6 address must be bracketed: {}", addr
        )));
    }

    let port = port
        .parse::<u16>()
        .map_err(|e| ProxyError::InvalidArgument(format!("Invalid port in address {}: {}", addr, e)))?;

    Ok((host.to_string(), port))
}
