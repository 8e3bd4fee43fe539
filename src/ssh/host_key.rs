//! Server host key verification

use log::{debug, warn};
use russh::client;
use russh::keys::{self, HashAlg, PublicKey};
use std::path::PathBuf;

use crate::common::{ProxyError, Result};

/// How the SSH server's host key is checked
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum HostKeyPolicy {
    /// Accept any host key (insecure)
    #[default]
    AcceptAny,
    /// Accept only the key with this SHA256 fingerprint, as printed by
    /// `ssh-keygen -l` (`SHA256:...`)
    Fingerprint(String),
    /// Accept only keys listed for the host in an OpenSSH known_hosts file
    KnownHosts(PathBuf),
}

impl HostKeyPolicy {
    /// Check the key presented by `host:port`
    ///
    /// Returns `Ok(true)` when the key is accepted and an error describing the
    /// rejection otherwise.
    pub fn verify(&self, host: &str, port: u16, key: &PublicKey) -> Result<bool> {
        let fingerprint = key.fingerprint(HashAlg::Sha256).to_string();

        match self {
            HostKeyPolicy::AcceptAny => {
                debug!("Accepting host key {} for {}:{} without verification", fingerprint, host, port);
                Ok(true)
            }
            HostKeyPolicy::Fingerprint(expected) => {
                let expected = expected.trim();
                let expected = expected.strip_prefix("SHA256:").unwrap_or(expected);
                let presented = fingerprint.strip_prefix("SHA256:").unwrap_or(&fingerprint);
                if expected == presented {
                    Ok(true)
                } else {
                    Err(ProxyError::HostKey(format!(
                        "Host key mismatch for {}:{}: expected SHA256:{}, got {}",
                        host, port, expected, fingerprint
                    )))
                }
            }
            HostKeyPolicy::KnownHosts(path) => {
                match keys::check_known_hosts_path(host, port, key, path) {
                    Ok(true) => Ok(true),
                    Ok(false) => Err(ProxyError::HostKey(format!(
                        "No entry for {}:{} in {} (server key {})",
                        host, port, path.display(), fingerprint
                    ))),
                    Err(keys::Error::KeyChanged { line }) => Err(ProxyError::HostKey(format!(
                        "Host key for {}:{} changed (known_hosts {} line {}), got {}",
                        host, port, path.display(), line, fingerprint
                    ))),
                    Err(e) => Err(ProxyError::HostKey(format!(
                        "Failed to check {}: {}", path.display(), e
                    ))),
                }
            }
        }
    }
}

/// russh client handler enforcing a [`HostKeyPolicy`]
pub(crate) struct ClientHandler {
    host: String,
    port: u16,
    policy: HostKeyPolicy,
}

impl ClientHandler {
    pub(crate) fn new(host: &str, port: u16, policy: HostKeyPolicy) -> Self {
        Self {
            host: host.to_string(),
            port,
            policy,
        }
    }
}

impl client::Handler for ClientHandler {
    type Error = ProxyError;

    async fn check_server_key(&mut self, server_public_key: &PublicKey) -> Result<bool> {
        let accepted = self.policy.verify(&self.host, self.port, server_public_key);
        if let Err(e) = &accepted {
            warn!("{}", e);
        }
        accepted
    }
}
