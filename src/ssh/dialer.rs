//! Remote dialer over SSH

use futures::future::BoxFuture;

use crate::common::{ProxyError, Result};
use crate::proxy::{BoxedStream, RemoteDialer};
use super::client::{SshClient, SshClientConfig};

/// [`RemoteDialer`] that reaches every remote address through a fresh
/// `direct-tcpip` channel on the configured SSH server
#[derive(Clone)]
pub struct SshDialer {
    client: SshClient,
}

impl SshDialer {
    /// Build the dialer
    ///
    /// # Errors
    ///
    /// Any failure to build the SSH client is reported as
    /// [`ProxyError::Dialer`].
    pub fn new(config: SshClientConfig) -> Result<Self> {
        let client = SshClient::new(config).map_err(|e| match e {
            ProxyError::Dialer(msg) => ProxyError::Dialer(msg),
            other => ProxyError::Dialer(other.to_string()),
        })?;
        Ok(Self { client })
    }

    /// Underlying SSH client
    pub fn client(&self) -> &SshClient {
        &self.client
    }
}

impl RemoteDialer for SshDialer {
    fn dial<'a>(&'a self, remote_addr: &'a str) -> BoxFuture<'a, Result<BoxedStream>> {
        Box::pin(async move {
            let stream = self.client.dial(remote_addr).await?;
            Ok(Box::new(stream) as BoxedStream)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_reports_dialer_error() {
        let config = SshClientConfig {
            user: "root".to_string(),
            host: "jump.example.com".to_string(),
            ..Default::default()
        };
        assert!(matches!(SshDialer::new(config), Err(ProxyError::Dialer(_))));

        let config = SshClientConfig {
            user: "root".to_string(),
            passwords: vec!["secret".to_string()],
            ..Default::default()
        };
        assert!(matches!(SshDialer::new(config), Err(ProxyError::Dialer(_))));
    }

    #[test]
    fn test_new_with_password() {
        let dialer = SshDialer::new(SshClientConfig {
            user: "root".to_string(),
            host: "jump.example.com".to_string(),
            port: 2222,
            passwords: vec!["secret".to_string()],
            ..Default::default()
        })
        .unwrap();
        assert_eq!(dialer.client().server_addr(), "jump.example.com:2222");
    }
}
