//! SSH client
//!
//! Every operation opens its own SSH session. A session used for a
//! forwarded connection lives exactly as long as the returned stream.

use log::{debug, info, warn};
use russh::client::{self, Handle};
use russh::keys::{self, PrivateKey, PrivateKeyWithHashAlg};
use russh::{ChannelMsg, ChannelStream, Disconnect, Pty};
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use crate::common::{split_host_port, ProxyError, Result};
use super::host_key::{ClientHandler, HostKeyPolicy};

/// Default SSH port
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Terminal modes requested for remote commands: no echo, 14400 baud
const COMMAND_PTY_MODES: &[(Pty, u32)] = &[
    (Pty::ECHO, 0),
    (Pty::TTY_OP_ISPEED, 14400),
    (Pty::TTY_OP_OSPEED, 14400),
];

/// Connection parameters for an SSH server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshClientConfig {
    /// Login user
    pub user: String,
    /// SSH server host name or address
    pub host: String,
    /// SSH server port
    pub port: u16,
    /// Passwords, tried first and in order
    pub passwords: Vec<String>,
    /// Private key files, tried after the passwords and in order
    pub keys: Vec<PathBuf>,
    /// Host key verification; `None` accepts any key
    pub host_key: Option<HostKeyPolicy>,
}

impl Default for SshClientConfig {
    fn default() -> Self {
        Self {
            user: String::new(),
            host: String::new(),
            port: DEFAULT_SSH_PORT,
            passwords: Vec::new(),
            keys: Vec::new(),
            host_key: None,
        }
    }
}

/// One way of proving who we are
#[derive(Clone)]
enum AuthMethod {
    Password(String),
    PublicKey { path: PathBuf, key: Arc<PrivateKey> },
}

impl fmt::Debug for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthMethod::Password(_) => write!(f, "password"),
            AuthMethod::PublicKey { path, .. } => write!(f, "publickey({})", path.display()),
        }
    }
}

/// Client for one SSH server
#[derive(Clone)]
pub struct SshClient {
    user: String,
    host: String,
    port: u16,
    auth_methods: Vec<AuthMethod>,
    host_key: HostKeyPolicy,
    config: Arc<client::Config>,
}

impl SshClient {
    /// Build a client
    ///
    /// Key files that cannot be read or parsed are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::InvalidArgument`] if the host or user is empty,
    /// and [`ProxyError::Dialer`] if no usable authentication method is left.
    pub fn new(config: SshClientConfig) -> Result<Self> {
        if config.host.trim().is_empty() {
            return Err(ProxyError::InvalidArgument("SSH host is empty".to_string()));
        }
        if config.user.trim().is_empty() {
            return Err(ProxyError::InvalidArgument("SSH user is empty".to_string()));
        }

        let mut auth_methods: Vec<AuthMethod> = config
            .passwords
            .into_iter()
            .map(AuthMethod::Password)
            .collect();

        for path in config.keys {
            match keys::load_secret_key(&path, None) {
                Ok(key) => auth_methods.push(AuthMethod::PublicKey { path, key: Arc::new(key) }),
                Err(e) => warn!("Skipping SSH key {}: {}", path.display(), e),
            }
        }

        if auth_methods.is_empty() {
            return Err(ProxyError::Dialer(format!(
                "No usable authentication method for {}@{}:{}",
                config.user, config.host, config.port
            )));
        }

        let host_key = config.host_key.unwrap_or_else(|| {
            warn!("No host key policy for {}:{}, accepting any host key", config.host, config.port);
            HostKeyPolicy::AcceptAny
        });

        let ssh_config = client::Config {
            inactivity_timeout: None,
            keepalive_interval: Some(Duration::from_secs(30)),
            keepalive_max: 3,
            nodelay: true,
            ..Default::default()
        };

        Ok(Self {
            user: config.user,
            host: config.host,
            port: config.port,
            auth_methods,
            host_key,
            config: Arc::new(ssh_config),
        })
    }

    /// `host:port` of the SSH server
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Open a forwarded connection to `addr` (`host:port`) through a new
    /// SSH session
    pub async fn dial(&self, addr: &str) -> Result<SshStream> {
        let (host, port) = split_host_port(addr)?;
        let session = self.connect().await?;

        let channel = session
            .channel_open_direct_tcpip(host, u32::from(port), "127.0.0.1", 0)
            .await
            .map_err(|e| ProxyError::Dial(format!(
                "{} refused forwarding to {}: {}", self.server_addr(), addr, e
            )))?;

        debug!("Forwarding channel to {} opened via {}", addr, self.server_addr());

        Ok(SshStream {
            stream: Box::pin(channel.into_stream()),
            _session: session,
        })
    }

    /// Run `cmd` on the SSH server and return its combined stdout and stderr
    ///
    /// The command runs under an `xterm` PTY of 80x25 with echo disabled.
    ///
    /// # Errors
    ///
    /// A non-zero exit status yields [`ProxyError::RemoteCommand`] carrying
    /// the output collected so far.
    pub async fn output(&self, cmd: &str) -> Result<Vec<u8>> {
        let session = self.connect().await?;
        let result = self.run_command(&session, cmd).await;

        let _ = session.disconnect(Disconnect::ByApplication, "", "").await;
        result
    }

    async fn run_command(&self, session: &Handle<ClientHandler>, cmd: &str) -> Result<Vec<u8>> {
        let mut channel = session.channel_open_session().await?;
        channel.request_pty(false, "xterm", 80, 25, 0, 0, COMMAND_PTY_MODES).await?;
        channel.exec(true, cmd).await?;

        let mut output = Vec::new();
        let mut exit_status = None;

        while let Some(msg) = channel.wait().await {
            match msg {
                ChannelMsg::Data { data } => output.extend_from_slice(&data),
                ChannelMsg::ExtendedData { data, .. } => output.extend_from_slice(&data),
                ChannelMsg::ExitStatus { exit_status: status } => exit_status = Some(status),
                ChannelMsg::Failure => {
                    return Err(ProxyError::Other(format!(
                        "{} rejected command execution", self.server_addr()
                    )));
                }
                ChannelMsg::Close => break,
                _ => {}
            }
        }

        match exit_status {
            Some(0) => Ok(output),
            Some(status) => Err(ProxyError::RemoteCommand { status, output }),
            None => Err(ProxyError::Other(format!(
                "Command on {} ended without an exit status", self.server_addr()
            ))),
        }
    }

    /// Connect and authenticate a new session
    async fn connect(&self) -> Result<Handle<ClientHandler>> {
        let handler = ClientHandler::new(&self.host, self.port, self.host_key.clone());
        let mut session = client::connect(
            Arc::clone(&self.config),
            (self.host.as_str(), self.port),
            handler,
        )
        .await?;

        for method in &self.auth_methods {
            let auth = match method {
                AuthMethod::Password(password) => {
                    session.authenticate_password(self.user.clone(), password.clone()).await?
                }
                AuthMethod::PublicKey { key, .. } => {
                    let hash_alg = session.best_supported_rsa_hash().await?.flatten();
                    let key = PrivateKeyWithHashAlg::new(Arc::clone(key), hash_alg);
                    session.authenticate_publickey(self.user.clone(), key).await?
                }
            };

            if auth.success() {
                info!("Authenticated to {} as {} via {:?}", self.server_addr(), self.user, method);
                return Ok(session);
            }
            debug!("{:?} rejected by {}", method, self.server_addr());
        }

        let _ = session.disconnect(Disconnect::ByApplication, "", "").await;
        Err(ProxyError::Auth(format!(
            "{}@{} rejected all {} authentication methods",
            self.user, self.server_addr(), self.auth_methods.len()
        )))
    }
}

/// Byte stream over an SSH forwarding channel
///
/// Owns the session handle, so the SSH connection is torn down when the
/// stream is dropped.
pub struct SshStream {
    stream: Pin<Box<ChannelStream<client::Msg>>>,
    _session: Handle<ClientHandler>,
}

impl AsyncRead for SshStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        self.stream.as_mut().poll_read(cx, buf)
    }
}

impl AsyncWrite for SshStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.stream.as_mut().poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.stream.as_mut().poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.stream.as_mut().poll_shutdown(cx)
    }
}
