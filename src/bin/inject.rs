//! Single-tunnel tool
//!
//! Forwards one listen address to one intranet address through an SSH
//! server, or runs a single command on that server with `--exec`.

use clap::Parser;
use log::{error, info};
use std::io::Write;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

use tcp_over_ssh::{HostKeyPolicy, Proxy, SshClient, SshClientConfig, VERSION};
use tcp_over_ssh::common::{init_logger, ProxyError, Result};
use tcp_over_ssh::config::{log_level_or_default, INJECT_LISTEN_STR, LOG_LEVEL_STR};

/// Forward a local port to an intranet address through SSH
#[derive(Parser, Debug)]
#[clap(author, version = VERSION, about, long_about = None)]
struct Args {
    /// Local listen address
    #[clap(long, default_value = INJECT_LISTEN_STR)]
    listen: String,

    /// Intranet address reached from the SSH server (host:port)
    #[clap(long, required_unless_present = "exec")]
    intranet: Option<String>,

    /// SSH server host
    #[clap(long)]
    ssh_host: String,

    /// SSH server port
    #[clap(long, default_value_t = 22)]
    ssh_port: u16,

    /// SSH user
    #[clap(long)]
    ssh_user: String,

    /// SSH private key file
    #[clap(long, required_unless_present = "ssh_password")]
    ssh_key: Option<PathBuf>,

    /// SSH password
    #[clap(long, env = "TCP_OVER_SSH_PASSWORD", hide_env_values = true)]
    ssh_password: Option<String>,

    /// OpenSSH known_hosts file used to verify the server
    #[clap(long, conflicts_with = "host_key_fingerprint")]
    known_hosts: Option<PathBuf>,

    /// Expected SHA256 host key fingerprint
    #[clap(long)]
    host_key_fingerprint: Option<String>,

    /// Run this command on the SSH server and print its output instead of forwarding
    #[clap(long)]
    exec: Option<String>,

    /// Log level
    #[clap(long, env = "TCP_OVER_SSH_LOG_LEVEL", default_value = LOG_LEVEL_STR)]
    log_level: String,
}

impl Args {
    fn ssh_config(&self) -> SshClientConfig {
        let host_key = match (&self.known_hosts, &self.host_key_fingerprint) {
            (Some(path), _) => Some(HostKeyPolicy::KnownHosts(path.clone())),
            (None, Some(fp)) => Some(HostKeyPolicy::Fingerprint(fp.clone())),
            (None, None) => None,
        };

        SshClientConfig {
            user: self.ssh_user.clone(),
            host: self.ssh_host.clone(),
            port: self.ssh_port,
            passwords: self.ssh_password.iter().cloned().collect(),
            keys: self.ssh_key.iter().cloned().collect(),
            host_key,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logger(log_level_or_default(&args.log_level));

    if let Some(cmd) = &args.exec {
        return exec(args.ssh_config(), cmd).await;
    }

    let intranet = args.intranet.clone().unwrap_or_default();
    let shutdown = CancellationToken::new();
    let proxy = Proxy::bind_over_ssh(&shutdown, &args.listen, &intranet, args.ssh_config()).await?;

    info!("Forwarding {} to {} via {}:{}", proxy.local_addr(), intranet, args.ssh_host, args.ssh_port);

    tokio::select! {
        _ = proxy.wait() => {}
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!("Failed to listen for Ctrl+C: {}", e);
            }
            info!("Shutting down");
            proxy.cancel();
            proxy.wait().await;
        }
    }

    Ok(())
}

/// Run `cmd` on the SSH server and copy its output to stdout
async fn exec(config: SshClientConfig, cmd: &str) -> Result<()> {
    let client = SshClient::new(config)?;

    let (output, result) = match client.output(cmd).await {
        Ok(output) => (output, Ok(())),
        Err(ProxyError::RemoteCommand { status, output }) => {
            (output, Err(ProxyError::RemoteCommand { status, output: Vec::new() }))
        }
        Err(e) => return Err(e),
    };

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&output)?;
    stdout.flush()?;

    result
}
