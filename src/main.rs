//! tcp-over-ssh command line tool
//!
//! Starts one proxy per tunnel listed in the configuration file and runs
//! until every proxy has stopped or Ctrl+C is pressed.

use clap::Parser;
use futures::future::join_all;
use log::{error, info, warn};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

use tcp_over_ssh::{Proxy, VERSION, APP_NAME};
use tcp_over_ssh::common::{init_logger, ProxyError, Result};
use tcp_over_ssh::config::{
    log_level_or_default, validate_config, Config, ConfigLoader, ConfigValidator, DEFAULT_CONFIG_FILE,
};

/// Fixed TCP port forwarding to intranet services through SSH
#[derive(Parser, Debug)]
#[clap(author, version = VERSION, about, long_about = None)]
struct Args {
    /// Configuration file (YAML, or JSON with a .json extension)
    #[clap(long, env = "TCP_OVER_SSH_CONFIG_FILE", default_value = DEFAULT_CONFIG_FILE)]
    config_file: PathBuf,

    /// Log level, overrides the configuration file
    #[clap(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load(&args.config_file)?;

    // Initialize logger
    init_logger(log_level_or_default(args.log_level.as_deref().unwrap_or(&config.log_level)));

    info!("Starting {} v{}", APP_NAME, VERSION);
    info!("Using configuration file {}", args.config_file.display());

    validate_config(&config)?;
    for warning in config.check_warnings() {
        warn!("{}", warning);
    }

    let shutdown = CancellationToken::new();
    let mut proxies = Vec::with_capacity(config.items.len());

    for item in &config.items {
        let tunnel = match config.resolve(item) {
            Ok(tunnel) => tunnel,
            Err(e) => {
                error!("Skipping tunnel {}: {}", item, e);
                continue;
            }
        };

        match Proxy::bind_over_ssh(&shutdown, &tunnel.listen, &tunnel.remote, tunnel.ssh.clone()).await {
            Ok(proxy) => {
                info!("Tunnel ready: {}", tunnel);
                proxies.push(proxy);
            }
            Err(e) => error!("Failed to start tunnel {}: {}", tunnel, e),
        }
    }

    if proxies.is_empty() {
        return Err(ProxyError::Config("No tunnel could be started".to_string()));
    }

    info!("{} tunnel(s) running, press Ctrl+C to stop", proxies.len());

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C, shutting down");
                signal_token.cancel();
            }
            Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
        }
    });

    join_all(proxies.iter().map(|proxy| proxy.wait())).await;

    info!("All tunnels stopped");

    Ok(())
}
