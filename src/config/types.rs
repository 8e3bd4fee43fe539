//! Configuration types
//!
//! This module contains the configuration file model and the tunnel
//! descriptions resolved from it. Field names follow the file format
//! (`SSHProfile`, `Items`, `Listen`, `Intranet`, ...).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::config::defaults;
use crate::config::error::{ConfigError, Result};
use crate::ssh::{HostKeyPolicy, SshClientConfig};

/// SSH server profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SshProfile {
    /// SSH server host name or address
    #[serde(default)]
    pub host: String,

    /// SSH server port
    #[serde(default = "defaults::ssh_port")]
    pub port: u16,

    /// Login user
    #[serde(default)]
    pub user: String,

    /// Private key file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<PathBuf>,

    /// Password
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Additional private key files, tried after `Key`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keys: Vec<PathBuf>,

    /// Additional passwords, tried after `Password`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub passwords: Vec<String>,

    /// OpenSSH known_hosts file used to verify the server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub known_hosts: Option<PathBuf>,

    /// Expected SHA256 host key fingerprint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_key_fingerprint: Option<String>,
}

impl Default for SshProfile {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: defaults::ssh_port(),
            user: String::new(),
            key: None,
            password: None,
            keys: Vec::new(),
            passwords: Vec::new(),
            known_hosts: None,
            host_key_fingerprint: None,
        }
    }
}

impl SshProfile {
    /// All configured passwords, `Password` first; empty entries are dropped
    pub fn all_passwords(&self) -> Vec<String> {
        self.password
            .iter()
            .chain(self.passwords.iter())
            .filter(|p| !p.is_empty())
            .cloned()
            .collect()
    }

    /// All configured key files, `Key` first; empty entries are dropped
    pub fn all_keys(&self) -> Vec<PathBuf> {
        self.key
            .iter()
            .chain(self.keys.iter())
            .filter(|k| !k.as_os_str().is_empty())
            .cloned()
            .collect()
    }

    /// Host key policy selected by this profile, if any
    pub fn host_key_policy(&self) -> Result<Option<HostKeyPolicy>> {
        let fingerprint = self.host_key_fingerprint.as_deref().filter(|f| !f.trim().is_empty());
        let known_hosts = self.known_hosts.as_ref().filter(|p| !p.as_os_str().is_empty());

        match (fingerprint, known_hosts) {
            (Some(_), Some(_)) => Err(ConfigError::InvalidCombination(
                "HostKeyFingerprint and KnownHosts are mutually exclusive".to_string()
            )),
            (Some(fp), None) => Ok(Some(HostKeyPolicy::Fingerprint(fp.trim().to_string()))),
            (None, Some(path)) => Ok(Some(HostKeyPolicy::KnownHosts(path.clone()))),
            (None, None) => Ok(None),
        }
    }

    /// Convert into SSH client parameters
    pub fn to_client_config(&self) -> Result<SshClientConfig> {
        Ok(SshClientConfig {
            user: self.user.clone(),
            host: self.host.clone(),
            port: self.port,
            passwords: self.all_passwords(),
            keys: self.all_keys(),
            host_key: self.host_key_policy()?,
        })
    }
}

impl fmt::Display for SshProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.user, self.host, self.port)
    }
}

/// One tunnel: a local listen address forwarded to an intranet address
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Item {
    /// Local listen address (`host:port` or `:port`)
    #[serde(default)]
    pub listen: String,

    /// Address reached from the SSH server
    #[serde(default)]
    pub intranet: String,

    /// Profile overriding the default one for this item
    #[serde(rename = "SSHProfile", default, skip_serializing_if = "Option::is_none")]
    pub ssh_profile: Option<SshProfile>,
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.listen, self.intranet)
    }
}

/// Configuration file model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Config {
    /// Default SSH profile
    #[serde(rename = "SSHProfile", default, skip_serializing_if = "Option::is_none")]
    pub ssh_profile: Option<SshProfile>,

    /// Tunnels
    #[serde(default)]
    pub items: Vec<Item>,

    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "defaults::log_level")]
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ssh_profile: None,
            items: Vec::new(),
            log_level: defaults::log_level(),
        }
    }
}

impl Config {
    /// Profile used by `item`: its own, or the default one
    pub fn profile_for<'a>(&'a self, item: &'a Item) -> Option<&'a SshProfile> {
        item.ssh_profile.as_ref().or(self.ssh_profile.as_ref())
    }

    /// Resolve one item into a tunnel description
    pub fn resolve(&self, item: &Item) -> Result<TunnelSpec> {
        let profile = self.profile_for(item).ok_or_else(|| {
            ConfigError::MissingRequiredValue(format!("SSHProfile for item {}", item))
        })?;

        Ok(TunnelSpec {
            listen: item.listen.trim().to_string(),
            remote: item.intranet.trim().to_string(),
            ssh: profile.to_client_config()?,
        })
    }

    /// Resolve every item
    pub fn tunnels(&self) -> Result<Vec<TunnelSpec>> {
        self.items.iter().map(|item| self.resolve(item)).collect()
    }
}

/// A fully resolved tunnel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelSpec {
    /// Local listen address
    pub listen: String,
    /// Address dialed through the SSH server
    pub remote: String,
    /// SSH server to go through
    pub ssh: SshClientConfig,
}

impl fmt::Display for TunnelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {} via {}@{}:{}", self.listen, self.remote, self.ssh.user, self.ssh.host, self.ssh.port)
    }
}
