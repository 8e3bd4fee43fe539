//! Configuration validator
//!
//! This module provides functionality for validating configuration.

use crate::config::defaults::{LOG_LEVELS, LOG_LEVEL_STR};
use crate::config::error::{ConfigError, Result};
use crate::config::types::{Config, Item, SshProfile};

/// Validate the configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if config.items.is_empty() {
        return Err(ConfigError::MissingRequiredValue("Items".to_string()));
    }

    if let Some(profile) = &config.ssh_profile {
        validate_profile(profile, "SSHProfile")?;
    }

    for (index, item) in config.items.iter().enumerate() {
        validate_item(config, item, index)?;
    }

    Ok(())
}

/// Validate one item and the profile it resolves to
fn validate_item(config: &Config, item: &Item, index: usize) -> Result<()> {
    if item.listen.trim().is_empty() {
        return Err(ConfigError::MissingRequiredValue(format!("Items[{}].Listen", index)));
    }
    if item.intranet.trim().is_empty() {
        return Err(ConfigError::MissingRequiredValue(format!("Items[{}].Intranet", index)));
    }

    match (&item.ssh_profile, &config.ssh_profile) {
        (Some(profile), _) => validate_profile(profile, &format!("Items[{}].SSHProfile", index)),
        (None, Some(_)) => Ok(()),
        (None, None) => Err(ConfigError::MissingRequiredValue(format!(
            "Items[{}].SSHProfile (no default SSHProfile)", index
        ))),
    }
}

/// Validate an SSH profile
fn validate_profile(profile: &SshProfile, name: &str) -> Result<()> {
    if profile.host.trim().is_empty() {
        return Err(ConfigError::MissingRequiredValue(format!("{}.Host", name)));
    }
    if profile.user.trim().is_empty() {
        return Err(ConfigError::MissingRequiredValue(format!("{}.User", name)));
    }
    if profile.port == 0 {
        return Err(ConfigError::InvalidValue(
            format!("{}.Port", name),
            "Port must be greater than 0".to_string()
        ));
    }
    if profile.all_passwords().is_empty() && profile.all_keys().is_empty() {
        return Err(ConfigError::MissingRequiredValue(format!(
            "{}.Password or {}.Key", name, name
        )));
    }

    profile.host_key_policy()?;

    Ok(())
}

/// Configuration validator trait
pub trait ConfigValidator {
    /// Check configuration for warnings
    fn check_warnings(&self) -> Vec<String>;
}

impl ConfigValidator for Config {
    fn check_warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if !LOG_LEVELS.contains(&self.log_level.as_str()) {
            warnings.push(format!(
                "Invalid log level '{}', using default '{}'",
                self.log_level, LOG_LEVEL_STR
            ));
        }

        for item in &self.items {
            if let Some(profile) = self.profile_for(item) {
                if profile.known_hosts.is_none() && profile.host_key_fingerprint.is_none() {
                    warnings.push(format!(
                        "Tunnel {} does not verify the host key of {}",
                        item, profile
                    ));
                }
                for key in profile.all_keys() {
                    if !key.exists() {
                        warnings.push(format!("SSH key file not found: {}", key.display()));
                    }
                }
            }
        }

        warnings
    }
}
