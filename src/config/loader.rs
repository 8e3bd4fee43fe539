//! Configuration loading functionality
//!
//! This module loads the configuration file (YAML, or JSON when the file
//! extension says so) and applies environment variable overrides.

use log::{debug, info};
use std::env;
use std::fs;
use std::path::Path;

use crate::config::defaults::ENV_PREFIX;
use crate::config::error::{ConfigError, Result};
use crate::config::types::Config;

/// Configuration file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// YAML (default)
    Yaml,
    /// JSON
    Json,
}

impl ConfigFormat {
    /// Pick the format from the file extension
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => ConfigFormat::Json,
            _ => ConfigFormat::Yaml,
        }
    }
}

/// Trait for loading configuration from different sources
pub trait ConfigLoader {
    /// Parse configuration text
    fn from_str_with_format(content: &str, format: ConfigFormat) -> Result<Self> where Self: Sized;

    /// Load configuration from a file
    fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> where Self: Sized;

    /// Apply `TCP_OVER_SSH_*` environment variable overrides
    fn apply_env(self) -> Self where Self: Sized;

    /// Load from a file, then apply environment overrides
    fn load<P: AsRef<Path>>(path: P) -> Result<Self> where Self: Sized;
}

impl ConfigLoader for Config {
    fn from_str_with_format(content: &str, format: ConfigFormat) -> Result<Self> {
        match format {
            ConfigFormat::Yaml => Ok(serde_yaml::from_str(content)?),
            ConfigFormat::Json => Ok(serde_json::from_str(content)?),
        }
    }

    fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| ConfigError::from_io(path, e))?;

        Self::from_str_with_format(&content, ConfigFormat::from_path(path)).map_err(|e| match e {
            ConfigError::ParseError(msg) => {
                ConfigError::ParseError(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })
    }

    fn apply_env(mut self) -> Self {
        if let Ok(level) = env::var(format!("{}LOG_LEVEL", ENV_PREFIX)) {
            if !level.trim().is_empty() {
                debug!("Log level overridden by environment: {}", level);
                self.log_level = level.trim().to_string();
            }
        }
        self
    }

    fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading configuration from {}", path.display());
        Ok(Self::from_file(path)?.apply_env())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_format_from_path() {
        assert_eq!(ConfigFormat::from_path(Path::new("config.yaml")), ConfigFormat::Yaml);
        assert_eq!(ConfigFormat::from_path(Path::new("config.yml")), ConfigFormat::Yaml);
        assert_eq!(ConfigFormat::from_path(Path::new("config")), ConfigFormat::Yaml);
        assert_eq!(ConfigFormat::from_path(Path::new("/etc/tunnels.JSON")), ConfigFormat::Json);
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
SSHProfile:
  Host: jump.example.com
  User: root
  Key: /root/.ssh/id_rsa
Items:
  - Listen: ":6379"
    Intranet: redis.internal:6379
  - Listen: 127.0.0.1:3306
    Intranet: mysql.internal:3306
    SSHProfile:
      Host: db-jump.example.com
      Port: 2222
      User: dba
      Password: secret
"#;
        let config = Config::from_str_with_format(yaml, ConfigFormat::Yaml).unwrap();

        let default_profile = config.ssh_profile.as_ref().unwrap();
        assert_eq!(default_profile.port, 22);
        assert_eq!(default_profile.key, Some(PathBuf::from("/root/.ssh/id_rsa")));
        assert_eq!(config.items.len(), 2);
        assert_eq!(config.items[0].listen, ":6379");
        assert_eq!(config.items[1].ssh_profile.as_ref().unwrap().port, 2222);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_parse_json() {
        let json = r#"{
            "SSHProfile": {"Host": "jump", "User": "root", "Passwords": ["a", "b"]},
            "Items": [{"Listen": ":8080", "Intranet": "web:80"}],
            "LogLevel": "debug"
        }"#;
        let config = Config::from_str_with_format(json, ConfigFormat::Json).unwrap();

        assert_eq!(config.log_level, "debug");
        assert_eq!(config.ssh_profile.unwrap().passwords.len(), 2);
    }

    #[test]
    fn test_parse_error() {
        let result = Config::from_str_with_format("Items: [", ConfigFormat::Yaml);
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_missing_file() {
        let result = Config::from_file("/nonexistent/config.yaml");
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }
}
