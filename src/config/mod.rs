//! Configuration module
//!
//! This module handles application configuration: loading the tunnel file,
//! applying environment overrides, validating the result, and resolving it
//! into [`TunnelSpec`]s.

mod defaults;
mod error;
mod loader;
mod types;
mod validator;

pub use self::defaults::{
    log_level_or_default, DEFAULT_CONFIG_FILE, ENV_PREFIX, INJECT_LISTEN_STR, LOG_LEVELS, LOG_LEVEL_STR,
};
pub use self::error::ConfigError;
pub use self::loader::{ConfigFormat, ConfigLoader};
pub use self::types::{Config, Item, SshProfile, TunnelSpec};
pub use self::validator::{validate_config, ConfigValidator};
