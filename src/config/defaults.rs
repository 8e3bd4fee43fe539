//! Default configuration values
//!
//! Single source of truth for configuration defaults.

use crate::ssh::DEFAULT_SSH_PORT;

/// Environment variable prefix for all configuration options
pub const ENV_PREFIX: &str = "TCP_OVER_SSH_";

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

/// Default log level as string
pub const LOG_LEVEL_STR: &str = "info";

/// Default listen address of the `inject` tool
pub const INJECT_LISTEN_STR: &str = ":11111";

/// Default log level
pub fn log_level() -> String {
    LOG_LEVEL_STR.to_string()
}

/// Log levels understood by the logger
pub const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// `level` if it is a known log level, otherwise [`LOG_LEVEL_STR`]
pub fn log_level_or_default(level: &str) -> &str {
    if LOG_LEVELS.contains(&level) {
        level
    } else {
        LOG_LEVEL_STR
    }
}

/// Default SSH port
pub fn ssh_port() -> u16 {
    DEFAULT_SSH_PORT
}
