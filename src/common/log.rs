//! Logging helpers
//!
//! Binaries call [`init_logger`] once at startup; the library itself only uses
//! the `log` macros.

/// Initialize the global logger
///
/// `RUST_LOG` takes precedence over `level` when it is set.
///
/// # Parameters
///
/// * `level` - Default log filter (error, warn, info, debug, trace)
pub fn init_logger(level: &str) {
    let env = env_logger::Env::default()
        .filter_or("RUST_LOG", level);

    // A second initialization (e.g. from tests) is not an error worth reporting
    let _ = env_logger::Builder::from_env(env).try_init();
}
