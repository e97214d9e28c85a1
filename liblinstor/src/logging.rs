//! Subscriber setup for binaries.
//!
//! The library itself only emits `tracing` events; installing a subscriber
//! is left to the process embedding it.

use tracing_subscriber::EnvFilter;

use crate::config::{LogConfig, LogFormat};
use crate::error::LinstorError;

/// Filter directive for `cfg`. Debug mode wins over the configured level.
fn directive(cfg: &LogConfig) -> &str {
    if cfg.debug { "debug" } else { cfg.level.as_str() }
}

/// Install a global fmt subscriber according to `cfg`.
///
/// `RUST_LOG`, when set, takes precedence over the configured level.
pub fn init(cfg: &LogConfig) -> Result<(), LinstorError> {
    let filter = match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(from_env) => EnvFilter::try_new(from_env),
        Err(_) => EnvFilter::try_new(directive(cfg)),
    }
    .map_err(|e| LinstorError::Config(format!("invalid log filter: {e}")))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(cfg.debug)
        .with_line_number(cfg.debug);

    let installed = match cfg.format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.map_err(|e| LinstorError::Config(format!("failed to install subscriber: {e}")))
}
