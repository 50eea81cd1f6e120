//! Tracing subscriber setup for hosts embedding the engine

use crate::config::LoggingConfig;
use crate::error::{Result, SyncError};
use tracing_subscriber::EnvFilter;

/// Install a global `fmt` subscriber
///
/// `RUST_LOG` takes precedence over the configured filter.
///
/// # Errors
///
/// `Config` if the filter does not parse or a global subscriber is already
/// installed.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = build_filter(config)?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| SyncError::Config(format!("failed to install subscriber: {}", e)))
}

fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.filter)
            .map_err(|e| SyncError::Config(format!("invalid log filter {:?}: {}", config.filter, e))),
    }
}
