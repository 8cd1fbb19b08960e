//! Logging setup.
//!
//! Library code only emits `tracing` events and spans; binaries call
//! [`init_tracing`] once to install a subscriber. Each dispatched lookup
//! runs inside a `lookup` span carrying a generated `lookup_id`.

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::errors::ScrapeError;

/// Builds the event filter: `RUST_LOG` when set, the configured directive
/// otherwise.
pub fn build_filter(config: &LoggingConfig) -> Result<EnvFilter, ScrapeError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.filter).map_err(|e| {
            ScrapeError::Configuration(format!("Invalid log filter '{}': {e}", config.filter))
        }),
    }
}

/// Installs a global subscriber writing to stderr.
///
/// Fails if the filter is malformed or a subscriber is already installed.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), ScrapeError> {
    let filter = build_filter(config)?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    let installed = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    installed.map_err(|e| ScrapeError::Configuration(format!("Failed to install logger: {e}")))
}
