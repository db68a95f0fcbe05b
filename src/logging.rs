//! Tracing subscriber setup.

use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::{ConfigError, LoggingConfig};

/// Environment variable that overrides the configured filter.
pub const LOG_ENV: &str = "RUST_LOG";

/// Installs the global subscriber. Log lines go to stderr so that command
/// output on stdout stays clean.
///
/// A valid `RUST_LOG` directive takes precedence over `config.level`.
/// Calling this more than once keeps the first subscriber.
///
/// # Errors
///
/// Returns a `ConfigError` if the configured level is not a valid filter.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), ConfigError> {
    let env = std::env::var(LOG_ENV).ok();
    let filter = build_filter(config, env.as_deref())?;

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .try_init()
        .ok();
    Ok(())
}

fn build_filter(config: &LoggingConfig, env: Option<&str>) -> Result<EnvFilter, ConfigError> {
    if let Some(filter) = env.and_then(|directive| EnvFilter::try_new(directive).ok()) {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.level).map_err(|e| ConfigError {
        field: "logging.level".to_string(),
        message: format!("invalid filter \"{}\": {e}", config.level),
    })
}
