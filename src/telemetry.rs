//! Tracing setup for processes embedding the ledger.

use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, util::TryInitError, EnvFilter,
};

use crate::config::{LogConfig, LOG_ENV_VAR};

/// Build the filter from `LOYALTY_LOG`, falling back to the configured directive.
pub fn env_filter(config: &LogConfig) -> EnvFilter {
    filter_from(std::env::var(LOG_ENV_VAR).ok().as_deref(), config)
}

/// Empty or unparsable overrides are ignored
fn filter_from(directive: Option<&str>, config: &LogConfig) -> EnvFilter {
    directive
        .filter(|directive| !directive.trim().is_empty())
        .and_then(|directive| EnvFilter::try_new(directive).ok())
        .unwrap_or_else(|| EnvFilter::new(&config.filter))
}

/// Initialize the global tracing subscriber.
///
/// Fails if a global subscriber is already installed.
pub fn init_tracing(config: &LogConfig) -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(env_filter(config))
        .with(config.json.then(|| fmt::layer().json()))
        .with((!config.json).then(fmt::layer))
        .try_init()
}
