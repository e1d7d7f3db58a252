//! Logging setup for the binary.
//!
//! Library code only emits `tracing` events. The CLI installs a `fmt`
//! subscriber writing to stderr so query output on stdout stays clean.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::LoggingConfig;
use crate::error::{CorpusError, CorpusResult};

/// Builds the filter: `RUST_LOG` wins, otherwise the configured level.
pub fn build_filter(config: &LoggingConfig) -> CorpusResult<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.level).map_err(|e| CorpusError::Configuration {
        reason: format!("invalid logging.level '{}': {e}", config.level),
    })
}

/// Installs the global subscriber. Calling it twice is a no-op.
pub fn init(config: &LoggingConfig) -> CorpusResult<()> {
    let filter = build_filter(config)?;

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    // Err only means a subscriber is already installed
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .try_init();
    Ok(())
}
