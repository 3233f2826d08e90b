//! Tracing subscriber setup.
//!
//! `RUST_LOG` wins over the configured `log_level` when set.

use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, ServerConfig};

/// Builds the filter from `RUST_LOG`, falling back to `log_level`, then `info`.
pub fn env_filter(log_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Installs the global subscriber. Call once, before anything logs.
pub fn init(config: &ServerConfig) {
    let filter = env_filter(&config.log_level);

    match config.log_format {
        LogFormat::Json => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_current_span(true)
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}
