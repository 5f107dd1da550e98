//! Logging initialization.
//!
//! Library crates only emit `tracing` events; whoever embeds the engine
//! calls [`init_logging`] once at startup to decide where they go.

use crate::{Config, LogFormat};
use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber from the configuration.
///
/// The level comes from `RUST_LOG` when set, otherwise from
/// `config.log_level`. Calling this more than once is harmless: later calls
/// leave the first subscriber in place and return `false`.
///
/// ```ignore
/// let config = Config::new();
/// init_logging(&config);
/// tracing::info!("engine ready");
/// ```
pub fn init_logging(config: &Config) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let installed = match config.log_format {
        LogFormat::Compact => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .compact()
            .try_init()
            .is_ok(),
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .json()
            .try_init()
            .is_ok(),
    };

    if installed {
        tracing::debug!(
            level = %config.log_level,
            format = ?config.log_format,
            "logging initialized"
        );
    }
    installed
}

/// Parse a log level string into a tracing Level.
pub fn parse_level(level: &str) -> tracing::Level {
    match level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" | "warning" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    }
}
