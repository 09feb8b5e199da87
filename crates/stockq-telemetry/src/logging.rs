//! Structured logging initialization.

use crate::error::{TelemetryError, TelemetryResult};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "info,stockq=debug";

/// Initialize logging from the environment.
///
/// `RUST_LOG` overrides the filter; `RUST_ENV=production` switches to JSON.
pub fn init_logging() -> TelemetryResult<()> {
    init_logging_with(None, is_production())
}

/// Whether `RUST_ENV=production` is set.
pub fn is_production() -> bool {
    std::env::var("RUST_ENV")
        .map(|v| v == "production")
        .unwrap_or(false)
}

/// Initialize logging with an explicit default filter and output format.
///
/// `RUST_LOG` still takes precedence over `default_filter` when set.
pub fn init_logging_with(default_filter: Option<&str>, json: bool) -> TelemetryResult<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter.unwrap_or(DEFAULT_FILTER)));

    // Logs go to stderr so search results on stdout stay pipeable.
    let result = if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .pretty()
                    .with_target(true)
                    .with_thread_names(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    };

    result.map_err(|e| TelemetryError::LoggingInit(e.to_string()))
}
