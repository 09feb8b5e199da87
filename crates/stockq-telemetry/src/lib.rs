//! Prometheus metrics and structured logging for stockq.
//!
//! - Structured logging with tracing (JSON in production, pretty otherwise)
//! - Prometheus metrics for pipeline runs and controller toggles

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{init_logging, init_logging_with, is_production};
pub use metrics::Metrics;
