//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Source error: {0}")]
    Source(#[from] stockq_source::SourceError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] stockq_telemetry::TelemetryError),

    #[error("Output error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A search could not start because another run is in flight.
    #[error("Controller busy, run {0} still in flight")]
    Busy(u64),

    /// The controller's event channel closed while a run was in flight.
    #[error("Controller stopped unexpectedly")]
    ControllerStopped,
}

pub type AppResult<T> = Result<T, AppError>;
