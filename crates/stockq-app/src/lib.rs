//! stockq terminal driver.
//!
//! Wires a `RequestController` to a line-oriented terminal:
//! - `AppConfig`: TOML configuration with environment overrides
//! - `Application`: one-shot search and interactive toggle loop

pub mod app;
pub mod config;
pub mod error;

pub use app::{Application, OutputFormat};
pub use config::AppConfig;
pub use error::{AppError, AppResult};
