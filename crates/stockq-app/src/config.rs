//! Application configuration.

use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use stockq_core::RecordLayout;
use stockq_pipeline::PipelineConfig;
use stockq_source::LineSource;

/// Environment variable prefix for overrides, e.g. `STOCKQ__SOURCE__LOCATION`.
pub const ENV_PREFIX: &str = "STOCKQ";

/// Default config file location.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Where price lines are read from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// File path or `http(s)://` URL. URLs may contain `{identifier}`.
    #[serde(default = "default_location")]
    pub location: String,
    /// Column layout of the source. Default: `quote`, matching the bundled data file.
    #[serde(default = "default_layout")]
    pub layout: RecordLayout,
    /// HTTP request timeout (ms). Default: 30,000.
    #[serde(default = "default_http_timeout_ms")]
    pub http_timeout_ms: u64,
}

fn default_location() -> String {
    "data/stock_prices_small.csv".to_string()
}

fn default_layout() -> RecordLayout {
    RecordLayout::Quote
}

fn default_http_timeout_ms() -> u64 {
    30_000
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            location: default_location(),
            layout: default_layout(),
            http_timeout_ms: default_http_timeout_ms(),
        }
    }
}

/// Search behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Match identifiers ignoring ASCII case. Default: false.
    #[serde(default)]
    pub case_insensitive: bool,
    /// Skip blank lines in the source. Default: true.
    #[serde(default = "default_skip_blank_lines")]
    pub skip_blank_lines: bool,
}

fn default_skip_blank_lines() -> bool {
    true
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            case_insensitive: false,
            skip_blank_lines: default_skip_blank_lines(),
        }
    }
}

/// Logging options. `RUST_LOG` still wins over `filter`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub filter: Option<String>,
    /// JSON output instead of pretty output.
    #[serde(default)]
    pub json: bool,
}

impl LoggingConfig {
    /// Install the global tracing subscriber.
    ///
    /// Without a configured filter or format the environment decides
    /// (`RUST_LOG`, `RUST_ENV=production`).
    pub fn init(&self) -> AppResult<()> {
        match (&self.filter, self.json) {
            (None, false) => stockq_telemetry::init_logging()?,
            (filter, json) => stockq_telemetry::init_logging_with(
                filter.as_deref(),
                json || stockq_telemetry::is_production(),
            )?,
        }
        Ok(())
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load a file (if present) layered with `STOCKQ__*` environment overrides.
    ///
    /// An explicitly given `path` must exist; the default path is optional.
    pub fn load(path: Option<&str>) -> AppResult<Self> {
        Self::load_with_prefix(path, ENV_PREFIX)
    }

    /// `load` with a custom environment prefix (`<PREFIX>__SECTION__KEY`).
    pub fn load_with_prefix(path: Option<&str>, env_prefix: &str) -> AppResult<Self> {
        let (file, required) = match path {
            Some(p) => (p, true),
            None => (DEFAULT_CONFIG_PATH, false),
        };

        if !required && !Path::new(file).exists() {
            tracing::debug!(path = %file, "Config file not found, using defaults");
        }

        let settings = config::Config::builder()
            .add_source(config::File::new(file, config::FileFormat::Toml).required(required))
            .add_source(
                config::Environment::with_prefix(env_prefix)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::Config(format!("Failed to load config: {e}")))?;

        let config: Self = settings
            .try_deserialize()
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a specific TOML file, without environment overrides.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.source.location.trim().is_empty() {
            return Err(AppError::Config("source.location must not be empty".to_string()));
        }
        if self.source.http_timeout_ms == 0 {
            return Err(AppError::Config(
                "source.http_timeout_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.source.http_timeout_ms)
    }

    /// Build the configured line source.
    pub fn line_source(&self) -> AppResult<LineSource> {
        Ok(LineSource::from_location(
            &self.source.location,
            self.http_timeout(),
        )?)
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            layout: self.source.layout,
            case_insensitive: self.search.case_insensitive,
            skip_blank_lines: self.search.skip_blank_lines,
        }
    }
}
