//! Source error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Failed to open {location}: {error}")]
    Open {
        location: String,
        #[source]
        error: std::io::Error,
    },

    #[error("Failed to read {location}: {error}")]
    Read {
        location: String,
        #[source]
        error: std::io::Error,
    },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("HTTP client error: {0}")]
    Client(String),
}

pub type SourceResult<T> = Result<T, SourceError>;
