//! Line source descriptions and opening.

use crate::error::{SourceError, SourceResult};
use crate::reader::{boxed_lines, BoxedLines, LineReader};
use futures_util::TryStreamExt;
use reqwest::Client;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Placeholder replaced by the searched identifier in HTTP URLs.
pub const IDENTIFIER_PLACEHOLDER: &str = "{identifier}";

/// Default timeout for HTTP sources.
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Where raw lines come from.
///
/// Cloning is cheap: the HTTP client and in-memory buffers are shared.
#[derive(Debug, Clone)]
pub enum LineSource {
    /// Local text file.
    File { path: PathBuf },
    /// HTTP endpoint returning a line-oriented body.
    Http { url: String, client: Client },
    /// In-process lines.
    Memory { lines: Arc<Vec<String>> },
}

impl LineSource {
    pub fn file(path: impl AsRef<Path>) -> Self {
        Self::File {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// HTTP source with the default request timeout.
    pub fn http(url: impl Into<String>) -> SourceResult<Self> {
        Self::http_with_timeout(url, DEFAULT_HTTP_TIMEOUT)
    }

    pub fn http_with_timeout(url: impl Into<String>, timeout: Duration) -> SourceResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SourceError::Client(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self::Http {
            url: url.into(),
            client,
        })
    }

    pub fn memory<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Memory {
            lines: Arc::new(lines.into_iter().map(Into::into).collect()),
        }
    }

    /// Parse a location string: `http://` / `https://` URLs become HTTP
    /// sources, anything else is a file path.
    pub fn from_location(location: &str, http_timeout: Duration) -> SourceResult<Self> {
        if location.starts_with("http://") || location.starts_with("https://") {
            Self::http_with_timeout(location, http_timeout)
        } else {
            Ok(Self::file(location))
        }
    }

    /// The source to use for a search on `identifier`.
    ///
    /// Only HTTP URLs are templated; other sources are returned unchanged.
    pub fn for_identifier(&self, identifier: &str) -> Self {
        match self {
            Self::Http { url, client } if url.contains(IDENTIFIER_PLACEHOLDER) => Self::Http {
                url: url.replace(IDENTIFIER_PLACEHOLDER, identifier),
                client: client.clone(),
            },
            other => other.clone(),
        }
    }

    /// Open the source.
    ///
    /// If `cancel` fires while the source is being opened, the returned
    /// reader is already finished and reports `was_cancelled()`.
    pub async fn open(&self, cancel: CancellationToken) -> SourceResult<LineReader> {
        let location = self.to_string();
        if cancel.is_cancelled() {
            debug!(%location, "Cancelled before open");
            return Ok(LineReader::cancelled(location, cancel));
        }

        let opened = tokio::select! {
            biased;
            () = cancel.cancelled() => None,
            lines = self.open_lines() => Some(lines?),
        };

        match opened {
            Some(lines) => {
                debug!(%location, "Source opened");
                Ok(LineReader::new(lines, location, cancel))
            }
            None => {
                debug!(%location, "Cancelled while opening");
                Ok(LineReader::cancelled(location, cancel))
            }
        }
    }

    async fn open_lines(&self) -> SourceResult<BoxedLines> {
        match self {
            Self::File { path } => {
                let file = tokio::fs::File::open(path)
                    .await
                    .map_err(|error| SourceError::Open {
                        location: path.display().to_string(),
                        error,
                    })?;
                Ok(boxed_lines(BufReader::new(file)))
            }
            Self::Http { url, client } => {
                let response = client.get(url).send().await?;
                let status = response.status();
                if !status.is_success() {
                    return Err(SourceError::Status {
                        url: url.clone(),
                        status: status.as_u16(),
                    });
                }

                let body = Box::pin(response.bytes_stream().map_err(std::io::Error::other));
                Ok(boxed_lines(StreamReader::new(body)))
            }
            Self::Memory { lines } => {
                let text = lines.join("\n");
                Ok(boxed_lines(std::io::Cursor::new(text.into_bytes())))
            }
        }
    }
}

impl fmt::Display for LineSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File { path } => write!(f, "{}", path.display()),
            Self::Http { url, .. } => write!(f, "{url}"),
            Self::Memory { lines } => write!(f, "memory ({} lines)", lines.len()),
        }
    }
}
