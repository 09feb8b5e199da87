//! Cancellable line reader.

use crate::error::{SourceError, SourceResult};
use std::fmt;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tokio_util::sync::CancellationToken;
use tracing::debug;

type BoxedRead = Box<dyn AsyncBufRead + Send + Unpin>;

/// Line iterator over a type-erased buffered reader.
pub(crate) type BoxedLines = Lines<BoxedRead>;

pub(crate) fn boxed_lines<R>(reader: R) -> BoxedLines
where
    R: AsyncBufRead + Send + Unpin + 'static,
{
    let boxed: BoxedRead = Box::new(reader);
    boxed.lines()
}

/// Lazy, finite sequence of raw lines from an opened source.
///
/// The token is checked before every read and again before a line is
/// handed out; once it is cancelled the reader stops and `next_line`
/// returns `Ok(None)`. The underlying handle is dropped as soon as the
/// reader stops (end of input, cancellation or error) and in any case when
/// the reader itself is dropped.
pub struct LineReader {
    lines: Option<BoxedLines>,
    location: String,
    cancel: CancellationToken,
    lines_read: u64,
    cancelled: bool,
}

impl LineReader {
    pub(crate) fn new(lines: BoxedLines, location: String, cancel: CancellationToken) -> Self {
        Self {
            lines: Some(lines),
            location,
            cancel,
            lines_read: 0,
            cancelled: false,
        }
    }

    /// A reader that was cancelled before the source was opened.
    pub(crate) fn cancelled(location: String, cancel: CancellationToken) -> Self {
        Self {
            lines: None,
            location,
            cancel,
            lines_read: 0,
            cancelled: true,
        }
    }

    /// Read the next line.
    ///
    /// Returns `Ok(None)` at end of input or once cancellation is observed.
    /// After the first `Ok(None)` or `Err`, every further call returns
    /// `Ok(None)`.
    pub async fn next_line(&mut self) -> SourceResult<Option<String>> {
        let Some(lines) = self.lines.as_mut() else {
            return Ok(None);
        };

        if self.cancel.is_cancelled() {
            self.stop(true);
            return Ok(None);
        }

        let next = tokio::select! {
            biased;
            () = self.cancel.cancelled() => None,
            line = lines.next_line() => Some(line),
        };

        match next {
            None => {
                self.stop(true);
                Ok(None)
            }
            Some(Ok(Some(_))) if self.cancel.is_cancelled() => {
                self.stop(true);
                Ok(None)
            }
            Some(Ok(Some(line))) => {
                self.lines_read += 1;
                Ok(Some(line))
            }
            Some(Ok(None)) => {
                self.stop(false);
                Ok(None)
            }
            Some(Err(error)) => {
                self.stop(false);
                Err(SourceError::Read {
                    location: self.location.clone(),
                    error,
                })
            }
        }
    }

    /// Whether the reader stopped because of cancellation.
    pub fn was_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Lines handed out so far.
    pub fn lines_read(&self) -> u64 {
        self.lines_read
    }

    /// Whether the reader can still produce lines.
    pub fn is_open(&self) -> bool {
        self.lines.is_some()
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    fn stop(&mut self, cancelled: bool) {
        if self.lines.take().is_some() {
            debug!(
                location = %self.location,
                lines_read = self.lines_read,
                cancelled,
                "Source closed"
            );
        }
        self.cancelled |= cancelled;
    }
}

impl fmt::Debug for LineReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LineReader")
            .field("location", &self.location)
            .field("open", &self.is_open())
            .field("lines_read", &self.lines_read)
            .field("cancelled", &self.cancelled)
            .finish()
    }
}
