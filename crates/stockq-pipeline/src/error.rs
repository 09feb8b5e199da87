//! Pipeline error types.

use stockq_core::ParseError;
use stockq_source::SourceError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// A record line could not be parsed. `line` is 1-based and counts the header.
    #[error("Parse error on line {line}: {source}")]
    Parse {
        line: u64,
        #[source]
        source: ParseError,
    },

    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// The pipeline task panicked or was aborted before reporting.
    #[error("Pipeline task aborted: {0}")]
    Aborted(String),
}

impl PipelineError {
    pub fn is_parse(&self) -> bool {
        matches!(self, Self::Parse { .. })
    }

    pub fn is_source(&self) -> bool {
        matches!(self, Self::Source(_))
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
