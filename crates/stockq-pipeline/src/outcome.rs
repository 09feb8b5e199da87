//! Terminal outcome of one pipeline run.

use crate::error::PipelineError;
use stockq_core::PriceRecord;

/// The single result a pipeline run produces.
///
/// `Cancelled` is a normal outcome, not an error. Records gathered before
/// cancellation are discarded.
#[derive(Debug)]
pub enum PipelineOutcome {
    Success(Vec<PriceRecord>),
    Cancelled,
    Failed(PipelineError),
}

impl PipelineOutcome {
    /// Metric/log label for the outcome kind.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Success(_) => "success",
            Self::Cancelled => "cancelled",
            Self::Failed(_) => "failed",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// Records of a successful run; empty for any other outcome.
    pub fn records(&self) -> &[PriceRecord] {
        match self {
            Self::Success(records) => records,
            _ => &[],
        }
    }

    pub fn into_records(self) -> Vec<PriceRecord> {
        match self {
            Self::Success(records) => records,
            _ => Vec::new(),
        }
    }

    pub fn error(&self) -> Option<&PipelineError> {
        match self {
            Self::Failed(e) => Some(e),
            _ => None,
        }
    }
}
