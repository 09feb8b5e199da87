//! Fetch → parse → filter pipeline.
//!
//! One run reads every line of the source, skips the header, parses each
//! remaining line and keeps the records whose identifier matches. The run
//! polls its `CancellationToken` before every line; if cancellation is seen
//! at any point the run reports `Cancelled` and drops whatever it gathered.

use crate::error::{PipelineError, PipelineResult};
use crate::outcome::PipelineOutcome;
use stockq_core::{parse_with, PriceRecord, RecordLayout};
use stockq_source::{LineReader, LineSource};
use stockq_telemetry::Metrics;
use std::time::Instant;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

/// Pipeline behaviour knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Column layout of the source.
    pub layout: RecordLayout,
    /// Compare identifiers ignoring ASCII case. Default: false (exact match).
    pub case_insensitive: bool,
    /// Skip whitespace-only lines instead of failing on them. Default: true.
    pub skip_blank_lines: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            layout: RecordLayout::Compact,
            case_insensitive: false,
            skip_blank_lines: true,
        }
    }
}

/// Cancellable fetch-filter pipeline bound to one line source.
#[derive(Debug, Clone)]
pub struct FetchFilterPipeline {
    source: LineSource,
    config: PipelineConfig,
}

impl FetchFilterPipeline {
    pub fn new(source: LineSource, config: PipelineConfig) -> Self {
        Self { source, config }
    }

    /// Pipeline with the default configuration.
    pub fn with_source(source: LineSource) -> Self {
        Self::new(source, PipelineConfig::default())
    }

    pub fn source(&self) -> &LineSource {
        &self.source
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the pipeline on a tokio task.
    ///
    /// The caller keeps control; the outcome is delivered through the
    /// returned handle.
    pub fn spawn(
        &self,
        identifier: impl Into<String>,
        cancel: CancellationToken,
    ) -> JoinHandle<PipelineOutcome> {
        let pipeline = self.clone();
        let identifier = identifier.into();
        tokio::spawn(async move { pipeline.run(&identifier, cancel).await })
    }

    /// Run the pipeline to its terminal outcome.
    pub async fn run(&self, identifier: &str, cancel: CancellationToken) -> PipelineOutcome {
        let span = info_span!("pipeline", identifier = %identifier, source = %self.source);
        self.run_inner(identifier, cancel).instrument(span).await
    }

    async fn run_inner(&self, identifier: &str, cancel: CancellationToken) -> PipelineOutcome {
        let started = Instant::now();
        Metrics::pipeline_started();

        let outcome = match self.source.for_identifier(identifier).open(cancel.clone()).await {
            Ok(mut reader) => {
                let result = self.collect(&mut reader, identifier).await;
                Metrics::lines_read(reader.lines_read());

                match result {
                    Err(e) => PipelineOutcome::Failed(e),
                    Ok(records) if reader.was_cancelled() || cancel.is_cancelled() => {
                        debug!(
                            discarded = records.len(),
                            lines_read = reader.lines_read(),
                            "Cancellation observed, discarding partial results"
                        );
                        PipelineOutcome::Cancelled
                    }
                    Ok(records) => PipelineOutcome::Success(records),
                }
            }
            Err(e) => PipelineOutcome::Failed(e.into()),
        };

        let elapsed = started.elapsed();
        Metrics::pipeline_finished(outcome.label(), elapsed.as_secs_f64() * 1000.0);

        match &outcome {
            PipelineOutcome::Success(records) => {
                Metrics::records_matched(records.len() as u64);
                info!(
                    matched = records.len(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Pipeline completed"
                );
            }
            PipelineOutcome::Cancelled => {
                info!(elapsed_ms = elapsed.as_millis() as u64, "Pipeline cancelled");
            }
            PipelineOutcome::Failed(e) => {
                warn!(error = %e, elapsed_ms = elapsed.as_millis() as u64, "Pipeline failed");
            }
        }

        outcome
    }

    /// Drain the reader, parsing and filtering every record line.
    ///
    /// Stops at the first parse error. Returns the matches gathered so far
    /// when the reader stops early; the caller decides whether they count.
    async fn collect(
        &self,
        reader: &mut LineReader,
        identifier: &str,
    ) -> PipelineResult<Vec<PriceRecord>> {
        if reader.next_line().await?.is_none() {
            return Ok(Vec::new());
        }

        let mut records = Vec::new();
        let mut line_no: u64 = 1;

        while let Some(line) = reader.next_line().await? {
            line_no += 1;
            if self.config.skip_blank_lines && line.trim().is_empty() {
                continue;
            }

            let record = parse_with(&line, self.config.layout)
                .map_err(|source| PipelineError::Parse {
                    line: line_no,
                    source,
                })?;

            if self.matches(&record, identifier) {
                records.push(record);
            }
        }

        Ok(records)
    }

    fn matches(&self, record: &PriceRecord, identifier: &str) -> bool {
        if self.config.case_insensitive {
            record.identifier.eq_ignore_ascii_case(identifier)
        } else {
            record.identifier == identifier
        }
    }
}
